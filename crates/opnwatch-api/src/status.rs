// Status snapshot HTTP client
//
// Wraps `reqwest::Client` with base-URL joining, optional API key/secret
// basic auth, and response classification. The body is handed back as a
// raw JSON object; shaping it into a snapshot is the core crate's job.

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Default path of the status endpoint, relative to the device URL.
pub const DEFAULT_STATUS_PATH: &str = "api/opnwatch/status";

/// OPNsense API key/secret pair, sent as HTTP basic credentials.
#[derive(Debug, Clone)]
pub struct ApiCredentials {
    pub key: SecretString,
    pub secret: SecretString,
}

/// HTTP client for a device's status endpoint.
///
/// One instance per device. All requests go to a single URL resolved at
/// construction time from the base URL and the status path.
pub struct StatusClient {
    http: reqwest::Client,
    status_url: Url,
    credentials: Option<ApiCredentials>,
    timeout_secs: u64,
}

impl StatusClient {
    /// Create a new status client from a `TransportConfig`.
    ///
    /// `base_url` is the device root (e.g. `https://192.168.1.1`);
    /// `status_path` is joined onto it.
    pub fn new(
        base_url: &Url,
        status_path: &str,
        credentials: Option<ApiCredentials>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            status_url: join_status_url(base_url, status_path)?,
            credentials,
            timeout_secs: transport.timeout.as_secs(),
        })
    }

    /// Create a status client with a pre-built `reqwest::Client`.
    ///
    /// Used by tests against a mock server and by callers that share one
    /// HTTP client across devices.
    pub fn from_reqwest(
        base_url: &str,
        status_path: &str,
        http: reqwest::Client,
    ) -> Result<Self, Error> {
        let base = Url::parse(base_url)?;
        Ok(Self {
            http,
            status_url: join_status_url(&base, status_path)?,
            credentials: None,
            timeout_secs: 0,
        })
    }

    /// Attach API credentials to every request.
    pub fn with_credentials(mut self, credentials: ApiCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// The fully resolved status endpoint.
    pub fn status_url(&self) -> &Url {
        &self.status_url
    }

    /// Fetch the current status document.
    ///
    /// `GET {base}/{status_path}`
    ///
    /// The document must be a JSON object; anything else is reported as a
    /// deserialization error.
    pub async fn fetch_status(&self) -> Result<Map<String, Value>, Error> {
        debug!("GET {}", self.status_url);

        let mut req = self.http.get(self.status_url.clone());
        if let Some(ref creds) = self.credentials {
            req = req.basic_auth(
                creds.key.expose_secret(),
                Some(creds.secret.expose_secret()),
            );
        }

        let resp = req.send().await.map_err(|e| self.classify_transport(e))?;
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Error::Authentication {
                message: format!("device answered {status}"),
            });
        }

        let body = resp.text().await.map_err(|e| self.classify_transport(e))?;

        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .map_or_else(|| truncate(&body), str::to_owned),
            });
        }

        match serde_json::from_str::<Value>(&body) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(Error::Deserialization {
                message: format!("expected a JSON object, got {}", json_kind(&other)),
                body,
            }),
            Err(e) => Err(Error::Deserialization {
                message: e.to_string(),
                body,
            }),
        }
    }

    fn classify_transport(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            Error::Transport(err)
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn join_status_url(base: &Url, status_path: &str) -> Result<Url, Error> {
    // `Url::join` replaces the last segment unless the base ends in '/'.
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join(status_path.trim_start_matches('/'))?)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(200).collect()
}
