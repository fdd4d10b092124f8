// ── Runtime device configuration ──
//
// These types describe *which* firewall to poll and *how* to reach it.
// They carry credential data and polling tuning, but never touch disk.
// The CLI builds a `DeviceConfig` (via opnwatch-config) and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use opnwatch_api::DEFAULT_STATUS_PATH;

/// How often the coordinator polls when nothing else is configured.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(30);

/// Consecutive failures tolerated before the coordinator reports itself
/// unavailable.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 2;

/// Per-request timeout for the status fetch.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Stable identity of the polled device.
///
/// `unique_id` feeds every reader's unique identifier; `name` prefixes
/// every reader's display label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub unique_id: String,
    pub name: String,
}

impl DeviceIdentity {
    pub fn new(unique_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            name: name.into(),
        }
    }
}

/// OPNsense API key/secret pair.
#[derive(Debug, Clone)]
pub struct ApiKeyPair {
    pub key: SecretString,
    pub secret: SecretString,
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed certs). Default for firewalls, which
    /// ship with a self-signed web GUI certificate.
    #[default]
    DangerAcceptInvalid,
}

/// Configuration for polling a single device.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Device root URL (e.g., `https://192.168.1.1`).
    pub url: Url,
    /// Status endpoint path, relative to `url`.
    pub status_path: String,
    /// Identity used for reader ids and labels.
    pub identity: DeviceIdentity,
    /// API credentials, if the endpoint requires them.
    pub credentials: Option<ApiKeyPair>,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// Request timeout.
    pub timeout: Duration,
    /// Poll period. Zero disables the periodic task.
    pub scan_interval: Duration,
    /// Consecutive failures tolerated before the device is unavailable.
    pub failure_threshold: u32,
}

impl DeviceConfig {
    /// A config with default transport and polling settings.
    pub fn new(url: Url, identity: DeviceIdentity) -> Self {
        Self {
            url,
            status_path: DEFAULT_STATUS_PATH.into(),
            identity,
            credentials: None,
            tls: TlsVerification::default(),
            timeout: DEFAULT_TIMEOUT,
            scan_interval: DEFAULT_SCAN_INTERVAL,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }
}
