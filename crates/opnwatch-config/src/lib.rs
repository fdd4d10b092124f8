//! Configuration for opnwatch.
//!
//! TOML device profiles, credential resolution (env + plaintext), and
//! translation to `opnwatch_core::DeviceConfig`. The CLI layers its
//! command-line overrides on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use opnwatch_core::{ApiKeyPair, DeviceConfig, DeviceIdentity, TlsVerification};

const REDACTED: &str = "********";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no device named '{name}' in config")]
    UnknownDevice { name: String },

    #[error("no device configured")]
    NoDevice,

    #[error("device '{device}' has an API key but no secret, or the other way round")]
    IncompleteCredentials { device: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Device used when none is named on the command line.
    pub default_device: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named device profiles.
    #[serde(default)]
    pub devices: BTreeMap<String, Device>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    /// Poll period in seconds. Zero disables periodic polling.
    #[serde(default = "default_scan_interval")]
    pub scan_interval: u64,

    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub insecure: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            scan_interval: default_scan_interval(),
            failure_threshold: default_failure_threshold(),
            timeout: default_timeout(),
            insecure: false,
        }
    }
}

fn default_scan_interval() -> u64 {
    opnwatch_core::config::DEFAULT_SCAN_INTERVAL.as_secs()
}
fn default_failure_threshold() -> u32 {
    opnwatch_core::config::DEFAULT_FAILURE_THRESHOLD
}
fn default_timeout() -> u64 {
    opnwatch_core::config::DEFAULT_TIMEOUT.as_secs()
}

/// A named device profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Device {
    /// Web GUI base URL (e.g., "https://192.168.1.1").
    pub url: String,

    /// Display name prefixed to every reader label. Defaults to the
    /// profile name.
    pub name: Option<String>,

    /// Stable id feeding every reader's unique id. Defaults to the URL host.
    pub unique_id: Option<String>,

    /// Status endpoint path relative to `url`.
    pub status_path: Option<String>,

    /// API key (plaintext; prefer `api_key_env`).
    pub api_key: Option<String>,

    /// Environment variable name containing the API key.
    pub api_key_env: Option<String>,

    /// API secret (plaintext; prefer `api_secret_env`).
    pub api_secret: Option<String>,

    /// Environment variable name containing the API secret.
    pub api_secret_env: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout, in seconds.
    pub timeout: Option<u64>,

    /// Override poll period, in seconds.
    pub scan_interval: Option<u64>,

    /// Override failure threshold.
    pub failure_threshold: Option<u32>,
}

impl Config {
    /// Pick a device: the named one, else `default_device`, else the only
    /// configured device.
    pub fn device<'a>(&'a self, name: Option<&'a str>) -> Result<(&'a str, &'a Device), ConfigError> {
        let name = match name.or(self.default_device.as_deref()) {
            Some(name) => name,
            None => match self.devices.keys().next() {
                Some(only) if self.devices.len() == 1 => only.as_str(),
                _ => return Err(ConfigError::NoDevice),
            },
        };
        self.devices
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| ConfigError::UnknownDevice { name: name.into() })
    }

    /// A copy safe to print: plaintext secrets replaced.
    pub fn redacted(&self) -> Self {
        let mut out = self.clone();
        for device in out.devices.values_mut() {
            if device.api_key.is_some() {
                device.api_key = Some(REDACTED.into());
            }
            if device.api_secret.is_some() {
                device.api_secret = Some(REDACTED.into());
            }
        }
        out
    }

    /// Serialize to pretty TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "opnwatch", "opnwatch").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("opnwatch");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Defaults, then the TOML file at `path`, then `OPNWATCH_*` variables
/// (`__` separates nesting, e.g. `OPNWATCH_DEFAULTS__TIMEOUT`).
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("OPNWATCH_").split("__"))
}

/// Load the full Config from the file at `path` + environment.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    Ok(figment(path).extract()?)
}

/// Load the full Config from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Parse a TOML document on top of the defaults. No file or env access.
pub fn parse_config(toml: &str) -> Result<Config, ConfigError> {
    Ok(Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::string(toml))
        .extract()?)
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the API key pair from the process environment and the profile.
pub fn resolve_credentials(
    device: &Device,
    device_name: &str,
) -> Result<Option<ApiKeyPair>, ConfigError> {
    resolve_credentials_with(device, device_name, |var| std::env::var(var).ok())
}

/// Resolve the API key pair with a custom environment lookup.
///
/// Each half comes from its `*_env` variable first, then from plaintext.
/// Both halves or neither; one without the other is an error.
pub fn resolve_credentials_with<F>(
    device: &Device,
    device_name: &str,
    lookup: F,
) -> Result<Option<ApiKeyPair>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let resolve = |env: Option<&String>, plain: Option<&String>| {
        env.and_then(|name| lookup(name))
            .or_else(|| plain.cloned())
            .map(SecretString::from)
    };

    let key = resolve(device.api_key_env.as_ref(), device.api_key.as_ref());
    let secret = resolve(device.api_secret_env.as_ref(), device.api_secret.as_ref());

    match (key, secret) {
        (Some(key), Some(secret)) => Ok(Some(ApiKeyPair { key, secret })),
        (None, None) => Ok(None),
        _ => Err(ConfigError::IncompleteCredentials {
            device: device_name.into(),
        }),
    }
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `DeviceConfig` from a profile and the global defaults.
pub fn device_to_config(
    device: &Device,
    device_name: &str,
    defaults: &Defaults,
) -> Result<DeviceConfig, ConfigError> {
    let url: url::Url = device.url.parse().map_err(|_| ConfigError::Validation {
        field: format!("devices.{device_name}.url"),
        reason: format!("invalid URL: {}", device.url),
    })?;

    let unique_id = match (&device.unique_id, url.host_str()) {
        (Some(id), _) => id.clone(),
        (None, Some(host)) => host.to_owned(),
        (None, None) => {
            return Err(ConfigError::Validation {
                field: format!("devices.{device_name}.unique_id"),
                reason: "not set and the URL has no host".into(),
            });
        }
    };
    let name = device.name.clone().unwrap_or_else(|| device_name.to_owned());

    let mut config = DeviceConfig::new(url, DeviceIdentity::new(unique_id, name));
    if let Some(ref path) = device.status_path {
        config.status_path.clone_from(path);
    }
    config.credentials = resolve_credentials(device, device_name)?;
    config.tls = tls_for(device, defaults);
    config.timeout = Duration::from_secs(device.timeout.unwrap_or(defaults.timeout));
    config.scan_interval =
        Duration::from_secs(device.scan_interval.unwrap_or(defaults.scan_interval));
    config.failure_threshold = device
        .failure_threshold
        .unwrap_or(defaults.failure_threshold);

    Ok(config)
}

fn tls_for(device: &Device, defaults: &Defaults) -> TlsVerification {
    if device.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = device.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    const SAMPLE: &str = r#"
        default_device = "fw1"

        [defaults]
        scan_interval = 60
        insecure = true

        [devices.fw1]
        url = "https://192.168.1.1"
        name = "Edge"
        unique_id = "aa:bb:cc:dd:ee:ff"
        api_key_env = "FW1_API_KEY"
        api_secret = "plain-secret"

        [devices.lab]
        url = "https://10.0.0.1:8443"
        insecure = false
        ca_cert = "/etc/opnwatch/lab-ca.pem"
        timeout = 5
        failure_threshold = 0
    "#;

    fn env(vars: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| {
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| (*v).to_owned())
        }
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.defaults.scan_interval, 30);
        assert_eq!(cfg.defaults.failure_threshold, 2);
        assert_eq!(cfg.defaults.timeout, 30);
        assert!(cfg.devices.is_empty());
        assert!(matches!(cfg.device(None), Err(ConfigError::NoDevice)));
    }

    #[test]
    fn device_selection() {
        let cfg = parse_config(SAMPLE).unwrap();
        assert_eq!(cfg.device(None).unwrap().0, "fw1");
        assert_eq!(cfg.device(Some("lab")).unwrap().0, "lab");
        assert!(matches!(
            cfg.device(Some("nope")),
            Err(ConfigError::UnknownDevice { .. })
        ));
    }

    #[test]
    fn single_device_needs_no_default() {
        let cfg = parse_config("[devices.only]\nurl = \"https://fw\"").unwrap();
        assert_eq!(cfg.device(None).unwrap().0, "only");
    }

    #[test]
    fn env_credential_wins_over_plaintext() {
        let cfg = parse_config(SAMPLE).unwrap();
        let device = &cfg.devices["fw1"];
        let creds = resolve_credentials_with(device, "fw1", env(&[("FW1_API_KEY", "from-env")]))
            .unwrap()
            .unwrap();
        assert_eq!(creds.key.expose_secret(), "from-env");
        assert_eq!(creds.secret.expose_secret(), "plain-secret");
    }

    #[test]
    fn half_a_key_pair_is_rejected() {
        let cfg = parse_config(SAMPLE).unwrap();
        let err = resolve_credentials_with(&cfg.devices["fw1"], "fw1", env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::IncompleteCredentials { .. }));
    }

    #[test]
    fn no_credentials_is_fine() {
        let cfg = parse_config(SAMPLE).unwrap();
        assert!(
            resolve_credentials_with(&cfg.devices["lab"], "lab", env(&[]))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn device_to_config_applies_overrides() {
        let cfg = parse_config(SAMPLE).unwrap();
        let lab = device_to_config(&cfg.devices["lab"], "lab", &cfg.defaults).unwrap();

        assert_eq!(lab.identity.unique_id, "10.0.0.1");
        assert_eq!(lab.identity.name, "lab");
        assert_eq!(lab.timeout, Duration::from_secs(5));
        assert_eq!(lab.scan_interval, Duration::from_secs(60));
        assert_eq!(lab.failure_threshold, 0);
        assert_eq!(
            lab.tls,
            TlsVerification::CustomCa(PathBuf::from("/etc/opnwatch/lab-ca.pem"))
        );
        assert_eq!(lab.status_path, "api/opnwatch/status");
    }

    #[test]
    fn invalid_url_is_validation_error() {
        let device = Device {
            url: "not a url".into(),
            ..Device::default()
        };
        let err = device_to_config(&device, "bad", &Defaults::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn redacted_hides_plaintext_secrets() {
        let cfg = parse_config(SAMPLE).unwrap().redacted();
        let rendered = cfg.to_toml().unwrap();
        assert!(!rendered.contains("plain-secret"));
        assert!(rendered.contains(REDACTED));
        assert!(rendered.contains("FW1_API_KEY"));
    }
}
