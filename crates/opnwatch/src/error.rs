//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use opnwatch_config::ConfigError;
use opnwatch_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Device '{device}' is not ready: {message}")]
    #[diagnostic(
        code(opnwatch::not_ready),
        help(
            "The first status poll failed.\n\
             Check the URL and API credentials, or use --insecure (-k) for a self-signed certificate.\n\
             Try: opnwatch status -v"
        )
    )]
    NotReady { device: String, message: String },

    #[error("Could not set up the HTTP client: {message}")]
    #[diagnostic(
        code(opnwatch::client_setup),
        help("Check ca_cert in your device profile, or use --insecure (-k).")
    )]
    ClientSetup { message: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Incomplete API credentials for device '{device}'")]
    #[diagnostic(
        code(opnwatch::incomplete_credentials),
        help(
            "Set both the API key and the API secret, or neither.\n\
             Use api_key_env / api_secret_env in the profile, or OPNWATCH_API_KEY / OPNWATCH_API_SECRET."
        )
    )]
    IncompleteCredentials { device: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Device '{name}' not found in configuration")]
    #[diagnostic(code(opnwatch::device_not_found), help("Available devices: {available}"))]
    DeviceNotFound { name: String, available: String },

    #[error("No device configured")]
    #[diagnostic(
        code(opnwatch::no_config),
        help(
            "Add a [devices.<name>] section to {path}\n\
             Or pass --url for a one-off poll."
        )
    )]
    NoConfig { path: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(opnwatch::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(code(opnwatch::config))]
    Config(Box<figment::Error>),

    // ── Internal ─────────────────────────────────────────────────────
    #[error("{0}")]
    #[diagnostic(code(opnwatch::internal))]
    Internal(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(opnwatch::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotReady { .. } | Self::ClientSetup { .. } => exit_code::CONNECTION,
            Self::IncompleteCredentials { .. } => exit_code::AUTH,
            Self::DeviceNotFound { .. } | Self::NoConfig { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotReady { device, message } => CliError::NotReady { device, message },
            CoreError::Config { message } => CliError::ClientSetup { message },
            CoreError::Fetch(e) => CliError::NotReady {
                device: "(unknown)".into(),
                message: e.message,
            },
            CoreError::Shutdown => CliError::Internal("coordinator shut down during setup".into()),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::UnknownDevice { name } => CliError::DeviceNotFound {
                name,
                available: String::new(),
            },
            ConfigError::NoDevice => CliError::NoConfig {
                path: opnwatch_config::config_path().display().to_string(),
            },
            ConfigError::IncompleteCredentials { device } => {
                CliError::IncompleteCredentials { device }
            }
            ConfigError::Serialization(e) => CliError::Internal(e.to_string()),
            ConfigError::Figment(e) => CliError::Config(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ready_is_a_connection_failure() {
        let err: CliError = CoreError::NotReady {
            device: "fw1".into(),
            message: "refused".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::CONNECTION);
        assert_eq!(err.to_string(), "Device 'fw1' is not ready: refused");
    }

    #[test]
    fn config_errors_map_to_exit_codes() {
        let err: CliError = ConfigError::IncompleteCredentials {
            device: "fw1".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::AUTH);

        let err: CliError = ConfigError::NoDevice.into();
        assert_eq!(err.exit_code(), exit_code::NOT_FOUND);
    }
}
