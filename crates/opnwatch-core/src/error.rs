// ── Core error types ──
//
// User-facing errors from opnwatch-core. Consumers never see HTTP status
// codes or JSON parse failures directly; the `From<opnwatch_api::Error>`
// impls translate transport-layer errors into fetch failures.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Fetch errors ─────────────────────────────────────────────────
    #[error("Failed to fetch status: {0}")]
    Fetch(#[from] FetchError),

    /// The first poll during setup failed; the integration never started.
    #[error("Device '{device}' is not ready: {message}")]
    NotReady { device: String, message: String },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Coordinator has been shut down")]
    Shutdown,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// A failed status fetch.
///
/// Carries a human-readable message for logging and a hint whether the
/// next poll is likely to succeed. Retry policy lives in the coordinator,
/// never in the fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FetchError {
    pub message: String,
    pub transient: bool,
}

impl FetchError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: true,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: false,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<opnwatch_api::Error> for FetchError {
    fn from(err: opnwatch_api::Error) -> Self {
        Self {
            transient: err.is_transient(),
            message: err.to_string(),
        }
    }
}

impl From<opnwatch_api::Error> for CoreError {
    fn from(err: opnwatch_api::Error) -> Self {
        match err {
            opnwatch_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            opnwatch_api::Error::Tls(msg) => CoreError::Config {
                message: format!("TLS setup failed: {msg}"),
            },
            other => CoreError::Fetch(other.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_timeout_becomes_transient_fetch_error() {
        let err: FetchError = opnwatch_api::Error::Timeout { timeout_secs: 5 }.into();
        assert!(err.transient);
        assert_eq!(err.message, "Request timed out after 5s");
    }

    #[test]
    fn tls_setup_error_is_config_error() {
        let err: CoreError = opnwatch_api::Error::Tls("bad pem".into()).into();
        assert!(matches!(err, CoreError::Config { .. }));
    }

    #[test]
    fn auth_failure_is_permanent_fetch_error() {
        let err: CoreError = opnwatch_api::Error::Authentication {
            message: "device answered 401".into(),
        }
        .into();
        match err {
            CoreError::Fetch(fetch) => assert!(!fetch.transient),
            other => panic!("expected Fetch, got {other:?}"),
        }
    }
}
