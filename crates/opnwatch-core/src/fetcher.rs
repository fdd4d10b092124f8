// ── Snapshot fetching ──
//
// The coordinator only knows the `Fetcher` trait. `HttpFetcher` is the
// shipped implementation on top of `opnwatch_api::StatusClient`; tests and
// embedders plug in their own.

use async_trait::async_trait;
use tracing::debug;

use opnwatch_api::transport::{TlsMode, TransportConfig};
use opnwatch_api::{ApiCredentials, StatusClient};

use crate::config::{DeviceConfig, TlsVerification};
use crate::error::{CoreError, FetchError};
use crate::snapshot::Snapshot;

/// Produces one status snapshot per call.
///
/// Implementations must not retry; a failed fetch is reported as-is and the
/// coordinator decides what to do with it.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, device: &DeviceConfig) -> Result<Snapshot, FetchError>;
}

/// Fetches snapshots from the device's JSON status endpoint.
pub struct HttpFetcher {
    client: StatusClient,
}

impl HttpFetcher {
    /// Build the HTTP stack for `config`. TLS and URL problems surface
    /// here, once, rather than on every poll.
    pub fn new(config: &DeviceConfig) -> Result<Self, CoreError> {
        let credentials = config.credentials.as_ref().map(|c| ApiCredentials {
            key: c.key.clone(),
            secret: c.secret.clone(),
        });
        let client = StatusClient::new(
            &config.url,
            &config.status_path,
            credentials,
            &build_transport(config),
        )?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, device: &DeviceConfig) -> Result<Snapshot, FetchError> {
        debug!(device = %device.identity.name, url = %self.client.status_url(), "fetching status");
        let map = self.client.fetch_status().await?;
        Ok(Snapshot::from_map(map))
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

/// Build a [`TransportConfig`] from the device configuration.
fn build_transport(config: &DeviceConfig) -> TransportConfig {
    TransportConfig {
        tls: tls_to_transport(&config.tls),
        timeout: config.timeout,
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}
