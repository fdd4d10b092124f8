// opnwatch-api: Async transport for fetching OPNsense status snapshots

pub mod error;
pub mod status;
pub mod transport;

pub use error::Error;
pub use status::{ApiCredentials, DEFAULT_STATUS_PATH, StatusClient};
pub use transport::{TlsMode, TransportConfig};
