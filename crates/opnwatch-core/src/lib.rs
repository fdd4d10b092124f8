//! Polling and derived-state layer between `opnwatch-api` and consumers.
//!
//! One device, one coordinator. Everything else reads from it:
//!
//! - **[`Coordinator`]**: polls a [`Fetcher`] on a fixed interval, keeps the
//!   last good [`Snapshot`], tolerates transient failures up to a threshold
//!   and notifies subscribers after every poll.
//!
//! - **[`EntityManager`]**: turns descriptor proposals into live readers,
//!   creating each one exactly once and picking up new ones on later polls.
//!
//! - **[`BinarySensor`]**: a pure snapshot-to-[`TriState`] reader (CARP
//!   status, pending notices, firmware updates) that republishes its state
//!   on a `watch` channel.
//!
//! - **[`Integration`]**: setup and teardown of the above for one device,
//!   carried by an explicit [`IntegrationContext`].

pub mod config;
pub mod coordinator;
pub mod entity;
pub mod error;
pub mod fetcher;
pub mod integration;
pub mod sensor;
pub mod snapshot;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ApiKeyPair, DeviceConfig, DeviceIdentity, TlsVerification};
pub use coordinator::{
    Coordinator, CoordinatorStatus, CoordinatorUpdate, ListenerResult, RefreshOutcome,
    Subscription,
};
pub use entity::{EntityManager, slugify};
pub use error::{CoreError, FetchError};
pub use fetcher::{Fetcher, HttpFetcher};
pub use integration::{Integration, IntegrationContext, binary_sensor_descriptions};
pub use sensor::{
    BinarySensor, BinarySensorDescription, BinarySensorKind, BinarySensorState, DeviceClass,
    TriState,
};
pub use snapshot::{Snapshot, dict_get};
