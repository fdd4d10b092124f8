// ── Integration lifecycle ──
//
// Wires one device together: coordinator, entity manager, binary sensors.
// All per-device state hangs off `IntegrationContext`; nothing is global.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{DeviceConfig, DeviceIdentity};
use crate::coordinator::{Coordinator, RefreshOutcome};
use crate::entity::EntityManager;
use crate::error::CoreError;
use crate::fetcher::Fetcher;
use crate::sensor::{BinarySensor, BinarySensorDescription, BinarySensorKind};
use crate::snapshot::Snapshot;

/// Everything a reader needs to know about the device it belongs to.
#[derive(Clone)]
pub struct IntegrationContext {
    pub device: DeviceIdentity,
    pub coordinator: Coordinator,
}

impl std::fmt::Debug for IntegrationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrationContext")
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

/// Descriptor callback for the binary-sensor platform.
///
/// Proposes every known reader regardless of snapshot shape; readers whose
/// data is missing report `Unknown` rather than being withheld.
pub fn binary_sensor_descriptions(
    _ctx: &IntegrationContext,
    _snapshot: &Snapshot,
) -> Vec<BinarySensorDescription> {
    BinarySensorKind::ALL
        .into_iter()
        .map(BinarySensorDescription::from)
        .collect()
}

/// A running device integration.
#[derive(Debug)]
pub struct Integration {
    ctx: IntegrationContext,
    entities: EntityManager,
}

impl Integration {
    /// Bring a device up.
    ///
    /// Performs the first poll before anything else; if it fails the device
    /// is reported not ready and nothing is left running.
    pub async fn setup(config: DeviceConfig, fetcher: Arc<dyn Fetcher>) -> Result<Self, CoreError> {
        Self::setup_with(config, fetcher, |_| {}).await
    }

    /// Like [`setup`](Self::setup), with a sink that receives readers as
    /// they are created, including those found on later polls.
    pub async fn setup_with<A>(
        config: DeviceConfig,
        fetcher: Arc<dyn Fetcher>,
        on_added: A,
    ) -> Result<Self, CoreError>
    where
        A: Fn(&[Arc<BinarySensor>]) + Send + Sync + 'static,
    {
        let device = config.identity.clone();
        let coordinator = Coordinator::new(config, fetcher);

        match coordinator.refresh().await {
            RefreshOutcome::Updated => {}
            RefreshOutcome::Failed { error, .. } => {
                warn!(device = %device.name, error = %error, "first poll failed");
                coordinator.shutdown().await;
                return Err(CoreError::NotReady {
                    device: device.name,
                    message: error,
                });
            }
            RefreshOutcome::Stopped => return Err(CoreError::Shutdown),
        }

        let ctx = IntegrationContext {
            device,
            coordinator: coordinator.clone(),
        };
        let entities = EntityManager::new(ctx.clone(), binary_sensor_descriptions, on_added);
        entities.process_entities();
        entities.attach();
        coordinator.start().await;

        info!(
            device = %ctx.device.name,
            entities = entities.len(),
            "integration ready"
        );
        Ok(Self { ctx, entities })
    }

    pub fn context(&self) -> &IntegrationContext {
        &self.ctx
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.ctx.coordinator
    }

    pub fn entities(&self) -> &EntityManager {
        &self.entities
    }

    /// Stop polling and release every reader.
    pub async fn teardown(self) {
        self.ctx.coordinator.shutdown().await;
        self.entities.clear();
        info!(device = %self.ctx.device.name, "integration torn down");
    }
}
