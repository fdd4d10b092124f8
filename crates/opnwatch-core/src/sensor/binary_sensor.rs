// ── Binary sensors ──
//
// Each kind is a pure function of the snapshot. `BinarySensor` wraps a kind
// with its identity, tracks the coordinator, and publishes its derived
// state on a watch channel.

use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;

use super::{DeviceClass, TriState};
use crate::coordinator::{Coordinator, CoordinatorUpdate, Subscription};
use crate::entity::{entity_unique_id, slugify};
use crate::integration::IntegrationContext;
use crate::snapshot::Snapshot;

/// Firmware fields copied into attributes, each as `opnsense_<field>`.
const FIRMWARE_ATTRIBUTE_FIELDS: [&str; 9] = [
    "status",
    "status_msg",
    "last_check",
    "os_version",
    "product_id",
    "product_target",
    "product_version",
    "upgrade_needs_reboot",
    "download_size",
];

// ── Kinds ────────────────────────────────────────────────────────────

/// Every binary reader this crate knows how to derive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BinarySensorKind {
    /// CARP failover status of the device.
    CarpStatus,
    /// Whether the device has administrative notices waiting.
    PendingNoticesPresent,
    /// Whether a firmware update is available.
    FirmwareUpdateAvailable,
}

impl BinarySensorKind {
    pub const ALL: [Self; 3] = [
        Self::CarpStatus,
        Self::PendingNoticesPresent,
        Self::FirmwareUpdateAvailable,
    ];

    /// Stable descriptor key, fed into the unique id.
    pub fn key(self) -> &'static str {
        match self {
            Self::CarpStatus => "carp.status",
            Self::PendingNoticesPresent => "notices.pending_notices_present",
            Self::FirmwareUpdateAvailable => "firmware.update_available",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::CarpStatus => "CARP Status",
            Self::PendingNoticesPresent => "Pending Notices Present",
            Self::FirmwareUpdateAvailable => "Firmware Updates Available",
        }
    }

    pub fn enabled_default(self) -> bool {
        !matches!(self, Self::CarpStatus)
    }

    pub fn device_class(self) -> Option<DeviceClass> {
        match self {
            Self::CarpStatus => None,
            Self::PendingNoticesPresent | Self::FirmwareUpdateAvailable => {
                Some(DeviceClass::Problem)
            }
        }
    }

    /// Derive the reading. Absent or mistyped values yield `Unknown`.
    pub fn is_on(self, snapshot: &Snapshot) -> TriState {
        match self {
            Self::CarpStatus => snapshot.get_bool("carp_status").into(),
            Self::PendingNoticesPresent => snapshot
                .get_bool("notices.pending_notices_present")
                .into(),
            Self::FirmwareUpdateAvailable => match snapshot.get_str("firmware_update_info.status") {
                Some(status) => TriState::from(status == "update"),
                None => TriState::Unknown,
            },
        }
    }

    /// Reader-specific availability, ANDed with coordinator availability.
    pub fn prerequisites_met(self, snapshot: &Snapshot) -> bool {
        match self {
            Self::CarpStatus | Self::PendingNoticesPresent => true,
            Self::FirmwareUpdateAvailable => snapshot.has("firmware_update_info"),
        }
    }

    /// Best-effort extra fields; anything missing is `null`.
    pub fn attributes(self, snapshot: &Snapshot) -> IndexMap<String, Value> {
        match self {
            Self::CarpStatus => IndexMap::new(),
            Self::PendingNoticesPresent => IndexMap::from([(
                "pending_notices".to_owned(),
                snapshot.get_or_null("notices.pending_notices"),
            )]),
            Self::FirmwareUpdateAvailable => FIRMWARE_ATTRIBUTE_FIELDS
                .iter()
                .map(|field| {
                    (
                        format!("opnsense_{}", slugify(field)),
                        snapshot.get_or_null(&format!("firmware_update_info.{field}")),
                    )
                })
                .collect(),
        }
    }
}

// ── Descriptions ─────────────────────────────────────────────────────

/// Static metadata for one reader, as proposed by a descriptor callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinarySensorDescription {
    pub kind: BinarySensorKind,
    pub key: String,
    pub name: String,
    pub device_class: Option<DeviceClass>,
    pub enabled_default: bool,
}

impl From<BinarySensorKind> for BinarySensorDescription {
    fn from(kind: BinarySensorKind) -> Self {
        Self {
            kind,
            key: kind.key().to_owned(),
            name: kind.label().to_owned(),
            device_class: kind.device_class(),
            enabled_default: kind.enabled_default(),
        }
    }
}

// ── Published state ──────────────────────────────────────────────────

/// Derived state of one reader at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinarySensorState {
    pub is_on: TriState,
    pub available: bool,
    pub attributes: IndexMap<String, Value>,
}

impl BinarySensorState {
    fn derive(kind: BinarySensorKind, snapshot: &Snapshot, coordinator_available: bool) -> Self {
        Self {
            is_on: kind.is_on(snapshot),
            available: coordinator_available && kind.prerequisites_met(snapshot),
            attributes: kind.attributes(snapshot),
        }
    }
}

// ── Reader ───────────────────────────────────────────────────────────

/// A live binary reader bound to one device's coordinator.
///
/// Reads are computed from the coordinator's current snapshot; the
/// published [`BinarySensorState`] follows every coordinator notification.
/// Dropping the reader releases its coordinator subscription.
pub struct BinarySensor {
    inner: Arc<SensorInner>,
    _subscription: Subscription,
}

struct SensorInner {
    description: BinarySensorDescription,
    unique_id: String,
    name: String,
    coordinator: Coordinator,
    state: watch::Sender<BinarySensorState>,
}

impl BinarySensor {
    pub fn new(ctx: &IntegrationContext, description: BinarySensorDescription) -> Self {
        let unique_id = entity_unique_id(&ctx.device, &description.key);
        let name = format!("{} {}", ctx.device.name, description.name);
        let initial = BinarySensorState::derive(
            description.kind,
            &ctx.coordinator.data(),
            ctx.coordinator.available(),
        );
        let (state, _) = watch::channel(initial);

        let inner = Arc::new(SensorInner {
            description,
            unique_id,
            name,
            coordinator: ctx.coordinator.clone(),
            state,
        });

        let weak: Weak<SensorInner> = Arc::downgrade(&inner);
        let subscription = ctx.coordinator.subscribe(move |update| {
            if let Some(inner) = weak.upgrade() {
                inner.apply(update);
            }
            Ok(())
        });

        Self {
            inner,
            _subscription: subscription,
        }
    }

    pub fn unique_id(&self) -> &str {
        &self.inner.unique_id
    }

    /// Display label: device name followed by the descriptor label.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn description(&self) -> &BinarySensorDescription {
        &self.inner.description
    }

    pub fn kind(&self) -> BinarySensorKind {
        self.inner.description.kind
    }

    pub fn enabled_default(&self) -> bool {
        self.inner.description.enabled_default
    }

    pub fn device_class(&self) -> Option<DeviceClass> {
        self.inner.description.device_class
    }

    pub fn is_on(&self) -> TriState {
        self.kind().is_on(&self.inner.coordinator.data())
    }

    pub fn available(&self) -> bool {
        self.inner.coordinator.available()
            && self.kind().prerequisites_met(&self.inner.coordinator.data())
    }

    pub fn attributes(&self) -> IndexMap<String, Value> {
        self.kind().attributes(&self.inner.coordinator.data())
    }

    /// The state as of the last coordinator notification.
    pub fn state(&self) -> BinarySensorState {
        self.inner.state.borrow().clone()
    }

    /// Observe published state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<BinarySensorState> {
        self.inner.state.subscribe()
    }
}

impl SensorInner {
    fn apply(&self, update: &CoordinatorUpdate) {
        let next =
            BinarySensorState::derive(self.description.kind, &update.snapshot, update.available);

        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            if current.is_on != next.is_on || current.available != next.available {
                debug!(
                    sensor = %self.unique_id,
                    from = %current.is_on,
                    to = %next.is_on,
                    available = next.available,
                    "binary sensor changed"
                );
            }
            *current = next;
            true
        });
    }
}

impl std::fmt::Debug for BinarySensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinarySensor")
            .field("unique_id", &self.inner.unique_id)
            .field("name", &self.inner.name)
            .field("kind", &self.inner.description.kind)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::testing::{ScriptedFetcher, device_config};

    fn snap(value: Value) -> Snapshot {
        Snapshot::from_value(value).unwrap()
    }

    fn context(fetcher: Arc<ScriptedFetcher>) -> IntegrationContext {
        let config = device_config(2);
        IntegrationContext {
            device: config.identity.clone(),
            coordinator: Coordinator::new(config, fetcher),
        }
    }

    #[test]
    fn carp_reads_carp_status() {
        let kind = BinarySensorKind::CarpStatus;
        assert_eq!(kind.is_on(&snap(json!({ "carp_status": true }))), TriState::On);
        assert_eq!(kind.is_on(&snap(json!({ "carp_status": false }))), TriState::Off);
        assert_eq!(kind.is_on(&snap(json!({ "carp_status": "up" }))), TriState::Unknown);
        assert!(kind.attributes(&snap(json!({ "carp_status": true }))).is_empty());
        assert_eq!(kind.device_class(), None);
        assert!(!kind.enabled_default());
    }

    #[test]
    fn pending_notices_reads_flag_and_lists_notices() {
        let kind = BinarySensorKind::PendingNoticesPresent;
        let s = snap(json!({
            "notices": { "pending_notices_present": true, "pending_notices": ["n1"] }
        }));
        assert_eq!(kind.is_on(&s), TriState::On);
        assert_eq!(kind.attributes(&s)["pending_notices"], json!(["n1"]));
        assert_eq!(kind.device_class(), Some(DeviceClass::Problem));
    }

    #[test]
    fn pending_notices_attribute_is_null_when_missing() {
        let kind = BinarySensorKind::PendingNoticesPresent;
        let s = snap(json!({ "notices": { "pending_notices_present": false } }));
        assert_eq!(kind.is_on(&s), TriState::Off);
        assert_eq!(kind.attributes(&s)["pending_notices"], Value::Null);
    }

    #[test]
    fn firmware_update_available_when_status_is_update() {
        let kind = BinarySensorKind::FirmwareUpdateAvailable;
        let s = snap(json!({ "firmware_update_info": { "status": "update", "download_size": 1024 } }));
        assert_eq!(kind.is_on(&s), TriState::On);
        assert!(kind.prerequisites_met(&s));

        let attrs = kind.attributes(&s);
        assert_eq!(attrs["opnsense_download_size"], json!(1024));
        assert_eq!(attrs["opnsense_status"], json!("update"));
        assert_eq!(attrs["opnsense_os_version"], Value::Null);
        assert_eq!(attrs.len(), FIRMWARE_ATTRIBUTE_FIELDS.len());
        assert_eq!(attrs.keys().next().map(String::as_str), Some("opnsense_status"));
    }

    #[test]
    fn firmware_other_status_is_off() {
        let kind = BinarySensorKind::FirmwareUpdateAvailable;
        let s = snap(json!({ "firmware_update_info": { "status": "none" } }));
        assert_eq!(kind.is_on(&s), TriState::Off);
    }

    #[test]
    fn firmware_mistyped_status_is_unknown() {
        let kind = BinarySensorKind::FirmwareUpdateAvailable;
        for status in [json!(5), json!(true), json!(["update"]), json!({ "s": "update" })] {
            let s = snap(json!({ "firmware_update_info": { "status": status } }));
            assert_eq!(kind.is_on(&s), TriState::Unknown, "{status}");
        }
        let s = snap(json!({ "firmware_update_info": { "status": null } }));
        assert_eq!(kind.is_on(&s), TriState::Unknown);
    }

    #[test]
    fn pending_notices_mistyped_flag_is_unknown() {
        let kind = BinarySensorKind::PendingNoticesPresent;
        let s = snap(json!({ "notices": { "pending_notices_present": "yes" } }));
        assert_eq!(kind.is_on(&s), TriState::Unknown);
        let s = snap(json!({ "notices": "none" }));
        assert_eq!(kind.is_on(&s), TriState::Unknown);
    }

    #[test]
    fn firmware_null_info_fails_prerequisites() {
        let kind = BinarySensorKind::FirmwareUpdateAvailable;
        let s = snap(json!({ "firmware_update_info": null }));
        assert!(!kind.prerequisites_met(&s));
        assert_eq!(kind.is_on(&s), TriState::Unknown);
        assert!(!kind.prerequisites_met(&Snapshot::empty()));
    }

    #[test]
    fn empty_snapshot_is_unknown_everywhere() {
        let empty = Snapshot::empty();
        for kind in BinarySensorKind::ALL {
            assert_eq!(kind.is_on(&empty), TriState::Unknown, "{kind:?}");
            let _ = kind.attributes(&empty);
        }
    }

    #[test]
    fn description_from_kind() {
        let desc = BinarySensorDescription::from(BinarySensorKind::FirmwareUpdateAvailable);
        assert_eq!(desc.key, "firmware.update_available");
        assert_eq!(desc.name, "Firmware Updates Available");
        assert!(desc.enabled_default);
    }

    #[tokio::test]
    async fn reader_identity_follows_device() {
        let ctx = context(ScriptedFetcher::new(vec![]));
        let sensor = BinarySensor::new(&ctx, BinarySensorKind::FirmwareUpdateAvailable.into());

        assert_eq!(sensor.unique_id(), "aa_bb_cc_dd_ee_ff_firmware_update_available");
        assert_eq!(sensor.name(), "OPNsense Firmware Updates Available");
    }

    #[tokio::test]
    async fn reader_tracks_coordinator_updates() {
        let ctx = context(ScriptedFetcher::new(vec![
            Ok(json!({ "carp_status": true })),
            Ok(json!({ "carp_status": false })),
        ]));
        let sensor = BinarySensor::new(&ctx, BinarySensorKind::CarpStatus.into());
        let mut rx = sensor.subscribe_state();
        assert_eq!(sensor.state().is_on, TriState::Unknown);

        ctx.coordinator.refresh().await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().is_on, TriState::On);
        assert_eq!(sensor.is_on(), TriState::On);

        ctx.coordinator.refresh().await;
        assert_eq!(sensor.state().is_on, TriState::Off);
    }

    #[tokio::test]
    async fn unchanged_state_is_not_republished() {
        let ctx = context(ScriptedFetcher::new(vec![
            Ok(json!({ "carp_status": true })),
            Ok(json!({ "carp_status": true, "other": 1 })),
        ]));
        let sensor = BinarySensor::new(&ctx, BinarySensorKind::CarpStatus.into());
        let mut rx = sensor.subscribe_state();

        ctx.coordinator.refresh().await;
        rx.borrow_and_update();
        ctx.coordinator.refresh().await;
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn reader_goes_unavailable_with_coordinator() {
        let ctx = context(ScriptedFetcher::new(vec![
            Ok(json!({ "carp_status": true })),
            Err("a"),
            Err("b"),
            Err("c"),
        ]));
        let sensor = BinarySensor::new(&ctx, BinarySensorKind::CarpStatus.into());

        for _ in 0..3 {
            ctx.coordinator.refresh().await;
        }
        assert!(sensor.available());
        assert_eq!(sensor.is_on(), TriState::On, "stale value is kept");

        ctx.coordinator.refresh().await;
        assert!(!sensor.available());
        assert!(!sensor.state().available);
    }

    #[tokio::test]
    async fn dropping_reader_releases_subscription() {
        let ctx = context(ScriptedFetcher::new(vec![]));
        let sensor = BinarySensor::new(&ctx, BinarySensorKind::CarpStatus.into());
        assert_eq!(ctx.coordinator.subscriber_count(), 1);

        drop(sensor);
        assert_eq!(ctx.coordinator.subscriber_count(), 0);
    }
}
