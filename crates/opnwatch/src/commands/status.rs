//! `status`: poll once and print every indicator.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tabled::Tabled;

use opnwatch_core::{
    BinarySensor, BinarySensorState, DeviceClass, HttpFetcher, Integration, TriState,
};

use crate::cli::{GlobalOpts, StatusArgs};
use crate::error::CliError;
use crate::output;

// ── Report types ────────────────────────────────────────────────────

/// One indicator as printed by `status -o json`.
#[derive(Debug, Serialize)]
pub struct SensorReport {
    pub unique_id: String,
    pub name: String,
    pub key: String,
    pub device_class: Option<DeviceClass>,
    pub enabled_default: bool,
    #[serde(flatten)]
    pub state: BinarySensorState,
}

impl From<&Arc<BinarySensor>> for SensorReport {
    fn from(s: &Arc<BinarySensor>) -> Self {
        Self {
            unique_id: s.unique_id().to_owned(),
            name: s.name().to_owned(),
            key: s.description().key.clone(),
            device_class: s.device_class(),
            enabled_default: s.enabled_default(),
            state: s.state(),
        }
    }
}

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct SensorRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Available")]
    available: String,
    #[tabled(rename = "Enabled")]
    enabled: String,
    #[tabled(rename = "Unique ID")]
    unique_id: String,
    #[tabled(rename = "Attributes")]
    attributes: String,
}

fn row(r: &SensorReport) -> SensorRow {
    let state = match r.state.is_on {
        TriState::On if r.device_class == Some(DeviceClass::Problem) => "on (problem)".into(),
        other => other.to_string(),
    };
    SensorRow {
        name: r.name.clone(),
        state,
        available: yes_no(r.state.available),
        enabled: yes_no(r.enabled_default),
        unique_id: r.unique_id.clone(),
        attributes: attributes_cell(&r.state),
    }
}

fn yes_no(b: bool) -> String {
    String::from(if b { "yes" } else { "no" })
}

/// Non-null attributes as `key=value` lines.
fn attributes_cell(state: &BinarySensorState) -> String {
    let lines: Vec<String> = state
        .attributes
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| match v.as_str() {
            Some(s) => format!("{k}={s}"),
            None => format!("{k}={v}"),
        })
        .collect();
    if lines.is_empty() {
        "-".into()
    } else {
        lines.join("\n")
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: StatusArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut device = crate::config::resolve_device(global)?;
    // One-shot: no background polling.
    device.scan_interval = Duration::ZERO;

    let fetcher = Arc::new(HttpFetcher::new(&device)?);
    let integration = Integration::setup(device, fetcher).await?;

    let reports: Vec<SensorReport> = integration
        .entities()
        .entities()
        .iter()
        .map(SensorReport::from)
        .collect();
    integration.teardown().await;

    let out = output::render_list(args.output, &reports, row)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
