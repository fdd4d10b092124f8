//! CLI-side configuration: loads the TOML config and applies command-line
//! overrides before translating to `opnwatch_core::DeviceConfig`.
//!
//! Core never sees these types -- it receives a pre-built `DeviceConfig`.

use std::path::PathBuf;

use opnwatch_config::{Config, ConfigError, Device};
use opnwatch_core::DeviceConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Config file in effect: `--config`, else the platform default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(opnwatch_config::config_path)
}

/// Load the full Config from file + environment.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(opnwatch_config::load_config_from(&config_path(global))?)
}

/// Resolve the device to poll from config and CLI flags.
///
/// With `--url` and no `--device`, an ad-hoc device is built from the
/// global defaults alone; the config file only contributes `[defaults]`.
pub fn resolve_device(global: &GlobalOpts) -> Result<DeviceConfig, CliError> {
    let cfg = load(global)?;
    let (name, profile) = select_device(&cfg, global)?;
    let device = apply_overrides(profile, global);
    Ok(opnwatch_config::device_to_config(&device, &name, &cfg.defaults)?)
}

fn select_device(cfg: &Config, global: &GlobalOpts) -> Result<(String, Device), CliError> {
    if let (Some(url), None) = (&global.url, &global.device) {
        let ad_hoc = Device {
            url: url.clone(),
            name: Some("OPNsense".into()),
            ..Device::default()
        };
        return Ok(("cli".into(), ad_hoc));
    }

    match cfg.device(global.device.as_deref()) {
        Ok((name, device)) => Ok((name.to_owned(), device.clone())),
        Err(ConfigError::UnknownDevice { name }) => Err(CliError::DeviceNotFound {
            name,
            available: available_devices(cfg),
        }),
        Err(ConfigError::NoDevice) => Err(CliError::NoConfig {
            path: config_path(global).display().to_string(),
        }),
        Err(other) => Err(other.into()),
    }
}

/// Command-line flags win over the profile.
fn apply_overrides(profile: Device, global: &GlobalOpts) -> Device {
    let mut device = profile;
    if let Some(ref url) = global.url {
        device.url.clone_from(url);
    }
    if global.insecure {
        device.insecure = Some(true);
    }
    if let Some(timeout) = global.timeout {
        device.timeout = Some(timeout);
    }
    if let Some(ref key) = global.api_key {
        device.api_key = Some(key.clone());
        device.api_key_env = None;
    }
    if let Some(ref secret) = global.api_secret {
        device.api_secret = Some(secret.clone());
        device.api_secret_env = None;
    }
    device
}

fn available_devices(cfg: &Config) -> String {
    if cfg.devices.is_empty() {
        "(none)".into()
    } else {
        cfg.devices.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}
