// ── Derived-value readers ──

pub mod binary_sensor;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub use binary_sensor::{
    BinarySensor, BinarySensorDescription, BinarySensorKind, BinarySensorState,
};

/// Binary reading with an explicit "could not tell" state.
///
/// `Unknown` is what a reader reports when its key path is absent or
/// carries the wrong type; it is never collapsed into `Off`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TriState {
    On,
    Off,
    #[default]
    Unknown,
}

impl From<bool> for TriState {
    fn from(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }
}

impl From<Option<bool>> for TriState {
    fn from(value: Option<bool>) -> Self {
        value.map_or(Self::Unknown, Self::from)
    }
}

/// Semantic class of a binary reader. `Problem` means "on" is bad news.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[non_exhaustive]
pub enum DeviceClass {
    Problem,
}
