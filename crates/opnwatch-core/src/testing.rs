// Test doubles shared by the unit tests in this crate.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{DeviceConfig, DeviceIdentity};
use crate::error::FetchError;
use crate::fetcher::Fetcher;
use crate::snapshot::Snapshot;

/// Replays a script of results, then keeps failing.
pub(crate) struct ScriptedFetcher {
    script: Mutex<VecDeque<Result<Snapshot, FetchError>>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub(crate) fn new(script: Vec<Result<Value, &str>>) -> Arc<Self> {
        let script = script
            .into_iter()
            .map(|r| {
                r.map(|v| Snapshot::from_value(v).unwrap())
                    .map_err(FetchError::transient)
            })
            .collect();
        Arc::new(Self {
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
        })
    }

    /// Queue another result behind whatever is left.
    pub(crate) fn push(&self, result: Result<Value, &str>) {
        let result = result
            .map(|v| Snapshot::from_value(v).unwrap())
            .map_err(FetchError::transient);
        self.script.lock().unwrap().push_back(result);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, _device: &DeviceConfig) -> Result<Snapshot, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::transient("script exhausted")))
    }
}

/// Never completes.
pub(crate) struct HangingFetcher;

#[async_trait]
impl Fetcher for HangingFetcher {
    async fn fetch(&self, _device: &DeviceConfig) -> Result<Snapshot, FetchError> {
        std::future::pending().await
    }
}

pub(crate) fn device_config(threshold: u32) -> DeviceConfig {
    let mut cfg = DeviceConfig::new(
        "https://192.168.1.1".parse().unwrap(),
        DeviceIdentity::new("AA:BB:CC:DD:EE:FF", "OPNsense"),
    );
    cfg.failure_threshold = threshold;
    cfg.scan_interval = Duration::from_secs(10);
    cfg
}
