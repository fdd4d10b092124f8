// ── Polling coordinator ──
//
// One coordinator per device. Owns the poll loop, the last good snapshot,
// the ordered subscriber set, and the failure policy. Readers never talk
// to the device; they read `data()` and react to notifications.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DeviceConfig;
use crate::error::FetchError;
use crate::fetcher::Fetcher;
use crate::snapshot::Snapshot;

/// What a subscriber callback returns. An `Err` is logged and otherwise
/// ignored; it never stops delivery to later subscribers.
pub type ListenerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

type Listener = Arc<dyn Fn(&CoordinatorUpdate) -> ListenerResult + Send + Sync>;

// ── Observable state ─────────────────────────────────────────────────

/// Coarse health of the coordinator, observable via [`Coordinator::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorStatus {
    /// No poll has completed yet.
    Idle,
    /// The last poll succeeded.
    Ok,
    /// Recent polls failed but the failure threshold is not exceeded yet.
    Degraded { consecutive_failures: u32 },
    /// Failures exceeded the threshold; readers report unavailable.
    Unavailable { consecutive_failures: u32 },
    /// The coordinator has been shut down.
    Stopped,
}

/// Delivered to every subscriber after each completed poll.
#[derive(Debug, Clone)]
pub struct CoordinatorUpdate {
    /// The snapshot after this poll (the previous one if the poll failed).
    pub snapshot: Snapshot,
    /// Whether this poll fetched a new snapshot.
    pub success: bool,
    /// Whether the coordinator is still considered available.
    pub available: bool,
    pub consecutive_failures: u32,
    /// Error message of a failed poll.
    pub error: Option<String>,
}

/// Result of a single [`Coordinator::refresh`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated,
    Failed {
        consecutive_failures: u32,
        error: String,
    },
    /// Shutdown began before or during the poll; nothing was recorded.
    Stopped,
}

// ── Coordinator ──────────────────────────────────────────────────────

/// Shared poller, cache and notifier for one device.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`. Does NOT poll on its own
/// until [`start()`](Self::start) is called.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    config: DeviceConfig,
    fetcher: Arc<dyn Fetcher>,
    snapshot: ArcSwap<Snapshot>,
    consecutive_failures: AtomicU32,
    last_update_success: watch::Sender<Option<DateTime<Utc>>>,
    status: watch::Sender<CoordinatorStatus>,
    listeners: Mutex<IndexMap<u64, Listener>>,
    next_listener_id: AtomicU64,
    /// Serializes polls: at most one fetch in flight per device.
    refresh_lock: tokio::sync::Mutex<()>,
    cancel: CancellationToken,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Coordinator {
    pub fn new(config: DeviceConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        let (last_update_success, _) = watch::channel(None);
        let (status, _) = watch::channel(CoordinatorStatus::Idle);

        Self {
            inner: Arc::new(CoordinatorInner {
                config,
                fetcher,
                snapshot: ArcSwap::from_pointee(Snapshot::empty()),
                consecutive_failures: AtomicU32::new(0),
                last_update_success,
                status,
                listeners: Mutex::new(IndexMap::new()),
                next_listener_id: AtomicU64::new(0),
                refresh_lock: tokio::sync::Mutex::new(()),
                cancel: CancellationToken::new(),
                task: tokio::sync::Mutex::new(None),
            }),
        }
    }

    /// Access the device configuration.
    pub fn config(&self) -> &DeviceConfig {
        &self.inner.config
    }

    // ── Reads ────────────────────────────────────────────────────

    /// The last known snapshot. Never blocks; may be stale during an
    /// outage, and is `{}` until the first successful poll.
    pub fn data(&self) -> Snapshot {
        Snapshot::clone(&self.inner.snapshot.load())
    }

    /// `false` once consecutive failures exceed the configured threshold.
    pub fn available(&self) -> bool {
        self.consecutive_failures() <= self.inner.config.failure_threshold
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner.consecutive_failures.load(Ordering::Acquire)
    }

    pub fn last_update_success(&self) -> Option<DateTime<Utc>> {
        *self.inner.last_update_success.borrow()
    }

    /// How long ago the last successful poll landed, or `None` if never.
    pub fn data_age(&self) -> Option<chrono::Duration> {
        self.last_update_success().map(|t| Utc::now() - t)
    }

    /// Subscribe to coarse status changes.
    pub fn status(&self) -> watch::Receiver<CoordinatorStatus> {
        self.inner.status.subscribe()
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    // ── Subscriptions ────────────────────────────────────────────

    /// Register a callback invoked after every completed poll, successful
    /// or not. Callbacks run sequentially in registration order.
    ///
    /// The callback stays registered for as long as the returned
    /// [`Subscription`] is alive.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&CoordinatorUpdate) -> ListenerResult + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.inner.lock_listeners().insert(id, Arc::new(listener));
        Subscription {
            id,
            coordinator: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock_listeners().len()
    }

    // ── Polling ──────────────────────────────────────────────────

    /// Poll the device once.
    ///
    /// On success the stored snapshot is replaced wholesale; on failure it
    /// is kept and the failure counter grows. Subscribers are notified in
    /// both cases. Fetch errors are logged, never returned as `Err`.
    pub async fn refresh(&self) -> RefreshOutcome {
        let _guard = self.inner.refresh_lock.lock().await;
        if self.is_stopped() {
            return RefreshOutcome::Stopped;
        }

        let device = &self.inner.config.identity.name;
        let result = tokio::select! {
            biased;
            () = self.inner.cancel.cancelled() => {
                debug!(device = %device, "poll cancelled by shutdown");
                return RefreshOutcome::Stopped;
            }
            result = self.inner.fetcher.fetch(&self.inner.config) => result,
        };
        // Commit under the listener lock. `shutdown` clears the listeners
        // under the same lock, so a result is either applied before
        // teardown or not at all.
        let (update, outcome, listeners) = {
            let listeners = self.inner.lock_listeners();
            if self.is_stopped() {
                debug!(device = %device, "discarding poll result after shutdown");
                return RefreshOutcome::Stopped;
            }

            let (update, outcome) = self.apply(result);
            self.inner.status.send_replace(status_for(&update));
            let listeners: Vec<(u64, Listener)> = listeners
                .iter()
                .map(|(id, l)| (*id, Arc::clone(l)))
                .collect();
            (update, outcome, listeners)
        };

        notify(listeners, &update);
        outcome
    }

    /// Record a fetch result in the coordinator state.
    fn apply(&self, result: Result<Snapshot, FetchError>) -> (CoordinatorUpdate, RefreshOutcome) {
        let device = &self.inner.config.identity.name;
        match result {
            Ok(snapshot) => {
                let previous_failures = self.inner.consecutive_failures.swap(0, Ordering::AcqRel);
                if previous_failures > 0 {
                    info!(device = %device, previous_failures, "status fetch recovered");
                }
                self.inner.snapshot.store(Arc::new(snapshot.clone()));
                self.inner.last_update_success.send_replace(Some(Utc::now()));
                debug!(device = %device, "status snapshot updated");

                let update = CoordinatorUpdate {
                    snapshot,
                    success: true,
                    available: true,
                    consecutive_failures: 0,
                    error: None,
                };
                (update, RefreshOutcome::Updated)
            }
            Err(e) => {
                let consecutive_failures =
                    self.inner.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
                let available = consecutive_failures <= self.inner.config.failure_threshold;
                if available {
                    warn!(
                        device = %device,
                        consecutive_failures,
                        transient = e.transient,
                        error = %e,
                        "status fetch failed"
                    );
                } else {
                    warn!(
                        device = %device,
                        consecutive_failures,
                        error = %e,
                        "status fetch failed; device unavailable"
                    );
                }

                let update = CoordinatorUpdate {
                    snapshot: self.data(),
                    success: false,
                    available,
                    consecutive_failures,
                    error: Some(e.message.clone()),
                };
                let outcome = RefreshOutcome::Failed {
                    consecutive_failures,
                    error: e.message,
                };
                (update, outcome)
            }
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Spawn the periodic poll task. The first tick fires one full
    /// `scan_interval` from now; callers do their own initial refresh.
    ///
    /// No-op if already started, stopped, or `scan_interval` is zero.
    pub async fn start(&self) {
        let mut task = self.inner.task.lock().await;
        if task.is_some() || self.is_stopped() {
            return;
        }

        let period = self.inner.config.scan_interval;
        if period.is_zero() {
            debug!(device = %self.inner.config.identity.name, "periodic polling disabled");
            return;
        }

        let cancel = self.inner.cancel.clone();
        *task = Some(tokio::spawn(poll_task(self.clone(), period, cancel)));
        info!(
            device = %self.inner.config.identity.name,
            interval_secs = period.as_secs(),
            "polling started"
        );
    }

    /// Stop polling and release every subscriber.
    ///
    /// An in-flight fetch is cancelled; nothing is stored or delivered
    /// after this call begins.
    pub async fn shutdown(&self) {
        let released = {
            let mut listeners = self.inner.lock_listeners();
            self.inner.cancel.cancel();
            std::mem::take(&mut *listeners)
        };
        // Dropped outside the lock: a listener may own other subscriptions.
        drop(released);

        if let Some(handle) = self.inner.task.lock().await.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "poll task ended abnormally");
            }
        }

        // Wait out a manual refresh that is still winding down.
        drop(self.inner.refresh_lock.lock().await);
        self.inner.status.send_replace(CoordinatorStatus::Stopped);
        info!(device = %self.inner.config.identity.name, "coordinator stopped");
    }
}

impl CoordinatorInner {
    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, IndexMap<u64, Listener>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove_listener(&self, id: u64) {
        // Dropped outside the lock: a listener may own other subscriptions.
        let removed = self.lock_listeners().shift_remove(&id);
        drop(removed);
    }
}

/// Deliver `update` to each listener in registration order.
///
/// Takes a copy of the listener set so callbacks may subscribe or
/// unsubscribe without deadlocking.
fn notify(listeners: Vec<(u64, Listener)>, update: &CoordinatorUpdate) {
    for (id, listener) in listeners {
        match catch_unwind(AssertUnwindSafe(|| listener(update))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(listener = id, error = %e, "subscriber failed"),
            Err(_) => warn!(listener = id, "subscriber panicked"),
        }
    }
}

fn status_for(update: &CoordinatorUpdate) -> CoordinatorStatus {
    let consecutive_failures = update.consecutive_failures;
    if update.success {
        CoordinatorStatus::Ok
    } else if update.available {
        CoordinatorStatus::Degraded {
            consecutive_failures,
        }
    } else {
        CoordinatorStatus::Unavailable {
            consecutive_failures,
        }
    }
}

// ── Subscription handle ──────────────────────────────────────────────

/// Keeps a coordinator callback registered. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    coordinator: Weak<CoordinatorInner>,
}

impl Subscription {
    /// Explicitly unsubscribe. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.coordinator.upgrade() {
            inner.remove_listener(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

// ── Background task ──────────────────────────────────────────────────

/// Periodically refresh the device snapshot.
///
/// Ticks that fall due while a poll is still running are skipped, so polls
/// never pile up behind a slow device.
async fn poll_task(coordinator: Coordinator, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                coordinator.refresh().await;
            }
        }
    }
}
