// ── Entity manager ──
//
// Reconciles the live reader set against what the descriptor callback
// proposes for the current snapshot. Additive only: a reader, once created,
// lives until the manager is dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use indexmap::IndexMap;
use tracing::debug;

use super::slug::entity_unique_id;
use crate::coordinator::Subscription;
use crate::integration::IntegrationContext;
use crate::sensor::{BinarySensor, BinarySensorDescription};
use crate::snapshot::Snapshot;

/// Proposes reader descriptions for a snapshot.
pub type DescriptorFn =
    dyn Fn(&IntegrationContext, &Snapshot) -> Vec<BinarySensorDescription> + Send + Sync;

/// Receives readers the first time they are created.
pub type AddedFn = dyn Fn(&[Arc<BinarySensor>]) + Send + Sync;

/// Owns the reader set of one integration.
///
/// Cheaply cloneable; clones share the same set.
#[derive(Clone)]
pub struct EntityManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    ctx: IntegrationContext,
    descriptors: Box<DescriptorFn>,
    on_added: Box<AddedFn>,
    entities: Mutex<IndexMap<String, Arc<BinarySensor>>>,
    subscription: Mutex<Option<Subscription>>,
}

impl EntityManager {
    pub fn new<D, A>(ctx: IntegrationContext, descriptors: D, on_added: A) -> Self
    where
        D: Fn(&IntegrationContext, &Snapshot) -> Vec<BinarySensorDescription>
            + Send
            + Sync
            + 'static,
        A: Fn(&[Arc<BinarySensor>]) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(ManagerInner {
                ctx,
                descriptors: Box::new(descriptors),
                on_added: Box::new(on_added),
                entities: Mutex::new(IndexMap::new()),
                subscription: Mutex::new(None),
            }),
        }
    }

    pub fn context(&self) -> &IntegrationContext {
        &self.inner.ctx
    }

    /// Create readers for descriptions not seen before.
    ///
    /// Existing readers are left untouched. Newly created readers are handed
    /// to the `on_added` sink and returned, in proposal order.
    pub fn process_entities(&self) -> Vec<Arc<BinarySensor>> {
        self.inner.process_entities()
    }

    /// Re-run [`process_entities`](Self::process_entities) after every
    /// coordinator notification. Calling it again is a no-op.
    pub fn attach(&self) {
        let mut slot = lock(&self.inner.subscription);
        if slot.is_some() {
            return;
        }

        let weak: Weak<ManagerInner> = Arc::downgrade(&self.inner);
        *slot = Some(self.inner.ctx.coordinator.subscribe(move |_update| {
            if let Some(inner) = weak.upgrade() {
                inner.process_entities();
            }
            Ok(())
        }));
    }

    /// Stop reacting to coordinator notifications. Readers are kept.
    pub fn detach(&self) {
        let released = lock(&self.inner.subscription).take();
        drop(released);
    }

    pub fn is_attached(&self) -> bool {
        lock(&self.inner.subscription).is_some()
    }

    /// Live readers in creation order.
    pub fn entities(&self) -> Vec<Arc<BinarySensor>> {
        lock(&self.inner.entities).values().cloned().collect()
    }

    pub fn get(&self, unique_id: &str) -> Option<Arc<BinarySensor>> {
        lock(&self.inner.entities).get(unique_id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner.entities).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.inner.entities).is_empty()
    }

    /// Drop every reader and the coordinator subscription.
    pub fn clear(&self) {
        self.detach();
        let released = std::mem::take(&mut *lock(&self.inner.entities));
        debug!(count = released.len(), "released entities");
        drop(released);
    }
}

impl ManagerInner {
    fn process_entities(&self) -> Vec<Arc<BinarySensor>> {
        let snapshot = self.ctx.coordinator.data();
        let proposed = (self.descriptors)(&self.ctx, &snapshot);

        let added: Vec<Arc<BinarySensor>> = {
            let mut entities = lock(&self.entities);
            let mut added = Vec::new();
            for description in proposed {
                let unique_id = entity_unique_id(&self.ctx.device, &description.key);
                if entities.contains_key(&unique_id) {
                    continue;
                }
                let sensor = Arc::new(BinarySensor::new(&self.ctx, description));
                entities.insert(unique_id, Arc::clone(&sensor));
                added.push(sensor);
            }
            added
        };

        if !added.is_empty() {
            debug!(
                device = %self.ctx.device.name,
                added = added.len(),
                "new entities discovered"
            );
            (self.on_added)(&added);
        }
        added
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl std::fmt::Debug for EntityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityManager")
            .field("device", &self.inner.ctx.device.name)
            .field("entities", &self.len())
            .field("attached", &self.is_attached())
            .finish()
    }
}
