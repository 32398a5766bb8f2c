//! Event-driven cache reconciliation.
//!
//! Each class moves `Uninitialized → Enumerating → Live`. Cold start is one
//! bulk enumeration per class that fully replaces that class's table; once
//! live, events are applied in arrival order. Events observed before a
//! class goes live are dropped: the enumeration snapshot is authoritative
//! on cold start, and live updates take precedence only afterwards.
//!
//! Event application is idempotent (last-write-wins on update, delete of
//! an absent key is a no-op), so at-least-once delivery is tolerated. A
//! transform or fetch failure for a single object is logged and skipped;
//! one malformed remote object must not stop the rest of the fleet from
//! being observable.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::cache::event::{EventOperation, ObjectEvent};
use crate::cache::store::CacheStore;
use crate::cache::transform::RecordTransform;
use crate::error::Result;
use crate::object::{ObjectClass, ObjectProxy};
use crate::remote::SessionPool;

/// Per-class synchronization state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Uninitialized,
    Enumerating,
    Live,
}

/// The cache's sole writer.
///
/// Runs as one background task per watched host connection, independent of
/// individual caller sessions.
pub struct CacheSynchronizer {
    pool: SessionPool,
    store: Arc<CacheStore>,
    transforms: Vec<Arc<dyn RecordTransform>>,
    states: RwLock<[SyncState; ObjectClass::ALL.len()]>,
}

impl CacheSynchronizer {
    /// A synchronizer over the given transforms.
    pub fn new(
        pool: SessionPool,
        store: Arc<CacheStore>,
        transforms: Vec<Arc<dyn RecordTransform>>,
    ) -> Self {
        Self {
            pool,
            store,
            transforms,
            states: RwLock::new(Default::default()),
        }
    }

    /// A synchronizer with the standard per-class transforms.
    pub fn with_default_transforms(pool: SessionPool, store: Arc<CacheStore>) -> Self {
        Self::new(pool, store, crate::cache::transform::default_transforms())
    }

    /// Current state of a class's mirror.
    pub fn state(&self, class: ObjectClass) -> SyncState {
        self.states.read()[class.index()]
    }

    fn set_state(&self, class: ObjectClass, state: SyncState) {
        self.states.write()[class.index()] = state;
    }

    /// Cold-start enumeration of every registered class.
    ///
    /// A class whose bulk fetch fails is logged and left uninitialized;
    /// the remaining classes still come up.
    pub async fn enumerate_all(&self) {
        for transform in &self.transforms {
            let class = transform.class();
            if let Err(err) = self.enumerate_class(transform.as_ref()).await {
                error!(class = %class, error = %err, "cold-start enumeration failed");
                self.set_state(class, SyncState::Uninitialized);
            }
        }
    }

    /// Fetch all remote records of one class and replace its table.
    async fn enumerate_class(&self, transform: &dyn RecordTransform) -> Result<()> {
        let class = transform.class();
        self.set_state(class, SyncState::Enumerating);

        let lease = self.pool.acquire().await?;
        let records = ObjectProxy::invoke_static(class, &lease, "get_all_records", &[]).await?;
        drop(lease);

        let mut documents = HashMap::new();
        if let Some(by_ref) = records.as_object() {
            for (object_ref, record) in by_ref {
                if !transform.filter(record) {
                    continue;
                }
                let Some(uuid) = record.get("uuid").and_then(Value::as_str) else {
                    warn!(class = %class, object_ref, "record without uuid skipped");
                    continue;
                };
                match transform.transform(uuid, object_ref, record) {
                    Ok(Some(document)) => {
                        documents.insert(uuid.to_string(), document);
                    }
                    Ok(None) => {}
                    Err(err) => {
                        // Leave this object out; everything else proceeds.
                        warn!(class = %class, uuid, error = %err, "record transform failed, skipping");
                    }
                }
            }
        } else {
            warn!(class = %class, "bulk enumeration returned a non-map result");
        }

        let count = documents.len();
        self.store.replace_all(class, documents);
        self.set_state(class, SyncState::Live);
        info!(class = %class, count, "class mirror is live");
        Ok(())
    }

    /// Consume the event feed until the sender closes.
    ///
    /// Enumerates every class first, then applies events in arrival order.
    /// Events already queued when enumeration finishes predate the snapshot
    /// and are discarded; the snapshot is authoritative on cold start.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<ObjectEvent>) {
        self.enumerate_all().await;
        let mut discarded = 0usize;
        while events.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!(discarded, "events queued during enumeration discarded");
        }
        while let Some(event) = events.recv().await {
            self.apply_event(&event).await;
        }
        info!("event feed closed, synchronizer stopping");
    }

    /// Apply one event to every class fed by its channel.
    ///
    /// Failures are contained per class and logged; the stream keeps
    /// flowing.
    pub async fn apply_event(&self, event: &ObjectEvent) {
        let classes = ObjectClass::for_event_channel(&event.channel);
        if classes.is_empty() {
            debug!(channel = %event.channel, "event on unwatched channel ignored");
            return;
        }
        for class in classes {
            let Some(transform) = self.transforms.iter().find(|t| t.class() == *class) else {
                continue;
            };
            if self.state(*class) != SyncState::Live {
                // Cold-start enumeration is authoritative; early events are
                // superseded by the snapshot about to replace the table.
                debug!(class = %class, uuid = %event.uuid, "event before enumeration dropped");
                continue;
            }
            if let Err(err) = self.apply_to_class(transform.as_ref(), event).await {
                warn!(
                    class = %class,
                    uuid = %event.uuid,
                    operation = ?event.operation,
                    error = %err,
                    "event application failed, object left at last-known state"
                );
            }
        }
    }

    async fn apply_to_class(
        &self,
        transform: &dyn RecordTransform,
        event: &ObjectEvent,
    ) -> Result<()> {
        let class = transform.class();
        match event.operation {
            EventOperation::Delete => {
                if self.store.remove(class, &event.uuid) {
                    debug!(class = %class, uuid = %event.uuid, "cache entry removed");
                }
                Ok(())
            }
            EventOperation::Create | EventOperation::Update => {
                let (object_ref, record) = self.materialize(class, event).await?;
                if !transform.filter(&record) {
                    // The object left this class's scope (e.g. a VM turned
                    // into a template); drop any stale entry.
                    self.store.remove(class, &event.uuid);
                    return Ok(());
                }
                match transform.transform(&event.uuid, &object_ref, &record) {
                    Ok(Some(document)) => {
                        self.store.upsert(class, &event.uuid, document);
                        debug!(class = %class, uuid = %event.uuid, "cache entry written");
                    }
                    Ok(None) => {
                        self.store.remove(class, &event.uuid);
                    }
                    Err(err) => {
                        warn!(
                            class = %class,
                            uuid = %event.uuid,
                            error = %err,
                            "record transform failed, object left at last-known state"
                        );
                    }
                }
                Ok(())
            }
        }
    }

    /// The event's embedded snapshot, or a refetch of the full record.
    async fn materialize(
        &self,
        class: ObjectClass,
        event: &ObjectEvent,
    ) -> Result<(String, Value)> {
        if let Some(snapshot) = &event.snapshot {
            let object_ref = match &event.object_ref {
                Some(object_ref) => object_ref.clone(),
                None => {
                    let lease = self.pool.acquire().await?;
                    let proxy = ObjectProxy::from_uuid(class, event.uuid.clone(), &lease);
                    proxy.object_ref().await?.to_string()
                }
            };
            return Ok((object_ref, snapshot.clone()));
        }

        let lease = self.pool.acquire().await?;
        let proxy = match &event.object_ref {
            Some(object_ref) => ObjectProxy::from_ref(class, object_ref.clone(), &lease),
            None => ObjectProxy::from_uuid(class, event.uuid.clone(), &lease),
        };
        let record = proxy.get_record().await?;
        let object_ref = proxy.object_ref().await?.to_string();
        Ok((object_ref, record))
    }
}
