//! Local document mirror of the host's object graph.
//!
//! [`CacheStore`] holds one document table per object class, keyed by uuid,
//! with atomic per-key visibility so readers never take a lock.
//! [`CacheSynchronizer`] is the store's only writer: it enumerates each
//! class on cold start, then applies the host's create/update/delete event
//! feed, pushing every record through its class's [`RecordTransform`].

mod event;
mod store;
mod sync;
mod transform;

pub use event::{EventOperation, ObjectEvent};
pub use store::CacheStore;
pub use sync::{CacheSynchronizer, SyncState};
pub use transform::{
    default_transforms, PassthroughTransform, RecordTransform, TemplateTransform, VmTransform,
};
