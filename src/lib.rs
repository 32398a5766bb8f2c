//! xenhive — hypervisor object cache and access-control engine.
//!
//! Mediates access to one remote virtualization host's live object graph:
//!
//! - [`SessionPool`] arbitrates a bounded set of exclusive, authenticated
//!   sessions ([`RemoteHandle`]) over the [`RemoteTransport`] boundary.
//! - [`ObjectProxy`] forwards capability-checked operations to remote
//!   objects named by a transient reference or a stable uuid.
//! - [`AclEngine`] enforces the per-object, per-subject permission model
//!   stored as structured tags on each remote object.
//! - [`CacheSynchronizer`] keeps a local document mirror ([`CacheStore`])
//!   consistent with remote state via bulk enumeration and the host's
//!   event feed.
//! - [`OperationTracker`] records coarse state transitions for multi-step
//!   pipelines so their progress is always observable.
//!
//! The GraphQL schema, HTTP/WebSocket transport and client presentation
//! live outside this crate and consume it through the types re-exported
//! here.

pub mod acl;
pub mod boot;
pub mod cache;
pub mod config;
pub mod error;
pub mod object;
pub mod ops;
pub mod remote;

pub use acl::{AclEngine, ActionSet, Identity, StaticIdentity, ACTION_WILDCARD};
pub use boot::{BootParams, OsFamily};
pub use cache::{
    CacheStore, CacheSynchronizer, EventOperation, ObjectEvent, RecordTransform, SyncState,
};
pub use config::{AclConfig, HiveConfig, HostConfig, PoolConfig};
pub use error::{Result, XenError};
pub use object::{ObjectClass, ObjectProxy, RemoteObjectRef};
pub use ops::{OperationStatus, OperationTracker, STATE_FAILED};
pub use remote::{RemoteHandle, RemoteTransport, SessionLease, SessionPool, TransportFailure};
