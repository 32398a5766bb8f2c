//! Per-object, per-subject access control.
//!
//! Permissions live on the remote object itself, as `subject-path →
//! "action1;action2"` pairs inside its metadata side-channel. The engine
//! re-reads that metadata on every check (no decision caching, so
//! revocations bite immediately) and never fails open: metadata it cannot
//! read is metadata that denies.

mod engine;
mod entry;
mod subject;

pub use engine::AclEngine;
pub use entry::{access_path, ActionSet, ACTION_WILDCARD};
pub use subject::{Identity, StaticIdentity};
