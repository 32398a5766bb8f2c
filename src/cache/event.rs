//! Event feed records.
//!
//! The host delivers at-least-once, per-channel-ordered notifications;
//! nothing is assumed about ordering across channels. An event carries the
//! object's uuid, optionally its transient reference, and optionally an
//! embedded record snapshot that saves a refetch.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What happened to the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOperation {
    Create,
    Update,
    Delete,
}

/// One observed change to a remote object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectEvent {
    /// Host-side class channel the event arrived on, e.g. `vm`.
    pub channel: String,
    /// Create, update or delete.
    pub operation: EventOperation,
    /// Stable unique id of the affected object.
    pub uuid: String,
    /// Transient reference, when the host included one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_ref: Option<String>,
    /// Embedded record snapshot, when the host included one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Value>,
}

impl ObjectEvent {
    /// A delete notification.
    pub fn deleted(channel: impl Into<String>, uuid: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            operation: EventOperation::Delete,
            uuid: uuid.into(),
            object_ref: None,
            snapshot: None,
        }
    }

    /// A create or update notification carrying an embedded snapshot.
    pub fn with_snapshot(
        channel: impl Into<String>,
        operation: EventOperation,
        uuid: impl Into<String>,
        object_ref: impl Into<String>,
        snapshot: Value,
    ) -> Self {
        Self {
            channel: channel.into(),
            operation,
            uuid: uuid.into(),
            object_ref: Some(object_ref.into()),
            snapshot: Some(snapshot),
        }
    }
}
