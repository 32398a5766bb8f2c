//! Progress tracking for multi-step operations.
//!
//! An append-only status log keyed by operation id. The tracker imposes no
//! state machine beyond "most recent write wins": the orchestrating
//! pipeline defines its own step ordering and must report a terminal
//! `failed` with a message on any unrecoverable error, so a stalled
//! pipeline is observable rather than silently abandoned.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

/// Conventional terminal state tag for a failed pipeline.
pub const STATE_FAILED: &str = "failed";

/// One status entry in an operation's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationStatus {
    /// Operation id this entry belongs to.
    pub id: String,
    /// Subject that initiated the operation.
    pub owner: String,
    /// Reference of the object being operated on, once known.
    pub object_ref: Option<String>,
    /// Caller-defined state tag, e.g. `cloning`, `provisioning`, `failed`.
    pub state: String,
    /// Human-readable progress or failure message.
    pub message: String,
    /// Unix seconds at which the entry was recorded.
    pub recorded_at: u64,
}

/// Append-only per-operation status log.
#[derive(Default)]
pub struct OperationTracker {
    log: RwLock<HashMap<String, Vec<OperationStatus>>>,
}

impl OperationTracker {
    /// An empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh operation id for a new pipeline.
    pub fn new_operation_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Append a status entry for an operation. The latest entry is the
    /// operation's current status; history is never rewritten.
    ///
    /// An operation belongs to the owner that recorded its first entry; an
    /// upsert under a different owner is rejected, so an id collision can
    /// never re-own someone else's history.
    pub fn upsert(
        &self,
        owner: &str,
        id: &str,
        object_ref: Option<&str>,
        state: &str,
        message: &str,
    ) {
        let mut log = self.log.write();
        let history = log.entry(id.to_string()).or_default();
        if let Some(first) = history.first() {
            if first.owner != owner {
                warn!(
                    id,
                    owner,
                    recorded_owner = %first.owner,
                    "status upsert under a different owner rejected"
                );
                return;
            }
        }
        history.push(OperationStatus {
            id: id.to_string(),
            owner: owner.to_string(),
            object_ref: object_ref.map(str::to_string),
            state: state.to_string(),
            message: message.to_string(),
            recorded_at: unix_now(),
        });
        debug!(id, owner, state, "operation status appended");
    }

    /// The most recent status entry for an operation.
    pub fn latest(&self, id: &str) -> Option<OperationStatus> {
        self.log
            .read()
            .get(id)
            .and_then(|history| history.last())
            .cloned()
    }

    /// Full history of an operation, oldest first.
    pub fn history(&self, id: &str) -> Vec<OperationStatus> {
        self.log.read().get(id).cloned().unwrap_or_default()
    }

    /// Latest status of every operation initiated by `owner`.
    pub fn latest_for_owner(&self, owner: &str) -> Vec<OperationStatus> {
        self.log
            .read()
            .values()
            .filter_map(|history| history.last())
            .filter(|status| status.owner == owner)
            .cloned()
            .collect()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
