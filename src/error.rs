//! Crate-wide error taxonomy.
//!
//! Every fallible operation returns [`XenError`]; callers match on the
//! variant to decide whether to retry, surface, or abort. Pool exhaustion
//! and session loss are the retryable ones.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, XenError>;

/// All the ways an operation against the hive can fail.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum XenError {
    /// No session handle became free within the configured wait.
    #[error("session pool exhausted after waiting {waited_ms}ms")]
    PoolExhausted { waited_ms: u64 },

    /// A session could not be established or re-established.
    #[error("no usable session after {attempts} attempt(s)")]
    SessionUnavailable { attempts: u32 },

    /// The host rejected or failed a remote call.
    #[error("remote operation {class}.{method} failed: {details}")]
    RemoteOperation {
        class: String,
        method: String,
        details: String,
    },

    /// An identifier resolved to no object of the expected class.
    #[error("no {class} object with identifier {ident}")]
    ObjectNotFound { class: String, ident: String },

    /// The subject holds no grant covering the action.
    #[error("{subject} is not permitted to {action} on this {class}")]
    Unauthorized {
        subject: String,
        action: String,
        class: String,
    },

    /// A caller-supplied argument was rejected before any remote call.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl XenError {
    /// Whether the failure is transient and worth retrying as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            XenError::PoolExhausted { .. } | XenError::SessionUnavailable { .. }
        )
    }
}
