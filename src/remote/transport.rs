//! The RPC boundary to the hypervisor host.
//!
//! One trait, three calls: login yielding an opaque session token, logout,
//! and a generic `call` scoped to an API class and method. Object-scoped
//! calls pass the object reference as the first argument, exactly as the
//! upstream wire protocol does.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

/// Failure code the host reports for an expired or revoked session.
pub const SESSION_INVALID: &str = "SESSION_INVALID";

/// A failure reported by the transport, before translation into a typed
/// error. `code` is the host's machine-readable failure class; `details`
/// carries whatever else the host sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    /// Machine-readable failure code, e.g. `SESSION_INVALID`.
    pub code: String,
    /// Remaining detail strings from the host.
    pub details: Vec<String>,
}

impl TransportFailure {
    /// Construct a failure from a code and detail strings.
    pub fn new(code: impl Into<String>, details: Vec<String>) -> Self {
        Self {
            code: code.into(),
            details,
        }
    }

    /// Whether the host rejected the session itself rather than the call.
    pub fn is_session_expired(&self) -> bool {
        self.code == SESSION_INVALID
    }

    /// Code and details joined into one display string.
    pub fn detail_text(&self) -> String {
        if self.details.is_empty() {
            self.code.clone()
        } else {
            format!("{}: {}", self.code, self.details.join("; "))
        }
    }
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.detail_text())
    }
}

impl std::error::Error for TransportFailure {}

/// RPC-style access to the remote host.
///
/// Implementations wrap the actual wire protocol (XML-RPC or JSON-RPC
/// against a Xen-style API). Tests provide an in-process mock.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Authenticate and obtain an opaque session token.
    async fn login(&self, username: &str, password: &str)
        -> Result<String, TransportFailure>;

    /// Release a session token.
    async fn logout(&self, session: &str) -> Result<(), TransportFailure>;

    /// Invoke `class.method(args...)` under the given session. Instance
    /// calls pass the object reference as the first element of `args`.
    async fn call(
        &self,
        session: &str,
        class: &str,
        method: &str,
        args: &[Value],
    ) -> Result<Value, TransportFailure>;
}
