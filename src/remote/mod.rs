//! Remote host boundary: transport trait, session handles and the pool.
//!
//! The host itself is consumed, not reimplemented: everything below the
//! [`RemoteTransport`] trait belongs to the upstream API. [`RemoteHandle`]
//! owns one authenticated session on top of that trait and translates
//! transport failures into typed errors; [`SessionPool`] arbitrates a
//! bounded set of handles between concurrent callers.

mod handle;
mod pool;
mod transport;

pub use handle::RemoteHandle;
pub use pool::{SessionLease, SessionPool};
pub use transport::{RemoteTransport, TransportFailure, SESSION_INVALID};
