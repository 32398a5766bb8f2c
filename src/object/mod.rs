//! Typed access to remote objects.
//!
//! [`ObjectClass`] carries the per-class capability tables (which methods a
//! proxy may forward, which cache table a class mirrors into, and whether an
//! object with no permission metadata defaults to allowed).
//! [`RemoteObjectRef`] pairs a transient reference with a stable uuid,
//! resolving whichever one is missing lazily. [`ObjectProxy`] forwards
//! validated operations over a leased session.

mod class;
mod proxy;
mod reference;

pub use class::ObjectClass;
pub use proxy::ObjectProxy;
pub use reference::RemoteObjectRef;
