//! Subject identity abstraction.
//!
//! The transport layer authenticates users however it likes; the ACL engine
//! only needs a stable id, the subject's group memberships in a
//! deterministic order, and the realm that namespaces both.

/// An authenticated subject as seen by the ACL engine.
pub trait Identity: Send + Sync {
    /// Stable subject id, e.g. a username or directory id.
    fn id(&self) -> &str;

    /// Group memberships, in the deterministic order checks iterate them.
    fn groups(&self) -> &[String];

    /// Authenticator namespace baked into every subject path.
    fn realm(&self) -> &str;
}

/// A plain, pre-resolved identity. Useful for internal flows and tests.
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    id: String,
    groups: Vec<String>,
    realm: String,
}

impl StaticIdentity {
    /// An identity with no group memberships in the given realm.
    pub fn new(realm: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            groups: Vec::new(),
            realm: realm.into(),
        }
    }

    /// Attach group memberships, kept in the given order.
    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = groups;
        self
    }
}

impl Identity for StaticIdentity {
    fn id(&self) -> &str {
        &self.id
    }

    fn groups(&self) -> &[String] {
        &self.groups
    }

    fn realm(&self) -> &str {
        &self.realm
    }
}
