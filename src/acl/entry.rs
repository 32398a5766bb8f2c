//! Permission entry parsing and subject paths.
//!
//! One metadata key per subject: `{prefix}/{realm}/{users|groups}/{id}`,
//! holding a `;`-separated action list. The literal action `all` is a
//! wildcard matching any requested action.

/// Wildcard action name matching every requested action.
pub const ACTION_WILDCARD: &str = "all";

/// Build the metadata key for a subject or group.
pub fn access_path(prefix: &str, realm: &str, is_group: bool, id: &str) -> String {
    let kind = if is_group { "groups" } else { "users" };
    format!("{prefix}/{realm}/{kind}/{id}")
}

/// An ordered, duplicate-free action list for one subject on one object.
///
/// Serialization preserves insertion order, so a no-op grant or revoke
/// leaves the serialized form byte-identical.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSet {
    actions: Vec<String>,
}

impl ActionSet {
    /// The empty action set. Present-but-empty always denies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a serialized `"a;b;c"` entry. Empty segments are dropped.
    pub fn parse(raw: &str) -> Self {
        Self {
            actions: raw
                .split(';')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Serialize back to the `"a;b;c"` wire form.
    pub fn serialize(&self) -> String {
        self.actions.join(";")
    }

    /// Whether the set grants `action`, directly or via the wildcard.
    pub fn allows(&self, action: &str) -> bool {
        self.actions
            .iter()
            .any(|a| a == action || a == ACTION_WILDCARD)
    }

    /// Grant an action. Idempotent; returns whether the set changed.
    pub fn grant(&mut self, action: &str) -> bool {
        if self.actions.iter().any(|a| a == action) {
            return false;
        }
        self.actions.push(action.to_string());
        true
    }

    /// Revoke an action. Idempotent; returns whether the set changed.
    pub fn revoke(&mut self, action: &str) -> bool {
        let before = self.actions.len();
        self.actions.retain(|a| a != action);
        self.actions.len() != before
    }

    /// Whether no actions are granted.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
