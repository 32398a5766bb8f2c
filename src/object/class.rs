//! Per-class capability tables.
//!
//! The upstream API dispatches any method name; here the surface is closed
//! off to an auditable one. Each class enumerates the instance and static
//! methods a proxy may forward; anything else is rejected before a single
//! byte reaches the network.

use serde::{Deserialize, Serialize};

/// Object classes mirrored from the host.
///
/// `Template` shares the host's `VM` API class (a template is a VM record
/// with `is_a_template` set) but keeps its own cache table, filter and ACL
/// policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    Vm,
    Template,
    Vbd,
    Vif,
    Network,
    Sr,
}

/// Common instance methods every mirrored class supports.
const COMMON_METHODS: &[&str] = &[
    "get_record",
    "get_xenstore_data",
    "set_xenstore_data",
    "get_other_config",
    "set_other_config",
    "add_tags",
    "remove_tags",
    "set_name_label",
    "set_name_description",
];

const VM_METHODS: &[&str] = &[
    "start",
    "clean_shutdown",
    "hard_shutdown",
    "clean_reboot",
    "hard_reboot",
    "pause",
    "unpause",
    "suspend",
    "resume",
    "destroy",
    "provision",
    "get_power_state",
    "set_PV_args",
    "set_HVM_boot_params",
    "get_VBDs",
    "get_VIFs",
];

const TEMPLATE_METHODS: &[&str] = &["clone", "get_power_state"];

const VBD_METHODS: &[&str] = &["plug", "unplug", "destroy", "get_VM", "get_unpluggable"];

const VIF_METHODS: &[&str] = &["plug", "unplug", "destroy", "get_VM", "get_network"];

const NETWORK_METHODS: &[&str] = &["get_VIFs"];

const SR_METHODS: &[&str] = &["get_VDIs", "scan"];

/// Static methods shared by every class.
const COMMON_STATICS: &[&str] = &["get_all_records", "get_by_uuid"];

const VM_STATICS: &[&str] = &["create"];
const VBD_STATICS: &[&str] = &["create"];
const VIF_STATICS: &[&str] = &["create"];

impl ObjectClass {
    /// Every mirrored class, in cache-table order.
    pub const ALL: [ObjectClass; 6] = [
        ObjectClass::Vm,
        ObjectClass::Template,
        ObjectClass::Vbd,
        ObjectClass::Vif,
        ObjectClass::Network,
        ObjectClass::Sr,
    ];

    /// Dense index for per-class storage.
    pub(crate) fn index(self) -> usize {
        match self {
            ObjectClass::Vm => 0,
            ObjectClass::Template => 1,
            ObjectClass::Vbd => 2,
            ObjectClass::Vif => 3,
            ObjectClass::Network => 4,
            ObjectClass::Sr => 5,
        }
    }

    /// Name of the remote API class calls are scoped to.
    pub fn api_name(self) -> &'static str {
        match self {
            ObjectClass::Vm | ObjectClass::Template => "VM",
            ObjectClass::Vbd => "VBD",
            ObjectClass::Vif => "VIF",
            ObjectClass::Network => "network",
            ObjectClass::Sr => "SR",
        }
    }

    /// Name of this class's cache table.
    pub fn cache_table(self) -> &'static str {
        match self {
            ObjectClass::Vm => "vms",
            ObjectClass::Template => "tmpls",
            ObjectClass::Vbd => "vbds",
            ObjectClass::Vif => "vifs",
            ObjectClass::Network => "nets",
            ObjectClass::Sr => "srs",
        }
    }

    /// Host event channel this class's events arrive on.
    pub fn event_channel(self) -> &'static str {
        match self {
            ObjectClass::Vm | ObjectClass::Template => "vm",
            ObjectClass::Vbd => "vbd",
            ObjectClass::Vif => "vif",
            ObjectClass::Network => "network",
            ObjectClass::Sr => "sr",
        }
    }

    /// Classes fed by the given event channel. `vm` events fan out to both
    /// the VM and the template mirror; each applies its own filter.
    pub fn for_event_channel(channel: &str) -> &'static [ObjectClass] {
        match channel {
            "vm" => &[ObjectClass::Vm, ObjectClass::Template],
            "vbd" => &[ObjectClass::Vbd],
            "vif" => &[ObjectClass::Vif],
            "network" => &[ObjectClass::Network],
            "sr" => &[ObjectClass::Sr],
            _ => &[],
        }
    }

    /// Whether an object of this class with no permission metadata at all
    /// is open to everyone. Deny is the default; templates are browsable
    /// until someone scopes them down.
    pub fn allow_empty_acl(self) -> bool {
        matches!(self, ObjectClass::Template)
    }

    /// Permitted instance methods.
    pub fn instance_methods(self) -> impl Iterator<Item = &'static str> {
        let extra: &'static [&'static str] = match self {
            ObjectClass::Vm => VM_METHODS,
            ObjectClass::Template => TEMPLATE_METHODS,
            ObjectClass::Vbd => VBD_METHODS,
            ObjectClass::Vif => VIF_METHODS,
            ObjectClass::Network => NETWORK_METHODS,
            ObjectClass::Sr => SR_METHODS,
        };
        COMMON_METHODS.iter().chain(extra.iter()).copied()
    }

    /// Permitted static (class-scoped) methods.
    pub fn static_methods(self) -> impl Iterator<Item = &'static str> {
        let extra: &'static [&'static str] = match self {
            ObjectClass::Vm => VM_STATICS,
            ObjectClass::Vbd => VBD_STATICS,
            ObjectClass::Vif => VIF_STATICS,
            _ => &[],
        };
        COMMON_STATICS.iter().chain(extra.iter()).copied()
    }

    /// Whether the capability table permits `method` on an instance.
    pub fn allows(self, method: &str) -> bool {
        self.instance_methods().any(|m| m == method)
    }

    /// Whether the capability table permits `method` at class scope.
    pub fn allows_static(self, method: &str) -> bool {
        self.static_methods().any(|m| m == method)
    }
}

impl std::fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.cache_table().trim_end_matches('s'))
    }
}
