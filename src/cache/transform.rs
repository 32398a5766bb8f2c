//! Per-class record transforms.
//!
//! A transform decides which raw records belong in the cache (filter),
//! reshapes them into cache documents, and may derive fields the raw
//! record does not carry. Returning `Ok(None)` keeps an object out of the
//! cache based on transform-computed state. Transform failures are
//! per-object: the synchronizer logs and skips, never aborts a batch.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde_json::{json, Map, Value};

use crate::object::ObjectClass;

/// Tag that marks a template as published to hive users.
pub const TEMPLATE_ENABLED_TAG: &str = "xenhive";

/// Metadata key carrying structured template settings.
pub const TEMPLATE_SETTINGS_KEY: &str = "vm-data/xenhive/template";

/// Reshapes raw remote records into cache documents for one class.
pub trait RecordTransform: Send + Sync {
    /// The class this transform feeds.
    fn class(&self) -> ObjectClass;

    /// Whether the raw record belongs to this class's cache at all.
    /// Objects failing the filter are excluded entirely.
    fn filter(&self, record: &Value) -> bool {
        let _ = record;
        true
    }

    /// Produce the cache document. `Ok(None)` keeps the object out of the
    /// cache; an error skips this object and leaves its last-known cached
    /// state untouched.
    fn transform(&self, uuid: &str, object_ref: &str, record: &Value) -> Result<Option<Value>>;
}

/// Raw record plus the identifying keys, as a document map.
fn base_document(uuid: &str, object_ref: &str, record: &Value) -> Result<Map<String, Value>> {
    let Some(fields) = record.as_object() else {
        bail!("record for {uuid} is not an object");
    };
    let mut doc = fields.clone();
    doc.insert("uuid".to_string(), json!(uuid));
    doc.insert("ref".to_string(), json!(object_ref));
    Ok(doc)
}

fn flag(record: &Value, field: &str) -> bool {
    record.get(field).and_then(Value::as_bool).unwrap_or(false)
}

fn text<'a>(record: &'a Value, field: &str) -> Option<&'a str> {
    record.get(field).and_then(Value::as_str)
}

/// Identity transform: the raw record keyed by uuid.
pub struct PassthroughTransform {
    class: ObjectClass,
}

impl PassthroughTransform {
    pub fn new(class: ObjectClass) -> Self {
        Self { class }
    }
}

impl RecordTransform for PassthroughTransform {
    fn class(&self) -> ObjectClass {
        self.class
    }

    fn transform(&self, uuid: &str, object_ref: &str, record: &Value) -> Result<Option<Value>> {
        Ok(Some(Value::Object(base_document(uuid, object_ref, record)?)))
    }
}

/// Transform for real VMs: templates, snapshots and the control domain
/// never enter the VM table.
pub struct VmTransform;

impl RecordTransform for VmTransform {
    fn class(&self) -> ObjectClass {
        ObjectClass::Vm
    }

    fn filter(&self, record: &Value) -> bool {
        !flag(record, "is_a_template")
            && !flag(record, "is_a_snapshot")
            && !flag(record, "is_control_domain")
    }

    fn transform(&self, uuid: &str, object_ref: &str, record: &Value) -> Result<Option<Value>> {
        let mut doc = base_document(uuid, object_ref, record)?;
        let power_state = text(record, "power_state").unwrap_or("Halted");
        doc.insert("power_state".to_string(), json!(power_state));
        Ok(Some(Value::Object(doc)))
    }
}

/// Transform for templates.
///
/// Derives fields the raw record spreads across several places: `hvm` from
/// the boot policy, `enabled` from the publication tag, the default-template
/// flag (which blocks `destroy`), and `os_kind` from structured template
/// settings, other-config, or the reference label, in that order.
pub struct TemplateTransform;

impl RecordTransform for TemplateTransform {
    fn class(&self) -> ObjectClass {
        ObjectClass::Template
    }

    fn filter(&self, record: &Value) -> bool {
        // Some "templates" on the host are really snapshots; exclude them.
        flag(record, "is_a_template") && !flag(record, "is_a_snapshot")
    }

    fn transform(&self, uuid: &str, object_ref: &str, record: &Value) -> Result<Option<Value>> {
        let mut doc = base_document(uuid, object_ref, record)?;

        let hvm = text(record, "HVM_boot_policy").is_some_and(|p| !p.is_empty());
        doc.insert("hvm".to_string(), json!(hvm));

        let enabled = record
            .get("tags")
            .and_then(Value::as_array)
            .is_some_and(|tags| tags.iter().any(|t| t == TEMPLATE_ENABLED_TAG));
        doc.insert("enabled".to_string(), json!(enabled));

        let other_config = record.get("other_config").and_then(Value::as_object);
        let is_default = other_config
            .and_then(|oc| oc.get("default_template"))
            .and_then(Value::as_str)
            .is_some_and(|v| v == "true" || v == "1");
        doc.insert("is_default_template".to_string(), json!(is_default));

        let mut blocked: Vec<String> = Vec::new();
        if is_default {
            blocked.push("destroy".to_string());
        }
        doc.insert("blocked_operations".to_string(), json!(blocked));

        if let Some(os_kind) = derive_os_kind(record, hvm)? {
            doc.insert("os_kind".to_string(), json!(os_kind));
        }

        Ok(Some(Value::Object(doc)))
    }
}

/// `os_kind` precedence: structured settings in the metadata side-channel,
/// then other-config, then (paravirtual only) a known reference-label
/// prefix.
fn derive_os_kind(record: &Value, hvm: bool) -> Result<Option<String>> {
    if let Some(raw) = record
        .get("xenstore_data")
        .and_then(Value::as_object)
        .and_then(|xs| xs.get(TEMPLATE_SETTINGS_KEY))
        .and_then(Value::as_str)
    {
        let settings: Value =
            serde_json::from_str(raw).context("malformed template settings blob")?;
        let os_kind = settings
            .get("os_kind")
            .and_then(Value::as_str)
            .context("template settings blob lacks os_kind")?;
        return Ok(Some(os_kind.to_string()));
    }

    if hvm {
        return Ok(None);
    }

    if let Some(os_kind) = record
        .get("other_config")
        .and_then(Value::as_object)
        .and_then(|oc| oc.get("os_kind"))
        .and_then(Value::as_str)
    {
        return Ok(Some(os_kind.to_string()));
    }

    if let Some(label) = text(record, "reference_label") {
        for os in ["ubuntu", "centos", "debian"] {
            if label.starts_with(os) {
                return Ok(Some(os.to_string()));
            }
        }
    }

    Ok(None)
}

/// One transform per mirrored class, with the VM and template derivations
/// and passthrough for the rest.
pub fn default_transforms() -> Vec<Arc<dyn RecordTransform>> {
    vec![
        Arc::new(VmTransform),
        Arc::new(TemplateTransform),
        Arc::new(PassthroughTransform::new(ObjectClass::Vbd)),
        Arc::new(PassthroughTransform::new(ObjectClass::Vif)),
        Arc::new(PassthroughTransform::new(ObjectClass::Network)),
        Arc::new(PassthroughTransform::new(ObjectClass::Sr)),
    ]
}
