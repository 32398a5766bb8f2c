//! Transient reference / stable uuid pairing.
//!
//! A reference may be invalidated by a host restart; a uuid is stable for
//! the object's lifetime. Exactly one is supplied at construction; the
//! other is resolved with a single memoized remote call on first use, so a
//! resolved pair always names one object.

use serde_json::{json, Value};
use tokio::sync::OnceCell;

use crate::error::{Result, XenError};
use crate::object::class::ObjectClass;
use crate::remote::RemoteHandle;

/// A remote object named by a transient reference, a stable uuid, or
/// (after resolution) both.
#[derive(Debug)]
pub struct RemoteObjectRef {
    class: ObjectClass,
    opaque: OnceCell<String>,
    uuid: OnceCell<String>,
}

impl RemoteObjectRef {
    /// Name an object by its transient reference.
    pub fn from_ref(class: ObjectClass, opaque: impl Into<String>) -> Self {
        Self {
            class,
            opaque: OnceCell::new_with(Some(opaque.into())),
            uuid: OnceCell::new(),
        }
    }

    /// Name an object by its stable uuid.
    pub fn from_uuid(class: ObjectClass, uuid: impl Into<String>) -> Self {
        Self {
            class,
            opaque: OnceCell::new(),
            uuid: OnceCell::new_with(Some(uuid.into())),
        }
    }

    /// The class this reference is scoped to.
    pub fn class(&self) -> ObjectClass {
        self.class
    }

    /// The uuid, resolving it through `get_uuid` on first use.
    pub async fn uuid(&self, handle: &RemoteHandle) -> Result<&str> {
        let class = self.class;
        self.uuid
            .get_or_try_init(|| async {
                let opaque = self.seeded(self.opaque.get())?;
                let value = handle
                    .invoke(class.api_name(), "get_uuid", &[json!(opaque)])
                    .await
                    .map_err(|err| not_found(class, opaque, err))?;
                string_result(class, opaque, value)
            })
            .await
            .map(String::as_str)
    }

    /// The transient reference, resolving it through `get_by_uuid` on
    /// first use.
    pub async fn object_ref(&self, handle: &RemoteHandle) -> Result<&str> {
        let class = self.class;
        self.opaque
            .get_or_try_init(|| async {
                let uuid = self.seeded(self.uuid.get())?;
                let value = handle
                    .invoke(class.api_name(), "get_by_uuid", &[json!(uuid)])
                    .await
                    .map_err(|err| not_found(class, uuid, err))?;
                string_result(class, uuid, value)
            })
            .await
            .map(String::as_str)
    }

    /// The uuid if already known, without touching the network.
    pub fn uuid_if_known(&self) -> Option<&str> {
        self.uuid.get().map(String::as_str)
    }

    /// The reference if already known, without touching the network.
    pub fn ref_if_known(&self) -> Option<&str> {
        self.opaque.get().map(String::as_str)
    }

    // Constructors seed exactly one cell, so the other identifier is
    // always present when a resolution starts.
    fn seeded<'a>(&self, cell: Option<&'a String>) -> Result<&'a str> {
        cell.map(String::as_str).ok_or_else(|| {
            XenError::InvalidArgument("object reference holds neither ref nor uuid".into())
        })
    }
}

fn not_found(class: ObjectClass, ident: &str, err: XenError) -> XenError {
    match err {
        // Resolution rejections mean the identifier names nothing; pool and
        // session failures pass through untouched.
        XenError::RemoteOperation { .. } => XenError::ObjectNotFound {
            class: class.api_name().to_string(),
            ident: ident.to_string(),
        },
        other => other,
    }
}

fn string_result(class: ObjectClass, ident: &str, value: Value) -> Result<String> {
    match value {
        Value::String(s) if !s.is_empty() => Ok(s),
        _ => Err(XenError::ObjectNotFound {
            class: class.api_name().to_string(),
            ident: ident.to_string(),
        }),
    }
}
