//! Class-aware façade over a leased session.
//!
//! One generic entry point — invoke a named operation with positional
//! arguments — plus typed helpers built on top of it. Every method name is
//! validated against the class capability table before the remote call, so
//! the proxy surface stays auditable.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use tracing::debug;

use crate::error::{Result, XenError};
use crate::object::class::ObjectClass;
use crate::object::reference::RemoteObjectRef;
use crate::remote::SessionLease;

/// A proxy for one remote object over one leased session.
pub struct ObjectProxy<'a> {
    target: RemoteObjectRef,
    lease: &'a SessionLease,
}

impl<'a> ObjectProxy<'a> {
    /// Proxy an object named by its transient reference.
    pub fn from_ref(class: ObjectClass, opaque: impl Into<String>, lease: &'a SessionLease) -> Self {
        Self {
            target: RemoteObjectRef::from_ref(class, opaque),
            lease,
        }
    }

    /// Proxy an object named by its stable uuid.
    pub fn from_uuid(class: ObjectClass, uuid: impl Into<String>, lease: &'a SessionLease) -> Self {
        Self {
            target: RemoteObjectRef::from_uuid(class, uuid),
            lease,
        }
    }

    /// Proxy an already-constructed object name.
    pub fn new(target: RemoteObjectRef, lease: &'a SessionLease) -> Self {
        Self { target, lease }
    }

    /// The class this proxy is scoped to.
    pub fn class(&self) -> ObjectClass {
        self.target.class()
    }

    /// The object's stable uuid, resolved lazily.
    pub async fn uuid(&self) -> Result<&str> {
        self.target.uuid(self.lease.handle()).await
    }

    /// The object's transient reference, resolved lazily.
    pub async fn object_ref(&self) -> Result<&str> {
        self.target.object_ref(self.lease.handle()).await
    }

    /// Invoke a named instance operation, the object reference prepended to
    /// `args` the way the upstream wire protocol expects.
    pub async fn invoke(&self, method: &str, args: &[Value]) -> Result<Value> {
        let class = self.class();
        if !class.allows(method) {
            return Err(XenError::InvalidArgument(format!(
                "method {method} is not permitted on class {class}"
            )));
        }
        let opaque = self.object_ref().await?;
        let mut call_args = Vec::with_capacity(args.len() + 1);
        call_args.push(json!(opaque));
        call_args.extend_from_slice(args);
        debug!(class = %class, method, "invoking instance operation");
        self.lease
            .handle()
            .invoke(class.api_name(), method, &call_args)
            .await
    }

    /// Invoke a class-scoped (static) operation with no object reference.
    pub async fn invoke_static(
        class: ObjectClass,
        lease: &SessionLease,
        method: &str,
        args: &[Value],
    ) -> Result<Value> {
        if !class.allows_static(method) {
            return Err(XenError::InvalidArgument(format!(
                "static method {method} is not permitted on class {class}"
            )));
        }
        debug!(class = %class, method, "invoking static operation");
        lease.handle().invoke(class.api_name(), method, args).await
    }

    /// Full raw record of the object.
    pub async fn get_record(&self) -> Result<Value> {
        self.invoke("get_record", &[]).await
    }

    /// The object's metadata side-channel as a string map.
    pub async fn get_xenstore_data(&self) -> Result<BTreeMap<String, String>> {
        let value = self.invoke("get_xenstore_data", &[]).await?;
        serde_json::from_value(value).map_err(|err| XenError::RemoteOperation {
            class: self.class().api_name().to_string(),
            method: "get_xenstore_data".to_string(),
            details: format!("malformed metadata map: {err}"),
        })
    }

    /// Replace the object's metadata side-channel.
    pub async fn set_xenstore_data(&self, data: &BTreeMap<String, String>) -> Result<()> {
        self.invoke("set_xenstore_data", &[json!(data)]).await?;
        Ok(())
    }

    /// Attach a tag to the object.
    pub async fn add_tags(&self, tag: &str) -> Result<()> {
        self.invoke("add_tags", &[json!(tag)]).await?;
        Ok(())
    }

    /// Remove a tag from the object.
    pub async fn remove_tags(&self, tag: &str) -> Result<()> {
        self.invoke("remove_tags", &[json!(tag)]).await?;
        Ok(())
    }

    /// Current power state (`Running`, `Halted`, ...). VM-scoped.
    pub async fn get_power_state(&self) -> Result<String> {
        let value = self.invoke("get_power_state", &[]).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| XenError::RemoteOperation {
                class: self.class().api_name().to_string(),
                method: "get_power_state".to_string(),
                details: "host returned a non-string power state".to_string(),
            })
    }

    /// Clone a template into a new VM, returning the new VM's reference.
    pub async fn clone_vm(&self, name_label: &str) -> Result<String> {
        let value = self.invoke("clone", &[json!(name_label)]).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| XenError::RemoteOperation {
                class: self.class().api_name().to_string(),
                method: "clone".to_string(),
                details: "host returned a non-string reference".to_string(),
            })
    }

    /// Detach a disk attachment from its running VM.
    ///
    /// The device is unplugged and destroyed only when the owning VM is
    /// running and the host reports the device unpluggable; otherwise
    /// nothing is touched and `false` is returned.
    pub async fn detach_vbd(&self) -> Result<bool> {
        let vm_ref = self.invoke("get_VM", &[]).await?;
        let vm_ref = vm_ref.as_str().ok_or_else(|| XenError::RemoteOperation {
            class: self.class().api_name().to_string(),
            method: "get_VM".to_string(),
            details: "host returned a non-string reference".to_string(),
        })?;
        let vm = ObjectProxy::from_ref(ObjectClass::Vm, vm_ref, self.lease);
        let running = vm.get_power_state().await? == "Running";
        let unpluggable = self
            .invoke("get_unpluggable", &[])
            .await?
            .as_bool()
            .unwrap_or(false);
        if !(running && unpluggable) {
            return Ok(false);
        }
        self.invoke("unplug", &[]).await?;
        self.invoke("destroy", &[]).await?;
        Ok(true)
    }
}
