//! In-process mock of the hypervisor host.
//!
//! Implements the `RemoteTransport` boundary over an in-memory object
//! graph: enough of the upstream API surface (login/logout, bulk record
//! enumeration, per-object getters and mutators, xenstore metadata) for
//! the integration tests, plus knobs to expire sessions and reject
//! re-logins.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use xenhive::remote::SESSION_INVALID;
use xenhive::{HostConfig, PoolConfig, RemoteTransport, TransportFailure};

#[derive(Default)]
struct HostState {
    sessions: HashSet<String>,
    login_count: u64,
    reject_logins: bool,
    // api class -> (object ref -> record)
    objects: HashMap<String, HashMap<String, Value>>,
    call_log: Vec<(String, String)>,
}

/// A scripted upstream host.
#[derive(Default)]
pub struct MockHost {
    state: Mutex<HostState>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object record under an API class.
    pub fn add_object(&self, class: &str, object_ref: &str, record: Value) {
        self.state
            .lock()
            .objects
            .entry(class.to_string())
            .or_default()
            .insert(object_ref.to_string(), record);
    }

    /// Register a plain VM record with the given uuid.
    pub fn add_vm(&self, object_ref: &str, uuid: &str, power_state: &str) {
        self.add_object(
            "VM",
            object_ref,
            json!({
                "uuid": uuid,
                "name_label": uuid,
                "power_state": power_state,
                "is_a_template": false,
                "is_a_snapshot": false,
                "is_control_domain": false,
                "tags": [],
                "other_config": {},
                "xenstore_data": {},
            }),
        );
    }

    /// Remove an object record.
    pub fn remove_object(&self, class: &str, object_ref: &str) {
        if let Some(table) = self.state.lock().objects.get_mut(class) {
            table.remove(object_ref);
        }
    }

    /// Overwrite an object's xenstore metadata map.
    pub fn set_xenstore(&self, class: &str, object_ref: &str, data: BTreeMap<String, String>) {
        if let Some(record) = self
            .state
            .lock()
            .objects
            .get_mut(class)
            .and_then(|table| table.get_mut(object_ref))
        {
            record["xenstore_data"] = json!(data);
        }
    }

    /// Read back an object's xenstore metadata map.
    pub fn xenstore(&self, class: &str, object_ref: &str) -> BTreeMap<String, String> {
        self.state
            .lock()
            .objects
            .get(class)
            .and_then(|table| table.get(object_ref))
            .and_then(|record| record.get("xenstore_data"))
            .and_then(|data| serde_json::from_value(data.clone()).ok())
            .unwrap_or_default()
    }

    /// Expire every outstanding session; the next call on each fails with
    /// `SESSION_INVALID` and forces a re-login.
    pub fn invalidate_sessions(&self) {
        self.state.lock().sessions.clear();
    }

    /// Make every further login attempt fail.
    pub fn reject_logins(&self, reject: bool) {
        self.state.lock().reject_logins = reject;
    }

    /// Number of successful logins so far.
    pub fn login_count(&self) -> u64 {
        self.state.lock().login_count
    }

    /// How many times `method` has been called (any class).
    pub fn call_count(&self, method: &str) -> usize {
        self.state
            .lock()
            .call_log
            .iter()
            .filter(|(_, m)| m == method)
            .count()
    }

    fn failure(code: &str, details: Vec<String>) -> TransportFailure {
        TransportFailure::new(code, details)
    }
}

#[async_trait]
impl RemoteTransport for MockHost {
    async fn login(&self, _username: &str, _password: &str) -> Result<String, TransportFailure> {
        let mut state = self.state.lock();
        if state.reject_logins {
            return Err(Self::failure("SESSION_AUTHENTICATION_FAILED", vec![]));
        }
        state.login_count += 1;
        let token = format!("session-{}", state.login_count);
        state.sessions.insert(token.clone());
        Ok(token)
    }

    async fn logout(&self, session: &str) -> Result<(), TransportFailure> {
        self.state.lock().sessions.remove(session);
        Ok(())
    }

    async fn call(
        &self,
        session: &str,
        class: &str,
        method: &str,
        args: &[Value],
    ) -> Result<Value, TransportFailure> {
        let mut state = self.state.lock();
        if !state.sessions.contains(session) {
            return Err(Self::failure(SESSION_INVALID, vec![]));
        }
        state.call_log.push((class.to_string(), method.to_string()));

        // Static (class-scoped) methods take no object reference.
        match method {
            "get_all_records" => {
                let table = state.objects.get(class).cloned().unwrap_or_default();
                return Ok(Value::Object(table.into_iter().collect()));
            }
            "get_by_uuid" => {
                let uuid = args.first().and_then(Value::as_str).unwrap_or_default();
                let found = state.objects.get(class).and_then(|table| {
                    table
                        .iter()
                        .find(|(_, record)| record.get("uuid").and_then(Value::as_str) == Some(uuid))
                        .map(|(object_ref, _)| object_ref.clone())
                });
                return match found {
                    Some(object_ref) => Ok(json!(object_ref)),
                    None => Err(Self::failure(
                        "UUID_INVALID",
                        vec![class.to_string(), uuid.to_string()],
                    )),
                };
            }
            _ => {}
        }

        // Everything else is an instance method: ref first, then arguments.
        let object_ref = args
            .first()
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let Some(record) = state
            .objects
            .get_mut(class)
            .and_then(|table| table.get_mut(&object_ref))
        else {
            return Err(Self::failure(
                "HANDLE_INVALID",
                vec![class.to_string(), object_ref],
            ));
        };

        match method {
            "get_uuid" => Ok(record.get("uuid").cloned().unwrap_or(Value::Null)),
            "get_record" => Ok(record.clone()),
            "get_xenstore_data" => Ok(record.get("xenstore_data").cloned().unwrap_or(json!({}))),
            "set_xenstore_data" => {
                record["xenstore_data"] = args.get(1).cloned().unwrap_or(json!({}));
                Ok(Value::Null)
            }
            "get_power_state" => Ok(record.get("power_state").cloned().unwrap_or(json!("Halted"))),
            "get_VM" => Ok(record.get("VM").cloned().unwrap_or(Value::Null)),
            "get_unpluggable" => {
                Ok(record.get("unpluggable").cloned().unwrap_or(json!(false)))
            }
            "add_tags" => {
                let tag = args.get(1).cloned().unwrap_or(Value::Null);
                if let Some(tags) = record.get_mut("tags").and_then(Value::as_array_mut) {
                    if !tags.contains(&tag) {
                        tags.push(tag);
                    }
                }
                Ok(Value::Null)
            }
            "remove_tags" => {
                let tag = args.get(1).cloned().unwrap_or(Value::Null);
                if let Some(tags) = record.get_mut("tags").and_then(Value::as_array_mut) {
                    tags.retain(|t| t != &tag);
                }
                Ok(Value::Null)
            }
            "clone" => {
                let name_label = args.get(1).and_then(Value::as_str).unwrap_or("clone");
                let mut cloned = record.clone();
                let new_ref = format!("OpaqueRef:clone-of-{name_label}");
                let new_uuid = format!("uuid-clone-of-{name_label}");
                cloned["uuid"] = json!(new_uuid);
                cloned["name_label"] = json!(name_label);
                cloned["power_state"] = json!("Halted");
                state
                    .objects
                    .entry(class.to_string())
                    .or_default()
                    .insert(new_ref.clone(), cloned);
                Ok(json!(new_ref))
            }
            "destroy" => {
                state
                    .objects
                    .get_mut(class)
                    .map(|table| table.remove(&object_ref));
                Ok(Value::Null)
            }
            // Power and plug operations succeed silently.
            "start" | "clean_shutdown" | "hard_shutdown" | "pause" | "unpause" | "plug"
            | "unplug" | "provision" | "set_name_label" | "set_name_description"
            | "set_PV_args" | "set_other_config" => Ok(Value::Null),
            other => Err(Self::failure(
                "MESSAGE_METHOD_UNKNOWN",
                vec![format!("{class}.{other}")],
            )),
        }
    }
}

/// Route test logs through the standard subscriber, honoring `RUST_LOG`.
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Host credentials every test uses.
pub fn test_host_config() -> HostConfig {
    HostConfig {
        url: "mock://host".to_string(),
        username: "root".to_string(),
        password: "secret".to_string(),
    }
}

/// Pool config with short waits suited to tests.
pub fn test_pool_config(size: usize) -> PoolConfig {
    PoolConfig {
        size,
        acquire_timeout_secs: 1,
        session_retry_limit: 3,
    }
}
