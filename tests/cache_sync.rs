//! Cache synchronizer behavior: cold-start enumeration, idempotent event
//! application, authoritative re-enumeration, and per-object failure
//! containment.

mod common;

use std::sync::Arc;

use common::{test_host_config, test_pool_config, MockHost};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use xenhive::cache::{default_transforms, PassthroughTransform};
use xenhive::{
    CacheStore, CacheSynchronizer, EventOperation, ObjectClass, ObjectEvent, RecordTransform,
    SessionPool, SyncState,
};

async fn setup(host: &Arc<MockHost>) -> (CacheSynchronizer, Arc<CacheStore>) {
    common::init_tracing();
    let pool = SessionPool::connect(
        Arc::clone(host) as Arc<dyn xenhive::RemoteTransport>,
        &test_host_config(),
        &test_pool_config(2),
    )
    .await
    .expect("pool connects");
    let store = Arc::new(CacheStore::new());
    let synchronizer = CacheSynchronizer::new(pool, Arc::clone(&store), default_transforms());
    (synchronizer, store)
}

fn vm_snapshot(uuid: &str, power_state: &str) -> Value {
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
    })
}

#[tokio::test]
async fn cold_start_enumerates_and_goes_live() {
    let host = Arc::new(MockHost::new());
    host.add_vm("OpaqueRef:vm1", "vm-1", "Running");
    host.add_vm("OpaqueRef:vm2", "vm-2", "Halted");
    let (synchronizer, store) = setup(&host).await;

    assert_eq!(synchronizer.state(ObjectClass::Vm), SyncState::Uninitialized);
    synchronizer.enumerate_all().await;
    assert_eq!(synchronizer.state(ObjectClass::Vm), SyncState::Live);

    assert_eq!(store.len(ObjectClass::Vm), 2);
    assert_eq!(
        store.get(ObjectClass::Vm, "vm-1").unwrap()["power_state"],
        "Running"
    );
}

#[tokio::test]
async fn templates_and_vms_split_from_the_same_listing() {
    let host = Arc::new(MockHost::new());
    host.add_vm("OpaqueRef:vm1", "vm-1", "Running");
    host.add_object(
        "VM",
        "OpaqueRef:t1",
        json!({
            "uuid": "t-1",
            "is_a_template": true,
            "is_a_snapshot": false,
            "HVM_boot_policy": "",
            "tags": ["xenhive"],
            "other_config": {"os_kind": "debian 9"},
            "xenstore_data": {},
        }),
    );
    // A snapshot masquerading as a template belongs in neither table.
    host.add_object(
        "VM",
        "OpaqueRef:s1",
        json!({
            "uuid": "s-1",
            "is_a_template": true,
            "is_a_snapshot": true,
            "tags": [],
            "other_config": {},
            "xenstore_data": {},
        }),
    );
    let (synchronizer, store) = setup(&host).await;
    synchronizer.enumerate_all().await;

    assert_eq!(store.len(ObjectClass::Vm), 1);
    assert_eq!(store.len(ObjectClass::Template), 1);
    let template = store.get(ObjectClass::Template, "t-1").unwrap();
    assert_eq!(template["enabled"], true);
    assert_eq!(template["os_kind"], "debian 9");
    assert!(!store.contains(ObjectClass::Vm, "s-1"));
    assert!(!store.contains(ObjectClass::Template, "s-1"));
}

#[tokio::test]
async fn duplicate_create_delete_pairs_are_idempotent() {
    let host = Arc::new(MockHost::new());
    let (synchronizer, store) = setup(&host).await;
    synchronizer.enumerate_all().await;

    let create = ObjectEvent::with_snapshot(
        "vm",
        EventOperation::Create,
        "vm-9",
        "OpaqueRef:vm9",
        vm_snapshot("vm-9", "Halted"),
    );
    let delete = ObjectEvent::deleted("vm", "vm-9");

    // The pair applied twice, with a duplicated delete in between.
    for _ in 0..2 {
        synchronizer.apply_event(&create).await;
        synchronizer.apply_event(&delete).await;
        synchronizer.apply_event(&delete).await;
    }
    assert!(!store.contains(ObjectClass::Vm, "vm-9"));

    // And the other interleaving leaves the object present exactly once.
    synchronizer.apply_event(&create).await;
    synchronizer.apply_event(&create).await;
    assert_eq!(store.len(ObjectClass::Vm), 1);
}

#[tokio::test]
async fn update_events_are_last_write_wins() {
    let host = Arc::new(MockHost::new());
    host.add_vm("OpaqueRef:vm1", "vm-1", "Halted");
    let (synchronizer, store) = setup(&host).await;
    synchronizer.enumerate_all().await;

    let update = ObjectEvent::with_snapshot(
        "vm",
        EventOperation::Update,
        "vm-1",
        "OpaqueRef:vm1",
        vm_snapshot("vm-1", "Running"),
    );
    synchronizer.apply_event(&update).await;
    synchronizer.apply_event(&update).await;

    assert_eq!(
        store.get(ObjectClass::Vm, "vm-1").unwrap()["power_state"],
        "Running"
    );
    assert_eq!(store.len(ObjectClass::Vm), 1);
}

#[tokio::test]
async fn events_before_enumeration_are_superseded_by_the_snapshot() {
    let host = Arc::new(MockHost::new());
    host.add_vm("OpaqueRef:vm2", "vm-2", "Halted");
    let (synchronizer, store) = setup(&host).await;

    // The host reports Running before the cold-start pass finishes.
    let early = ObjectEvent::with_snapshot(
        "vm",
        EventOperation::Update,
        "vm-2",
        "OpaqueRef:vm2",
        vm_snapshot("vm-2", "Running"),
    );
    synchronizer.apply_event(&early).await;
    assert!(!store.contains(ObjectClass::Vm, "vm-2"));

    // Enumeration is authoritative on cold start.
    synchronizer.enumerate_all().await;
    assert_eq!(
        store.get(ObjectClass::Vm, "vm-2").unwrap()["power_state"],
        "Halted"
    );

    // Live updates take precedence again afterwards.
    synchronizer.apply_event(&early).await;
    assert_eq!(
        store.get(ObjectClass::Vm, "vm-2").unwrap()["power_state"],
        "Running"
    );
}

#[tokio::test]
async fn reenumeration_fully_replaces_prior_contents() {
    let host = Arc::new(MockHost::new());
    host.add_vm("OpaqueRef:vm1", "vm-1", "Running");
    host.add_vm("OpaqueRef:vm2", "vm-2", "Halted");
    let (synchronizer, store) = setup(&host).await;
    synchronizer.enumerate_all().await;
    assert_eq!(store.len(ObjectClass::Vm), 2);

    // vm-2 disappears from the host between passes.
    host.remove_object("VM", "OpaqueRef:vm2");
    synchronizer.enumerate_all().await;

    assert!(store.contains(ObjectClass::Vm, "vm-1"));
    assert!(!store.contains(ObjectClass::Vm, "vm-2"));
}

#[tokio::test]
async fn update_without_snapshot_refetches_the_record() {
    let host = Arc::new(MockHost::new());
    host.add_vm("OpaqueRef:vm1", "vm-1", "Halted");
    let (synchronizer, store) = setup(&host).await;
    synchronizer.enumerate_all().await;

    host.add_vm("OpaqueRef:vm1", "vm-1", "Running");
    let bare = ObjectEvent {
        channel: "vm".to_string(),
        operation: EventOperation::Update,
        uuid: "vm-1".to_string(),
        object_ref: None,
        snapshot: None,
    };
    synchronizer.apply_event(&bare).await;

    assert_eq!(
        store.get(ObjectClass::Vm, "vm-1").unwrap()["power_state"],
        "Running"
    );
}

#[tokio::test]
async fn object_leaving_class_scope_is_evicted() {
    let host = Arc::new(MockHost::new());
    host.add_vm("OpaqueRef:vm1", "vm-1", "Halted");
    let (synchronizer, store) = setup(&host).await;
    synchronizer.enumerate_all().await;
    assert!(store.contains(ObjectClass::Vm, "vm-1"));

    // The VM was converted into a template.
    let mut converted = vm_snapshot("vm-1", "Halted");
    converted["is_a_template"] = json!(true);
    let update = ObjectEvent::with_snapshot(
        "vm",
        EventOperation::Update,
        "vm-1",
        "OpaqueRef:vm1",
        converted,
    );
    synchronizer.apply_event(&update).await;

    assert!(!store.contains(ObjectClass::Vm, "vm-1"));
    assert!(store.contains(ObjectClass::Template, "vm-1"));
}

#[tokio::test]
async fn transform_failure_on_an_event_keeps_the_last_known_document() {
    let host = Arc::new(MockHost::new());
    host.add_object(
        "VM",
        "OpaqueRef:t1",
        json!({
            "uuid": "t-1",
            "is_a_template": true,
            "is_a_snapshot": false,
            "HVM_boot_policy": "",
            "tags": [],
            "other_config": {"os_kind": "debian 9"},
            "xenstore_data": {},
        }),
    );
    let (synchronizer, store) = setup(&host).await;
    synchronizer.enumerate_all().await;
    assert_eq!(
        store.get(ObjectClass::Template, "t-1").unwrap()["os_kind"],
        "debian 9"
    );

    // The settings blob goes corrupt; the update fails its transform.
    let update = ObjectEvent::with_snapshot(
        "vm",
        EventOperation::Update,
        "t-1",
        "OpaqueRef:t1",
        json!({
            "uuid": "t-1",
            "is_a_template": true,
            "is_a_snapshot": false,
            "HVM_boot_policy": "",
            "tags": [],
            "other_config": {"os_kind": "debian 9"},
            "xenstore_data": {"vm-data/xenhive/template": "{not json"},
        }),
    );
    synchronizer.apply_event(&update).await;

    assert_eq!(
        store.get(ObjectClass::Template, "t-1").unwrap()["os_kind"],
        "debian 9"
    );
}

#[tokio::test]
async fn run_discards_events_queued_before_go_live() {
    let host = Arc::new(MockHost::new());
    host.add_vm("OpaqueRef:vm2", "vm-2", "Halted");
    let (synchronizer, store) = setup(&host).await;
    let synchronizer = Arc::new(synchronizer);

    // The host reports Running before the synchronizer even starts; the
    // event is sitting in the queue when enumeration finishes.
    let (sender, receiver) = mpsc::channel(16);
    sender
        .send(ObjectEvent::with_snapshot(
            "vm",
            EventOperation::Update,
            "vm-2",
            "OpaqueRef:vm2",
            vm_snapshot("vm-2", "Running"),
        ))
        .await
        .unwrap();
    drop(sender);
    tokio::spawn(Arc::clone(&synchronizer).run(receiver))
        .await
        .unwrap();

    // The enumeration snapshot wins over anything queued before go-live.
    assert_eq!(
        store.get(ObjectClass::Vm, "vm-2").unwrap()["power_state"],
        "Halted"
    );
}

#[tokio::test]
async fn one_malformed_record_does_not_abort_the_batch() {
    let host = Arc::new(MockHost::new());
    host.add_vm("OpaqueRef:vm1", "vm-1", "Running");
    // A template whose settings blob is corrupt: its transform fails.
    host.add_object(
        "VM",
        "OpaqueRef:t1",
        json!({
            "uuid": "t-1",
            "is_a_template": true,
            "is_a_snapshot": false,
            "HVM_boot_policy": "",
            "tags": [],
            "other_config": {},
            "xenstore_data": {"vm-data/xenhive/template": "{not json"},
        }),
    );
    let (synchronizer, store) = setup(&host).await;
    synchronizer.enumerate_all().await;

    // The corrupt template is skipped; the VM table is unaffected.
    assert!(store.contains(ObjectClass::Vm, "vm-1"));
    assert!(!store.contains(ObjectClass::Template, "t-1"));
    assert_eq!(synchronizer.state(ObjectClass::Template), SyncState::Live);
}

/// A transform that hides records based on derived state: documents are
/// visible only while a `published` tag is present.
struct PublishedOnly;

impl RecordTransform for PublishedOnly {
    fn class(&self) -> ObjectClass {
        ObjectClass::Network
    }

    fn transform(
        &self,
        uuid: &str,
        _object_ref: &str,
        record: &Value,
    ) -> anyhow::Result<Option<Value>> {
        let published = record
            .get("tags")
            .and_then(Value::as_array)
            .is_some_and(|tags| tags.iter().any(|t| t == "published"));
        if !published {
            return Ok(None);
        }
        Ok(Some(json!({ "uuid": uuid, "published": true })))
    }
}

#[tokio::test]
async fn transform_computed_visibility_controls_presence() {
    let host = Arc::new(MockHost::new());
    host.add_object(
        "network",
        "OpaqueRef:net1",
        json!({"uuid": "net-1", "tags": ["published"]}),
    );
    let pool = SessionPool::connect(
        Arc::clone(&host) as Arc<dyn xenhive::RemoteTransport>,
        &test_host_config(),
        &test_pool_config(2),
    )
    .await
    .unwrap();
    let store = Arc::new(CacheStore::new());
    let synchronizer = CacheSynchronizer::new(
        pool,
        Arc::clone(&store),
        vec![
            Arc::new(PublishedOnly),
            Arc::new(PassthroughTransform::new(ObjectClass::Vm)),
        ],
    );
    synchronizer.enumerate_all().await;
    assert!(store.contains(ObjectClass::Network, "net-1"));

    // The tag disappears; the next update hides the document.
    let update = ObjectEvent::with_snapshot(
        "network",
        EventOperation::Update,
        "net-1",
        "OpaqueRef:net1",
        json!({"uuid": "net-1", "tags": []}),
    );
    synchronizer.apply_event(&update).await;
    assert!(!store.contains(ObjectClass::Network, "net-1"));
}
