//! Per-record ordering and blocking

use crate::common::{Harness, TENANT};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tenantdesk_offline::offline::OperationKind;
use tenantdesk_offline::shared::RemoteError;

#[tokio::test]
async fn test_same_record_replayed_in_enqueue_order() {
    let h = Harness::new().await;
    let steps = [
        (OperationKind::Create, json!({"id": "p-1", "name": "Tea"})),
        (OperationKind::Update, json!({"id": "p-1", "price": 2.5})),
        (OperationKind::Update, json!({"id": "p-1", "price": 3.0})),
        (OperationKind::Delete, json!({"id": "p-1"})),
    ];
    for (kind, payload) in &steps {
        h.sync.queue_operation(*kind, "products", payload, TENANT).await.unwrap();
    }

    let report = h.sync.drain_queue().await.unwrap();

    assert_eq!(report.succeeded, 4);
    let kinds: Vec<OperationKind> = h.remote.calls().iter().map(|call| call.kind).collect();
    assert_eq!(
        kinds,
        vec![
            OperationKind::Create,
            OperationKind::Update,
            OperationKind::Update,
            OperationKind::Delete
        ]
    );
    assert_eq!(h.store.count_pending_operations().await.unwrap(), 0);
}

#[tokio::test]
async fn test_failed_record_holds_back_its_later_operations() {
    let h = Harness::new().await;
    h.remote.fail_record("p-1", RemoteError::transient("timeout"));

    h.sync
        .queue_operation(OperationKind::Update, "products", &json!({"id": "p-1", "price": 1}), TENANT)
        .await
        .unwrap();
    h.sync
        .queue_operation(OperationKind::Update, "products", &json!({"id": "p-2", "price": 1}), TENANT)
        .await
        .unwrap();
    h.sync
        .queue_operation(OperationKind::Delete, "products", &json!({"id": "p-1"}), TENANT)
        .await
        .unwrap();
    h.sync
        .queue_operation(OperationKind::Update, "products", &json!({"id": "p-2", "price": 2}), TENANT)
        .await
        .unwrap();

    let report = h.sync.drain_queue().await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.blocked, 1);
    assert_eq!(report.succeeded, 2);
    assert_eq!(h.remote.calls_for("p-1").len(), 1);
    assert_eq!(h.remote.calls_for("p-2").len(), 2);

    // Once the record recovers, the held-back delete follows its update.
    h.remote.heal_record("p-1");
    h.sync.drain_queue().await.unwrap();

    let p1: Vec<OperationKind> = h.remote.calls_for("p-1").iter().map(|call| call.kind).collect();
    assert_eq!(p1, vec![OperationKind::Update, OperationKind::Update, OperationKind::Delete]);
    assert_eq!(h.store.count_pending_operations().await.unwrap(), 0);
}

#[tokio::test]
async fn test_same_id_in_different_tables_is_independent() {
    let h = Harness::new().await;
    h.remote.fail_next(RemoteError::transient("timeout"));

    h.sync
        .queue_operation(OperationKind::Update, "students", &json!({"id": 7}), TENANT)
        .await
        .unwrap();
    h.sync
        .queue_operation(OperationKind::Update, "classes", &json!({"id": 7}), TENANT)
        .await
        .unwrap();

    let report = h.sync.drain_queue().await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.blocked, 0);
}

#[tokio::test]
async fn test_creates_without_ids_do_not_block_each_other() {
    let h = Harness::new().await;
    h.remote.fail_next(RemoteError::unreachable("reset"));

    for total in [5, 6, 7] {
        h.sync
            .queue_operation(OperationKind::Create, "sales", &json!({"total": total}), TENANT)
            .await
            .unwrap();
    }

    let report = h.sync.drain_queue().await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.succeeded, 2);
    let totals: Vec<Value> = h.remote.calls().iter().map(|call| call.payload["total"].clone()).collect();
    assert_eq!(totals, vec![json!(5), json!(6), json!(7)]);
}

#[tokio::test]
async fn test_operations_queued_during_drain_are_picked_up() {
    let h = Harness::with_remote(crate::common::MockRemote::with_delay(std::time::Duration::from_millis(20))).await;
    h.sync
        .queue_operation(OperationKind::Create, "sales", &json!({"id": "s-1"}), TENANT)
        .await
        .unwrap();

    let drain = h.sync.drain_queue();
    let enqueue = async {
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        h.sync
            .queue_operation(OperationKind::Create, "sales", &json!({"id": "s-2"}), TENANT)
            .await
            .unwrap();
    };
    let (report, _) = tokio::join!(drain, enqueue);

    assert_eq!(report.unwrap().succeeded, 2);
    assert_eq!(h.store.count_pending_operations().await.unwrap(), 0);
}

#[tokio::test]
async fn test_same_id_in_different_tenants_is_independent() {
    let h = Harness::new().await;
    h.remote
        .fail_matching(|call| call.tenant_id == "shop-a", RemoteError::transient("timeout"));

    for tenant in ["shop-a", "shop-a", "shop-b"] {
        h.sync
            .queue_operation(OperationKind::Update, "products", &json!({"id": "p-1"}), tenant)
            .await
            .unwrap();
    }

    let report = h.sync.drain_queue().await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.blocked, 1);
    assert_eq!(report.succeeded, 1);
    let tenants: Vec<String> = h.remote.calls().into_iter().map(|call| call.tenant_id).collect();
    assert_eq!(tenants, vec!["shop-a", "shop-b"]);
}
