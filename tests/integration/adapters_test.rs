//! Query and mutation adapters against the mock remote

use crate::common::{Harness, TENANT};
use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tenantdesk_offline::adapters::DataSource;
use tenantdesk_offline::local_db::Product;
use tenantdesk_offline::offline::OperationKind;
use tenantdesk_offline::remote::RemoteApi;
use tenantdesk_offline::shared::{AdapterError, RemoteError};

#[tokio::test]
async fn test_online_query_refreshes_cache() {
    let h = Harness::new().await;
    h.remote.set_rows("products", vec![json!({"id": "p-1", "name": "Tea", "price": 2.0})]);

    let result = h
        .adapters
        .query(h.remote.select("products", TENANT))
        .cache("products", TENANT)
        .run()
        .await
        .unwrap();
    assert_eq!(result.source, DataSource::Remote);

    let products: Vec<Product> = h.store.get_products(TENANT).await.unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].price, Some(2.0));
}

#[tokio::test]
async fn test_offline_query_reads_cache_for_own_tenant_only() {
    let h = Harness::new().await;
    h.store
        .save_records("students", "school-a", &[json!({"id": "s-1", "name": "Kofi"})])
        .await
        .unwrap();
    h.go_offline();

    let own = h
        .adapters
        .query(h.remote.select("students", "school-a"))
        .cache("students", "school-a")
        .run()
        .await
        .unwrap();
    assert_eq!(own.source, DataSource::Cache);
    assert_eq!(own.records.len(), 1);

    let other = h
        .adapters
        .query(h.remote.select("students", "school-b"))
        .cache("students", "school-b")
        .run()
        .await;
    assert_matches!(other, Err(AdapterError::NoOfflineData { .. }));
}

#[tokio::test]
async fn test_offline_update_then_reconnect_round_trip() {
    let h = Harness::new().await;
    h.store
        .save_records("products", TENANT, &[json!({"id": "p-1", "name": "Tea", "price": 2.0})])
        .await
        .unwrap();
    h.go_offline();

    let change = json!({"id": "p-1", "name": "Tea", "price": 2.5});
    let result = h
        .adapters
        .mutate(OperationKind::Update, change.clone(), h.remote.update("products", TENANT, "p-1", &change))
        .cache("products", TENANT)
        .offline(async { Ok(json!({"id": "p-1", "name": "Tea", "price": 2.5})) })
        .run()
        .await
        .unwrap();
    assert!(result.operation_id.is_some());

    let local = h.store.get_record("products", TENANT, "p-1").await.unwrap().unwrap();
    assert!(local.needs_sync);
    assert_eq!(local.payload["price"], 2.5);

    h.go_online();
    let report = h.sync.sync_now().await.unwrap();
    assert_eq!(report.succeeded, 1);

    let synced = h.store.get_record("products", TENANT, "p-1").await.unwrap().unwrap();
    assert!(!synced.needs_sync);
    assert_eq!(h.store.unsynced_records(TENANT).await.unwrap().len(), 0);
}

#[tokio::test]
async fn test_offline_delete_removes_cached_row() {
    let h = Harness::new().await;
    h.store
        .save_records("customers", TENANT, &[json!({"id": "c-1"}), json!({"id": "c-2"})])
        .await
        .unwrap();
    h.go_offline();

    let payload = json!({"id": "c-1"});
    h.adapters
        .mutate(OperationKind::Delete, payload.clone(), async { Ok(serde_json::Value::Null) })
        .cache("customers", TENANT)
        .offline(async { Ok(serde_json::Value::Null) })
        .run()
        .await
        .unwrap();

    let remaining = h.store.get_records("customers", TENANT).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, "c-2");
    assert_eq!(h.sync.get_status().pending_count, 1);
}

#[tokio::test]
async fn test_optimistic_update_runs_before_remote() {
    let h = Harness::new().await;
    let events = Arc::new(Mutex::new(Vec::new()));
    let optimistic_events = Arc::clone(&events);
    let remote_events = Arc::clone(&events);

    h.adapters
        .mutate(OperationKind::Create, json!({"id": "s-1", "total": 4}), async move {
            remote_events.lock().unwrap().push("remote");
            Ok(json!({"id": "s-1", "total": 4}))
        })
        .cache("sales", TENANT)
        .optimistic(move |_| optimistic_events.lock().unwrap().push("optimistic"))
        .run()
        .await
        .unwrap();

    assert_eq!(*events.lock().unwrap(), vec!["optimistic", "remote"]);
}

#[tokio::test]
async fn test_failed_mutation_keeps_optimistic_state_without_rollback() {
    let h = Harness::new().await;
    let applied = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&applied);

    let result = h
        .adapters
        .mutate(OperationKind::Update, json!({"id": "p-1"}), async {
            Err(RemoteError::rejected(403, "permission denied"))
        })
        .optimistic(move |_| *flag.lock().unwrap() = true)
        .run()
        .await;

    assert_matches!(result, Err(AdapterError::Remote(RemoteError::Rejected { status: 403, .. })));
    assert!(*applied.lock().unwrap());
    assert_eq!(h.store.count_pending_operations().await.unwrap(), 0);
}

#[tokio::test]
async fn test_offline_handler_error_is_surfaced() {
    let h = Harness::new().await;
    h.go_offline();

    let result = h
        .adapters
        .mutate(OperationKind::Create, json!({"total": 1}), async { Ok(serde_json::Value::Null) })
        .cache("sales", TENANT)
        .offline(async { Err(AdapterError::offline_handler("form incomplete")) })
        .run()
        .await;

    assert_matches!(result, Err(AdapterError::OfflineHandler { .. }));
    assert_eq!(h.store.count_pending_operations().await.unwrap(), 0);
}

#[tokio::test]
async fn test_failed_newer_edit_survives_older_edit_syncing() {
    let h = Harness::new().await;
    h.store
        .save_records("products", TENANT, &[json!({"id": "p-1", "price": 2.0})])
        .await
        .unwrap();
    h.remote
        .fail_matching(|call| call.payload["price"] == 3.0, RemoteError::transient("timeout"));
    h.go_offline();

    for price in [2.5, 3.0] {
        let change = json!({"id": "p-1", "price": price});
        h.adapters
            .mutate(OperationKind::Update, change.clone(), async { Ok(serde_json::Value::Null) })
            .cache("products", TENANT)
            .offline(async move { Ok(change) })
            .run()
            .await
            .unwrap();
    }

    h.go_online();
    let report = h.sync.drain_queue().await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);

    let cached = h.store.get_record("products", TENANT, "p-1").await.unwrap().unwrap();
    assert_eq!(cached.payload["price"], 3.0);
    assert!(cached.needs_sync);
    assert_eq!(h.store.count_pending_operations().await.unwrap(), 1);
}

#[tokio::test]
async fn test_one_malformed_row_does_not_empty_the_offline_cache() {
    let h = Harness::new().await;
    h.remote.set_rows(
        "products",
        vec![json!({"id": "p-1", "price": 2.0}), json!({"id": "p-2", "price": "3.50"})],
    );

    let online = h
        .adapters
        .query(h.remote.select("products", TENANT))
        .cache("products", TENANT)
        .run()
        .await
        .unwrap();
    assert_eq!(online.records.len(), 2);

    h.go_offline();
    let offline = h
        .adapters
        .query(h.remote.select("products", TENANT))
        .cache("products", TENANT)
        .run()
        .await
        .unwrap();
    assert_eq!(offline.source, DataSource::Cache);
    assert_eq!(offline.records, vec![json!({"id": "p-1", "price": 2.0})]);
}

#[tokio::test]
async fn test_query_returns_remote_rows_when_cache_write_fails() {
    let h = Harness::new().await;
    h.remote.set_rows("customers", vec![json!({"id": "c-1", "name": "Ama"})]);
    h.store.close().await;

    let result = h
        .adapters
        .query(h.remote.select("customers", TENANT))
        .cache("customers", TENANT)
        .run()
        .await
        .unwrap();

    assert_eq!(result.source, DataSource::Remote);
    assert_eq!(result.records, vec![json!({"id": "c-1", "name": "Ama"})]);
}

#[tokio::test]
async fn test_mutation_returns_remote_row_when_cache_write_fails() {
    let h = Harness::new().await;
    h.store.close().await;

    let payload = json!({"name": "Ama"});
    let result = h
        .adapters
        .mutate(OperationKind::Create, payload.clone(), h.remote.insert("customers", TENANT, &payload))
        .cache("customers", TENANT)
        .run()
        .await
        .unwrap();

    assert_eq!(result.source, DataSource::Remote);
    assert_eq!(result.value, json!([{"name": "Ama", "id": "srv-1"}]));
    assert_eq!(h.remote.calls().len(), 1);
}
