//! Queue replay against an HTTP backend

use crate::common::TENANT;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use tenantdesk_offline::local_db::LocalDatabase;
use tenantdesk_offline::offline::{BackoffStrategy, OperationKind};
use tenantdesk_offline::remote::RestRemote;
use tenantdesk_offline::shared::OfflineConfig;
use tenantdesk_offline::sync::{NetworkMonitor, SyncManager, SyncState};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn sync_against(server: &MockServer) -> (Arc<LocalDatabase>, SyncManager) {
    let config = OfflineConfig::builder()
        .remote_url(server.uri())
        .api_key("anon-key")
        .build()
        .unwrap();
    let store = Arc::new(LocalDatabase::in_memory().await.unwrap());
    let remote = Arc::new(RestRemote::new(&config).unwrap());
    let sync = SyncManager::new(store.clone(), remote, Arc::new(NetworkMonitor::default()), &config)
        .with_backoff(BackoffStrategy::None);
    (store, sync)
}

#[tokio::test]
async fn test_queued_create_is_posted_with_tenant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/customers"))
        .and(header("apikey", "anon-key"))
        .and(body_partial_json(json!({"name": "Jane", "tenant_id": TENANT})))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!([{"id": "c-9", "name": "Jane", "tenant_id": TENANT}])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (store, sync) = sync_against(&server).await;
    let operation_id = sync
        .queue_operation(OperationKind::Create, "customers", &json!({"name": "Jane"}), TENANT)
        .await
        .unwrap();
    store
        .save_local("customers", TENANT, &operation_id.to_string(), &json!({"name": "Jane"}))
        .await
        .unwrap();

    let report = sync.sync_now().await.unwrap();

    assert_eq!(report.succeeded, 1);
    let cached = store.get_records("customers", TENANT).await.unwrap();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].id, "c-9");
    assert!(!cached[0].needs_sync);
}

#[tokio::test]
async fn test_update_and_delete_are_filtered_by_id_and_tenant() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/products"))
        .and(query_param("id", "eq.p-1"))
        .and(query_param("tenant_id", format!("eq.{}", TENANT)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "p-1", "price": 3.0}])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/products"))
        .and(query_param("id", "eq.p-1"))
        .and(query_param("tenant_id", format!("eq.{}", TENANT)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let (store, sync) = sync_against(&server).await;
    sync.queue_operation(OperationKind::Update, "products", &json!({"id": "p-1", "price": 3.0}), TENANT)
        .await
        .unwrap();
    sync.queue_operation(OperationKind::Delete, "products", &json!({"id": "p-1"}), TENANT)
        .await
        .unwrap();

    let report = sync.drain_queue().await.unwrap();

    assert_eq!(report.succeeded, 2);
    assert_eq!(store.count_pending_operations().await.unwrap(), 0);
}

#[tokio::test]
async fn test_conflict_parks_operation_and_server_error_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/customers"))
        .and(body_partial_json(json!({"id": "c-1"})))
        .respond_with(ResponseTemplate::new(409).set_body_string("duplicate key value"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/customers"))
        .and(body_partial_json(json!({"id": "c-2"})))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let (_store, sync) = sync_against(&server).await;
    for id in ["c-1", "c-2"] {
        sync.queue_operation(OperationKind::Create, "customers", &json!({"id": id}), TENANT)
            .await
            .unwrap();
    }

    let report = sync.drain_queue().await.unwrap();
    assert_eq!(report.failed, 2);
    assert_eq!(sync.get_status().state, SyncState::Error);

    let failed = sync.failed_operations().await.unwrap();
    let rejected: Vec<bool> = failed.iter().map(|op| op.rejected).collect();
    assert_eq!(rejected, vec![true, false]);

    // Only the retryable one is attempted again automatically.
    let again = sync.drain_queue().await.unwrap();
    assert_eq!(again.deferred, 1);
    assert_eq!(again.failed, 1);
}
