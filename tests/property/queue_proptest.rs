//! Property-based tests for queue replay order

use crate::common::{Harness, TENANT};
use proptest::prelude::*;
use serde_json::json;
use tenantdesk_offline::offline::OperationKind;
use tenantdesk_offline::shared::RemoteError;

fn operation() -> impl Strategy<Value = (OperationKind, String)> {
    let kind = prop_oneof![
        Just(OperationKind::Create),
        Just(OperationKind::Update),
        Just(OperationKind::Delete),
    ];
    (kind, (0u8..4).prop_map(|n| format!("r-{}", n)))
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// Queue `operations`, optionally fail one record, drain once; returns the
/// remote calls and the operations left queued
fn replay(operations: &[(OperationKind, String)], failing: Option<&str>) -> (Vec<(OperationKind, String)>, usize) {
    runtime().block_on(async {
        let h = Harness::new().await;
        if let Some(record_id) = failing {
            h.remote.fail_record(record_id, RemoteError::transient("timeout"));
        }
        for (kind, record_id) in operations {
            h.sync
                .queue_operation(*kind, "products", &json!({"id": record_id}), TENANT)
                .await
                .unwrap();
        }
        h.sync.drain_queue().await.unwrap();

        let calls: Vec<(OperationKind, String)> = h
            .remote
            .calls()
            .into_iter()
            .map(|call| (call.kind, call.record_id.unwrap_or_default()))
            .collect();
        let pending = h.store.count_pending_operations().await.unwrap();
        (calls, pending)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_successful_drain_replays_in_enqueue_order(
        operations in proptest::collection::vec(operation(), 0..12),
    ) {
        let (calls, pending) = replay(&operations, None);

        prop_assert_eq!(&calls, &operations);
        prop_assert_eq!(pending, 0);
    }

    #[test]
    fn test_failing_record_is_tried_once_and_others_keep_order(
        operations in proptest::collection::vec(operation(), 1..12),
    ) {
        let failing = operations[0].1.clone();
        let (calls, pending) = replay(&operations, Some(&failing));
        let failing_ops = operations.iter().filter(|(_, id)| *id == failing).count();
        prop_assert_eq!(pending, failing_ops);

        let failing_calls = calls.iter().filter(|(_, id)| *id == failing).count();
        prop_assert_eq!(failing_calls, 1);

        let expected_others: Vec<_> = operations.iter().filter(|(_, id)| *id != failing).cloned().collect();
        let others: Vec<_> = calls.into_iter().filter(|(_, id)| *id != failing).collect();
        prop_assert_eq!(others, expected_others);
    }
}
