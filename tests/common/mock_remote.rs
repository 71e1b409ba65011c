//! Scriptable remote API

use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tenantdesk_offline::offline::OperationKind;
use tenantdesk_offline::remote::RemoteApi;
use tenantdesk_offline::shared::RemoteError;

/// One call received by the mock
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCall {
    pub kind: OperationKind,
    pub table: String,
    pub tenant_id: String,
    pub record_id: Option<String>,
    pub payload: Value,
}

type CallMatcher = Box<dyn Fn(&RemoteCall) -> bool + Send + Sync>;

#[derive(Default)]
pub struct MockRemote {
    calls: Mutex<Vec<RemoteCall>>,
    next_failures: Mutex<VecDeque<RemoteError>>,
    failing_records: Mutex<HashMap<String, RemoteError>>,
    failing_calls: Mutex<Vec<(CallMatcher, RemoteError)>>,
    rows: Mutex<HashMap<String, Vec<Value>>>,
    select_error: Mutex<Option<RemoteError>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    next_id: AtomicUsize,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write takes `delay` to answer
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Fail the next write with `error`
    pub fn fail_next(&self, error: RemoteError) {
        self.next_failures.lock().unwrap().push_back(error);
    }

    /// Fail every write addressed to `record_id` until healed
    pub fn fail_record(&self, record_id: &str, error: RemoteError) {
        self.failing_records.lock().unwrap().insert(record_id.to_string(), error);
    }

    /// Fail every write for which `matches` returns true
    pub fn fail_matching<F>(&self, matches: F, error: RemoteError)
    where
        F: Fn(&RemoteCall) -> bool + Send + Sync + 'static,
    {
        self.failing_calls.lock().unwrap().push((Box::new(matches), error));
    }

    pub fn heal_record(&self, record_id: &str) {
        self.failing_records.lock().unwrap().remove(record_id);
    }

    /// Rows returned by `select` for `table`
    pub fn set_rows(&self, table: &str, rows: Vec<Value>) {
        self.rows.lock().unwrap().insert(table.to_string(), rows);
    }

    pub fn fail_selects(&self, error: RemoteError) {
        *self.select_error.lock().unwrap() = Some(error);
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, record_id: &str) -> Vec<RemoteCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.record_id.as_deref() == Some(record_id))
            .collect()
    }

    /// Highest number of writes that were in progress at once
    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn write(&self, call: RemoteCall) -> Result<Value, RemoteError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let record_failure = call
            .record_id
            .as_ref()
            .and_then(|id| self.failing_records.lock().unwrap().get(id).cloned());
        let matched_failure = self
            .failing_calls
            .lock()
            .unwrap()
            .iter()
            .find(|(matches, _)| matches(&call))
            .map(|(_, error)| error.clone());
        let failure = record_failure
            .or(matched_failure)
            .or_else(|| self.next_failures.lock().unwrap().pop_front());

        let response = match call.kind {
            OperationKind::Create => {
                let mut row = call.payload.clone();
                if let Value::Object(fields) = &mut row {
                    if !fields.contains_key("id") {
                        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                        fields.insert("id".to_string(), json!(format!("srv-{}", id)));
                    }
                }
                json!([row])
            }
            OperationKind::Update => json!([call.payload]),
            OperationKind::Delete => Value::Null,
        };

        self.calls.lock().unwrap().push(call);
        match failure {
            Some(error) => Err(error),
            None => Ok(response),
        }
    }
}

#[async_trait::async_trait]
impl RemoteApi for MockRemote {
    async fn select(&self, table: &str, _tenant_id: &str) -> Result<Vec<Value>, RemoteError> {
        if let Some(error) = self.select_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self.rows.lock().unwrap().get(table).cloned().unwrap_or_default())
    }

    async fn insert(&self, table: &str, tenant_id: &str, payload: &Value) -> Result<Value, RemoteError> {
        self.write(RemoteCall {
            kind: OperationKind::Create,
            table: table.to_string(),
            tenant_id: tenant_id.to_string(),
            record_id: tenantdesk_offline::offline::record_id_of(payload),
            payload: payload.clone(),
        })
        .await
    }

    async fn update(
        &self,
        table: &str,
        tenant_id: &str,
        record_id: &str,
        payload: &Value,
    ) -> Result<Value, RemoteError> {
        self.write(RemoteCall {
            kind: OperationKind::Update,
            table: table.to_string(),
            tenant_id: tenant_id.to_string(),
            record_id: Some(record_id.to_string()),
            payload: payload.clone(),
        })
        .await
    }

    async fn delete(&self, table: &str, tenant_id: &str, record_id: &str) -> Result<(), RemoteError> {
        self.write(RemoteCall {
            kind: OperationKind::Delete,
            table: table.to_string(),
            tenant_id: tenant_id.to_string(),
            record_id: Some(record_id.to_string()),
            payload: json!({"id": record_id}),
        })
        .await
        .map(|_| ())
    }
}

