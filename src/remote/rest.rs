//! PostgREST-style HTTP client for the hosted backend
//!
//! Tables are served at `{base}/rest/v1/{table}`. Every request carries the
//! project `apikey` and, when signed in, the user's bearer token. Rows are
//! scoped to a tenant with a `<tenant_column>=eq.<tenant>` filter.

use crate::remote::RemoteApi;
use crate::shared::{ConfigError, OfflineConfig, RemoteError};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// HTTP implementation of [`RemoteApi`]
#[derive(Debug, Clone)]
pub struct RestRemote {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    access_token: Option<String>,
    tenant_column: String,
}

impl RestRemote {
    /// Client for the configured backend
    pub fn new(config: &OfflineConfig) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.remote_url()?.to_string(),
            api_key: config.api_key.clone(),
            access_token: config.access_token.clone(),
            tenant_column: config.tenant_column.clone(),
        })
    }

    /// Replace the bearer token after sign-in or refresh
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Tenant-filtered, authenticated request
    fn request(&self, builder: RequestBuilder, tenant_id: &str) -> RequestBuilder {
        let builder = builder.query(&[(self.tenant_column.as_str(), format!("eq.{}", tenant_id))]);
        self.authenticate(builder)
    }

    fn authenticate(&self, mut builder: RequestBuilder) -> RequestBuilder {
        if let Some(key) = &self.api_key {
            builder = builder.header("apikey", key);
        }
        // Anonymous requests authenticate with the project key.
        if let Some(token) = self.access_token.as_ref().or(self.api_key.as_ref()) {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Body for an insert, always owned by `tenant_id`
    fn with_tenant(&self, payload: &Value, tenant_id: &str) -> Value {
        let mut payload = payload.clone();
        if let Value::Object(fields) = &mut payload {
            fields.insert(self.tenant_column.clone(), Value::String(tenant_id.to_string()));
        }
        payload
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, RemoteError> {
        let response = builder.send().await.map_err(classify_transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = if body.is_empty() { status.to_string() } else { body };
        tracing::debug!("Remote answered {}: {}", status, message);
        Err(classify_status(status, message))
    }

    /// First row of a `return=representation` body
    async fn first_row(response: Response) -> Result<Value, RemoteError> {
        let text = response.text().await.map_err(classify_transport)?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        let body: Value = serde_json::from_str(&text).map_err(|e| RemoteError::decode(e.to_string()))?;
        Ok(match body {
            Value::Array(mut rows) if !rows.is_empty() => rows.swap_remove(0),
            Value::Array(_) => Value::Null,
            other => other,
        })
    }
}

#[async_trait::async_trait]
impl RemoteApi for RestRemote {
    async fn select(&self, table: &str, tenant_id: &str) -> Result<Vec<Value>, RemoteError> {
        let builder = self.request(self.client.get(self.table_url(table)), tenant_id);
        let response = self.send(builder.query(&[("select", "*")])).await?;
        response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| RemoteError::decode(e.to_string()))
    }

    async fn insert(&self, table: &str, tenant_id: &str, payload: &Value) -> Result<Value, RemoteError> {
        let builder = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(&self.with_tenant(payload, tenant_id));
        // Inserts carry the tenant in the body, not as a filter.
        let response = self.send(self.authenticate(builder)).await?;
        Self::first_row(response).await
    }

    async fn update(
        &self,
        table: &str,
        tenant_id: &str,
        record_id: &str,
        payload: &Value,
    ) -> Result<Value, RemoteError> {
        let builder = self
            .client
            .patch(self.table_url(table))
            .header("Prefer", "return=representation")
            .query(&[("id", format!("eq.{}", record_id))])
            .json(payload);
        let response = self.send(self.request(builder, tenant_id)).await?;
        Self::first_row(response).await
    }

    async fn delete(&self, table: &str, tenant_id: &str, record_id: &str) -> Result<(), RemoteError> {
        let builder = self
            .client
            .delete(self.table_url(table))
            .query(&[("id", format!("eq.{}", record_id))]);
        self.send(self.request(builder, tenant_id)).await?;
        Ok(())
    }
}

fn classify_transport(error: reqwest::Error) -> RemoteError {
    if error.is_timeout() {
        RemoteError::transient(format!("request timed out: {}", error))
    } else if error.is_decode() {
        RemoteError::decode(error.to_string())
    } else {
        RemoteError::unreachable(error.to_string())
    }
}

fn classify_status(status: StatusCode, message: String) -> RemoteError {
    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => RemoteError::transient(message),
        s if s.is_client_error() => RemoteError::rejected(s.as_u16(), message),
        _ => RemoteError::transient(message),
    }
}
