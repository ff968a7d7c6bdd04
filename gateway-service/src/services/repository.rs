//! Tenant repository adapter.
//!
//! Speaks a PostgREST-style REST API with a service credential. The
//! repository owns tenants, daily usage counters, and conversation
//! history; the gateway treats it as an opaque collaborator.

use crate::config::RepositoryConfig;
use crate::models::{ChatMessage, ConversationTurn, Tenant, TurnRole};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("repository request failed: {0}")]
    Network(String),

    #[error("repository returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to decode repository response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Network(err.to_string())
    }
}

/// Read and write operations against the tenant repository.
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Fetch a tenant by id.
    ///
    /// Absence and lookup failure both yield `None`; the pipeline treats
    /// the two identically (failures are logged here).
    async fn get_tenant(&self, tenant_id: &str) -> Option<Tenant>;

    /// Today's exchange count for the tenant; 0 when no row exists.
    async fn usage_today(&self, tenant_id: &str, date: NaiveDate) -> Result<i64, StoreError>;

    /// Atomic server-side usage increment.
    async fn increment_usage(&self, tenant_id: &str) -> Result<(), StoreError>;

    /// Insert the user and assistant turns of one exchange as a single
    /// write, user turn first.
    async fn append_turns(
        &self,
        tenant_id: &str,
        session_id: &str,
        user_content: &str,
        assistant_content: &str,
    ) -> Result<(), StoreError>;

    /// The most recent `limit` turns of a session, newest first.
    async fn recent_turns(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, StoreError>;
}

/// HTTP implementation of [`TenantStore`].
pub struct HttpTenantStore {
    base_url: String,
    service_key: String,
    client: Client,
}

impl HttpTenantStore {
    pub fn new(config: &RepositoryConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
            client,
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

#[derive(Debug, Deserialize)]
struct UsageRow {
    count: i64,
}

#[derive(Debug, Deserialize)]
struct TurnRow {
    role: TurnRole,
    content: String,
}

#[async_trait]
impl TenantStore for HttpTenantStore {
    async fn get_tenant(&self, tenant_id: &str) -> Option<Tenant> {
        let request = self
            .authed(self.client.get(self.table_url("clients")))
            .query(&[
                ("id", format!("eq.{}", tenant_id)),
                ("select", "*".to_string()),
                ("limit", "1".to_string()),
            ]);

        let result: Result<Vec<Tenant>, StoreError> = async {
            let response = Self::check(request.send().await?).await?;
            response
                .json()
                .await
                .map_err(|e| StoreError::Decode(e.to_string()))
        }
        .await;

        match result {
            Ok(mut rows) => rows.drain(..).next(),
            Err(e) => {
                tracing::warn!(error = %e, tenant_id, "tenant lookup failed, treating as not found");
                None
            }
        }
    }

    async fn usage_today(&self, tenant_id: &str, date: NaiveDate) -> Result<i64, StoreError> {
        let response = self
            .authed(self.client.get(self.table_url("usage_logs")))
            .query(&[
                ("client_id", format!("eq.{}", tenant_id)),
                ("usage_date", format!("eq.{}", date)),
                ("select", "count".to_string()),
            ])
            .send()
            .await?;

        let rows: Vec<UsageRow> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        Ok(rows.first().map(|r| r.count).unwrap_or(0))
    }

    async fn increment_usage(&self, tenant_id: &str) -> Result<(), StoreError> {
        let response = self
            .authed(self.client.post(self.table_url("rpc/increment_usage")))
            .json(&json!({ "cid": tenant_id }))
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn append_turns(
        &self,
        tenant_id: &str,
        session_id: &str,
        user_content: &str,
        assistant_content: &str,
    ) -> Result<(), StoreError> {
        let rows = vec![
            ConversationTurn {
                client_id: tenant_id.to_string(),
                session_id: session_id.to_string(),
                role: TurnRole::User,
                content: user_content.to_string(),
                created_at: None,
            },
            ConversationTurn {
                client_id: tenant_id.to_string(),
                session_id: session_id.to_string(),
                role: TurnRole::Assistant,
                content: assistant_content.to_string(),
                created_at: None,
            },
        ];

        let response = self
            .authed(self.client.post(self.table_url("conversations")))
            .header("Prefer", "return=minimal")
            .json(&rows)
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn recent_turns(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let response = self
            .authed(self.client.get(self.table_url("conversations")))
            .query(&[
                ("session_id", format!("eq.{}", session_id)),
                ("select", "role,content".to_string()),
                ("order", "created_at.desc".to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;

        let rows: Vec<TurnRow> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|r| ChatMessage {
                role: r.role.as_str().to_string(),
                content: r.content,
            })
            .collect())
    }
}
