//! Lead detection and alert dispatch.
//!
//! When an exchange looks like commercial intent, a one-shot alert is sent
//! to the tenant's configured chat. Dispatch is fire-and-forget: it never
//! blocks, fails, or retries on the request path.

use crate::config::NotifierConfig;
use crate::models::Tenant;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Trigger terms shipped by default: order/pricing intent in English and
/// Sinhala, matching the markets the gateway currently serves.
pub fn default_lead_keywords() -> Vec<String> {
    [
        "ORDER_CONFIRMED",
        "ඇණවුම",
        "ගාණ කීයද",
        "මිල",
        "price",
        "order",
    ]
    .iter()
    .map(|k| k.to_string())
    .collect()
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("alert request failed: {0}")]
    Network(String),

    #[error("alert channel returned {status}: {body}")]
    Api { status: u16, body: String },
}

/// A push channel for lead alerts.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, chat_id: &str, text: &str) -> Result<(), SinkError>;
}

/// Keyword classifier over one exchange.
///
/// Deliberately a standalone predicate so the trigger logic can be swapped
/// without touching the pipeline.
pub struct LeadDetector {
    keywords: Vec<String>,
}

impl LeadDetector {
    pub fn new(keywords: Vec<String>) -> Self {
        Self {
            keywords: keywords.into_iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// Case-insensitive substring match over both sides of the exchange.
    pub fn matches(&self, user_message: &str, reply: &str) -> bool {
        let user_message = user_message.to_lowercase();
        let reply = reply.to_lowercase();
        self.keywords
            .iter()
            .any(|k| user_message.contains(k) || reply.contains(k))
    }
}

/// Telegram implementation of [`AlertSink`].
pub struct TelegramSink {
    bot_token: String,
    client: Client,
}

impl TelegramSink {
    pub fn new(bot_token: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            bot_token: bot_token.to_string(),
            client,
        }
    }
}

#[async_trait]
impl AlertSink for TelegramSink {
    async fn send(&self, chat_id: &str, text: &str) -> Result<(), SinkError> {
        let response = self
            .client
            .post(format!(
                "https://api.telegram.org/bot{}/sendMessage",
                self.bot_token
            ))
            .json(&json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "Markdown",
            }))
            .send()
            .await
            .map_err(|e| SinkError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Inspects each exchange and dispatches lead alerts.
#[derive(Clone)]
pub struct LeadNotifier {
    detector: Arc<LeadDetector>,
    sink: Arc<dyn AlertSink>,
}

impl LeadNotifier {
    pub fn new(detector: LeadDetector, sink: Arc<dyn AlertSink>) -> Self {
        Self {
            detector: Arc::new(detector),
            sink,
        }
    }

    pub fn from_config(config: &NotifierConfig) -> Self {
        Self::new(
            LeadDetector::new(config.lead_keywords.clone()),
            Arc::new(TelegramSink::new(&config.bot_token)),
        )
    }

    /// Fire an alert when the exchange matches the lead predicate.
    ///
    /// The send runs on a detached task; failures are logged and never
    /// retried.
    pub fn maybe_notify(&self, tenant: &Tenant, user_message: &str, reply: &str) {
        if !self.detector.matches(user_message, reply) {
            return;
        }

        let Some(chat_id) = tenant.notification_chat_id.clone() else {
            tracing::debug!(
                tenant_id = %tenant.id,
                "lead matched but tenant has no notification chat configured"
            );
            return;
        };

        let text = format!(
            "🔔 *New Lead/Order!*\n\nBusiness: {}\nMessage: {}\n\nAI Reply: {}",
            tenant.name, user_message, reply
        );
        let sink = self.sink.clone();
        let tenant_id = tenant.id.clone();

        tokio::spawn(async move {
            if let Err(e) = sink.send(&chat_id, &text).await {
                tracing::warn!(error = %e, tenant_id, "lead alert dispatch failed");
            } else {
                tracing::info!(tenant_id, "lead alert dispatched");
            }
        });
    }
}
