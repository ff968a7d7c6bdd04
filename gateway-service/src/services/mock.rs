//! Mock collaborators for testing.

use super::completion::{CompletionProvider, ProviderError};
use super::notifier::{AlertSink, SinkError};
use super::repository::{StoreError, TenantStore};
use crate::models::{ChatMessage, ConversationTurn, Tenant, TurnRole};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory [`TenantStore`] with observable writes.
#[derive(Default)]
pub struct MockTenantStore {
    tenant: Option<Tenant>,
    usage: i64,
    /// History as the repository would return it: newest first.
    history: Vec<ChatMessage>,
    fail_reads: bool,
    fail_writes: bool,
    appended: Mutex<Vec<ConversationTurn>>,
    increments: AtomicI64,
}

impl MockTenantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenant(mut self, tenant: Tenant) -> Self {
        self.tenant = Some(tenant);
        self
    }

    pub fn with_usage(mut self, usage: i64) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn appended_turns(&self) -> Vec<ConversationTurn> {
        self.appended.lock().unwrap().clone()
    }

    pub fn increment_count(&self) -> i64 {
        self.increments.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TenantStore for MockTenantStore {
    async fn get_tenant(&self, _tenant_id: &str) -> Option<Tenant> {
        self.tenant.clone()
    }

    async fn usage_today(&self, _tenant_id: &str, _date: NaiveDate) -> Result<i64, StoreError> {
        if self.fail_reads {
            return Err(StoreError::Network("mock read failure".to_string()));
        }
        Ok(self.usage)
    }

    async fn increment_usage(&self, _tenant_id: &str) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Network("mock write failure".to_string()));
        }
        self.increments.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn append_turns(
        &self,
        tenant_id: &str,
        session_id: &str,
        user_content: &str,
        assistant_content: &str,
    ) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Network("mock write failure".to_string()));
        }
        let mut appended = self.appended.lock().unwrap();
        appended.push(ConversationTurn {
            client_id: tenant_id.to_string(),
            session_id: session_id.to_string(),
            role: TurnRole::User,
            content: user_content.to_string(),
            created_at: Some(Utc::now()),
        });
        appended.push(ConversationTurn {
            client_id: tenant_id.to_string(),
            session_id: session_id.to_string(),
            role: TurnRole::Assistant,
            content: assistant_content.to_string(),
            created_at: Some(Utc::now()),
        });
        Ok(())
    }

    async fn recent_turns(
        &self,
        _session_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        if self.fail_reads {
            return Err(StoreError::Network("mock read failure".to_string()));
        }
        Ok(self.history.iter().take(limit).cloned().collect())
    }
}

/// [`CompletionProvider`] returning a canned reply, with call accounting.
pub struct MockCompletionProvider {
    reply: Option<String>,
    calls: AtomicUsize,
    last_model: Mutex<Option<String>>,
    last_credential: Mutex<Option<String>>,
    last_messages: Mutex<Vec<ChatMessage>>,
}

impl MockCompletionProvider {
    pub fn with_reply(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
            last_model: Mutex::new(None),
            last_credential: Mutex::new(None),
            last_messages: Mutex::new(Vec::new()),
        }
    }

    /// Fails every call, as a timed-out or 5xx upstream would.
    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: AtomicUsize::new(0),
            last_model: Mutex::new(None),
            last_credential: Mutex::new(None),
            last_messages: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_model(&self) -> Option<String> {
        self.last_model.lock().unwrap().clone()
    }

    pub fn last_credential(&self) -> Option<String> {
        self.last_credential.lock().unwrap().clone()
    }

    /// The prompt of the most recent call.
    pub fn last_messages(&self) -> Vec<ChatMessage> {
        self.last_messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for MockCompletionProvider {
    async fn complete(
        &self,
        credential: &str,
        model: &str,
        messages: &[ChatMessage],
        _temperature: f32,
    ) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_model.lock().unwrap() = Some(model.to_string());
        *self.last_credential.lock().unwrap() = Some(credential.to_string());
        *self.last_messages.lock().unwrap() = messages.to_vec();

        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None => Err(ProviderError::Api {
                status: 500,
                body: "mock upstream failure".to_string(),
            }),
        }
    }
}

/// [`AlertSink`] recording dispatched alerts.
#[derive(Default)]
pub struct MockAlertSink {
    fail: bool,
    sent: Mutex<Vec<(String, String)>>,
}

impl MockAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent_alerts(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for MockAlertSink {
    async fn send(&self, chat_id: &str, text: &str) -> Result<(), SinkError> {
        if self.fail {
            return Err(SinkError::Network("mock sink failure".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.to_string(), text.to_string()));
        Ok(())
    }
}
