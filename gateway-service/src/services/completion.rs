//! Upstream completion orchestration.
//!
//! Builds the tenant-branded prompt and calls an OpenAI-compatible chat
//! completion API with a bounded timeout and a rotating bearer credential.

use crate::config::CompletionConfig;
use crate::models::ChatMessage;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no completion credentials available")]
    NoCredentials,

    #[error("completion request timed out")]
    Timeout,

    #[error("completion network error: {0}")]
    Network(String),

    #[error("completion API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed completion response: {0}")]
    Malformed(String),
}

/// A text-completion backend.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Run one completion and return the first choice's reply text.
    async fn complete(
        &self,
        credential: &str,
        model: &str,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, ProviderError>;
}

/// Assemble the prompt: tenant-branded system message, then the
/// chronological context, then the current user message.
pub fn build_messages(
    tenant_name: &str,
    context: &[ChatMessage],
    user_message: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(context.len() + 2);
    messages.push(ChatMessage::system(format!(
        "You are a creative partner Ria for {}. Help clients professionally.",
        tenant_name
    )));
    messages.extend_from_slice(context);
    messages.push(ChatMessage::user(user_message));
    messages
}

/// [`CompletionProvider`] over an OpenAI-compatible `chat/completions`
/// endpoint (Groq in production).
pub struct OpenAiChatProvider {
    api_base: String,
    client: Client,
}

impl OpenAiChatProvider {
    pub fn new(config: &CompletionConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiChatProvider {
    async fn complete(
        &self,
        credential: &str,
        model: &str,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, ProviderError> {
        let request = ChatCompletionRequest {
            model,
            messages,
            temperature,
        };

        tracing::debug!(
            model,
            message_count = messages.len(),
            "sending chat completion request"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(credential)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::Malformed("response carried no reply text".to_string()))
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_orders_system_context_user() {
        let context = vec![
            ChatMessage::user("earlier question"),
            ChatMessage::assistant("earlier answer"),
        ];
        let messages = build_messages("Acme Flowers", &context, "current question");

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("Acme Flowers"));
        assert_eq!(messages[1].content, "earlier question");
        assert_eq!(messages[2].content, "earlier answer");
        assert_eq!(messages[3].role, "user");
        assert_eq!(messages[3].content, "current question");
    }

    #[test]
    fn prompt_without_context_has_system_and_user_only() {
        let messages = build_messages("Acme", &[], "hello");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
    }

    #[test]
    fn missing_reply_text_decodes_as_malformed() {
        let raw = r#"{"choices":[{"message":{"role":"assistant"}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        let reply = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content);
        assert!(reply.is_none());
    }
}
