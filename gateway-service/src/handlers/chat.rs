//! The chat exchange pipeline.
//!
//! Gating (entitlement, quota), context assembly, upstream completion, and
//! the detached persistence/notification fan-out, behind one POST endpoint.
//!
//! Policy refusals (suspended tenant, exhausted quota) and upstream
//! failures are all delivered as HTTP 200 with explanatory reply text, so
//! the embedding clients see one uniform response shape; diagnostic detail
//! stays in the server logs.

use crate::services::completion::build_messages;
use crate::services::context::load_context;
use crate::startup::AppState;
use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use validator::Validate;

const SUSPENDED_REPLY: &str =
    "Your service is temporarily suspended. Please complete your pending payment to continue.";

const LIMIT_REPLY: &str =
    "Your daily message limit has been reached. Please try again tomorrow.";

const UPSTREAM_APOLOGY: &str =
    "Sorry, I could not process your message right now. Please try again in a moment.";

#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "client_id is required"))]
    pub client_id: String,

    /// Conversation thread id; falls back to the client id when absent so
    /// single-conversation embeds need not manage sessions.
    #[serde(default)]
    pub session_id: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "message is required"))]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

fn soft_reply(text: &str) -> Json<ChatResponse> {
    Json(ChatResponse {
        reply: text.to_string(),
    })
}

/// Handle one chat exchange.
///
/// POST /chat
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    req.validate()?;

    let session_id = if req.session_id.is_empty() {
        req.client_id.clone()
    } else {
        req.session_id.clone()
    };

    // Entitlement gate. Lookup failure and absence are treated alike.
    let Some(tenant) = state.store.get_tenant(&req.client_id).await else {
        return Ok(soft_reply(SUSPENDED_REPLY));
    };
    if !tenant.is_active() {
        tracing::info!(tenant_id = %tenant.id, status = %tenant.status, "inactive tenant refused");
        return Ok(soft_reply(SUSPENDED_REPLY));
    }

    // Usage and context are independent reads.
    let today = Utc::now().date_naive();
    let (usage, context) = tokio::join!(
        state.store.usage_today(&req.client_id, today),
        load_context(
            state.store.as_ref(),
            &session_id,
            state.config.models.context_window
        ),
    );

    // A failed usage read counts as zero, matching a missing row. Two
    // in-flight requests can both pass this check before either increments;
    // that slack is accepted.
    let usage = usage.unwrap_or_else(|e| {
        tracing::warn!(error = %e, tenant_id = %tenant.id, "usage lookup failed, assuming zero");
        0
    });
    if usage >= tenant.daily_limit {
        tracing::info!(tenant_id = %tenant.id, usage, limit = tenant.daily_limit, "daily limit reached");
        return Ok(soft_reply(LIMIT_REPLY));
    }

    let credential = match state.credentials.select() {
        Ok(c) => c.to_string(),
        Err(e) => {
            return Err(AppError::ConfigError(anyhow::anyhow!(e)));
        }
    };
    let model = state.config.model_for_package(&tenant.package_type);
    let messages = build_messages(&tenant.name, &context, &req.message);

    let reply = match state
        .provider
        .complete(
            &credential,
            model,
            &messages,
            state.config.completion.temperature,
        )
        .await
    {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!(
                error = %e,
                tenant_id = %tenant.id,
                model,
                "upstream completion failed"
            );
            return Ok(soft_reply(UPSTREAM_APOLOGY));
        }
    };

    // The reply is final; persistence and alerting run detached so the
    // caller is not kept waiting. Failures are logged, never surfaced.
    let store = state.store.clone();
    let tenant_id = tenant.id.clone();
    let user_message = req.message.clone();
    let assistant_reply = reply.clone();
    let persist_session = session_id.clone();
    tokio::spawn(async move {
        let (appended, incremented) = tokio::join!(
            store.append_turns(&tenant_id, &persist_session, &user_message, &assistant_reply),
            store.increment_usage(&tenant_id),
        );
        if let Err(e) = appended {
            tracing::error!(error = %e, tenant_id, "failed to persist conversation turns");
        }
        if let Err(e) = incremented {
            tracing::error!(error = %e, tenant_id, "failed to increment usage");
        }
    });

    state.notifier.maybe_notify(&tenant, &req.message, &reply);

    Ok(Json(ChatResponse { reply }))
}

/// Fallback for non-POST methods on the chat route. OPTIONS preflight is
/// answered by the CORS layer before reaching this.
pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}
