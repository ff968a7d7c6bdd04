//! End-to-end tests for the chat exchange pipeline, driven through the
//! router with mock collaborators.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use gateway_service::config::{
    CompletionConfig, GatewayConfig, ModelConfig, NotifierConfig, RepositoryConfig,
};
use gateway_service::models::{ChatMessage, Tenant, TurnRole};
use gateway_service::services::mock::{MockAlertSink, MockCompletionProvider, MockTenantStore};
use gateway_service::services::{CredentialPool, LeadDetector, LeadNotifier};
use gateway_service::startup::{build_router, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const PREMIUM_MODEL: &str = "openai/gpt-oss-120b";
const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

fn test_config() -> GatewayConfig {
    GatewayConfig {
        common: service_core::config::Config { port: 0 },
        repository: RepositoryConfig {
            base_url: "http://localhost:54321".to_string(),
            service_key: "test-service-key".to_string(),
        },
        completion: CompletionConfig {
            api_base: "http://localhost:9000".to_string(),
            api_keys: vec!["test-key".to_string()],
            timeout_secs: 5,
            temperature: 0.7,
        },
        models: ModelConfig {
            default_model: DEFAULT_MODEL.to_string(),
            premium_model: PREMIUM_MODEL.to_string(),
            premium_package: "Pro AI".to_string(),
            context_window: 6,
        },
        notifier: NotifierConfig {
            bot_token: "test-token".to_string(),
            lead_keywords: vec!["price".to_string(), "order_confirmed".to_string()],
        },
    }
}

fn tenant() -> Tenant {
    Tenant {
        id: "tenant-1".to_string(),
        name: "Acme Flowers".to_string(),
        status: "active".to_string(),
        package_type: "Starter".to_string(),
        daily_limit: 100,
        notification_chat_id: Some("chat-123".to_string()),
    }
}

fn test_state(
    store: Arc<MockTenantStore>,
    provider: Arc<MockCompletionProvider>,
    sink: Arc<MockAlertSink>,
    api_keys: Vec<String>,
) -> AppState {
    let config = test_config();
    let detector = LeadDetector::new(config.notifier.lead_keywords.clone());
    AppState {
        config: Arc::new(config),
        store,
        provider,
        credentials: CredentialPool::new(api_keys),
        notifier: LeadNotifier::new(detector, sink),
    }
}

async fn post_chat(state: AppState, body: Value) -> (StatusCode, Value) {
    let router = build_router(state);
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/chat")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

/// Wait for detached persistence/notification tasks to land.
async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..100 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("background work did not complete in time");
}

fn chat_body(message: &str) -> Value {
    json!({
        "client_id": "tenant-1",
        "session_id": "session-1",
        "message": message,
    })
}

#[tokio::test]
async fn missing_fields_are_rejected_with_400() {
    let store = Arc::new(MockTenantStore::new().with_tenant(tenant()));
    let provider = Arc::new(MockCompletionProvider::with_reply("hi"));
    let sink = Arc::new(MockAlertSink::new());
    let state = test_state(
        store,
        provider.clone(),
        sink,
        vec!["test-key".to_string()],
    );

    let (status, body) = post_chat(state, json!({ "client_id": "", "message": "" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid fields"));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn unknown_tenant_gets_suspension_reply_without_upstream_call() {
    let store = Arc::new(MockTenantStore::new());
    let provider = Arc::new(MockCompletionProvider::with_reply("hi"));
    let sink = Arc::new(MockAlertSink::new());
    let state = test_state(
        store,
        provider.clone(),
        sink,
        vec!["test-key".to_string()],
    );

    let (status, body) = post_chat(state, chat_body("hello")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["reply"].as_str().unwrap().contains("suspended"));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn suspended_tenant_gets_suspension_reply_without_upstream_call() {
    let mut suspended = tenant();
    suspended.status = "suspended".to_string();
    let store = Arc::new(MockTenantStore::new().with_tenant(suspended));
    let provider = Arc::new(MockCompletionProvider::with_reply("hi"));
    let sink = Arc::new(MockAlertSink::new());
    let state = test_state(
        store.clone(),
        provider.clone(),
        sink,
        vec!["test-key".to_string()],
    );

    let (status, body) = post_chat(state, chat_body("hello")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["reply"].as_str().unwrap().contains("suspended"));
    assert_eq!(provider.call_count(), 0);
    assert!(store.appended_turns().is_empty());
}

#[tokio::test]
async fn exhausted_quota_gets_limit_reply_without_upstream_call() {
    let store = Arc::new(MockTenantStore::new().with_tenant(tenant()).with_usage(100));
    let provider = Arc::new(MockCompletionProvider::with_reply("hi"));
    let sink = Arc::new(MockAlertSink::new());
    let state = test_state(
        store.clone(),
        provider.clone(),
        sink,
        vec!["test-key".to_string()],
    );

    let (status, body) = post_chat(state, chat_body("hello")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["reply"].as_str().unwrap().contains("daily message limit"));
    assert_eq!(provider.call_count(), 0);
    assert_eq!(store.increment_count(), 0);
}

#[tokio::test]
async fn successful_exchange_persists_turn_pair_and_increments_usage_once() {
    let store = Arc::new(MockTenantStore::new().with_tenant(tenant()));
    let provider = Arc::new(MockCompletionProvider::with_reply("Our roses are lovely."));
    let sink = Arc::new(MockAlertSink::new());
    let state = test_state(
        store.clone(),
        provider.clone(),
        sink,
        vec!["test-key".to_string()],
    );

    let (status, body) = post_chat(state, chat_body("Tell me about roses")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], "Our roses are lovely.");
    assert_eq!(provider.call_count(), 1);
    assert_eq!(provider.last_credential().as_deref(), Some("test-key"));
    // Empty session: prompt is just the system and user messages.
    assert_eq!(provider.last_messages().len(), 2);

    wait_until(|| store.appended_turns().len() == 2 && store.increment_count() == 1).await;

    let turns = store.appended_turns();
    assert_eq!(turns[0].role, TurnRole::User);
    assert_eq!(turns[0].content, "Tell me about roses");
    assert_eq!(turns[1].role, TurnRole::Assistant);
    // The persisted assistant turn is exactly the reply returned.
    assert_eq!(turns[1].content, body["reply"].as_str().unwrap());
    assert_eq!(turns[0].session_id, "session-1");
    assert_eq!(store.increment_count(), 1);
}

#[tokio::test]
async fn premium_package_routes_to_premium_model() {
    let mut premium = tenant();
    premium.package_type = "Pro AI".to_string();
    let store = Arc::new(MockTenantStore::new().with_tenant(premium));
    let provider = Arc::new(MockCompletionProvider::with_reply("hi"));
    let sink = Arc::new(MockAlertSink::new());
    let state = test_state(store, provider.clone(), sink, vec!["test-key".to_string()]);

    let (status, _) = post_chat(state, chat_body("hello")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(provider.last_model().as_deref(), Some(PREMIUM_MODEL));
}

#[tokio::test]
async fn standard_package_routes_to_default_model() {
    let store = Arc::new(MockTenantStore::new().with_tenant(tenant()));
    let provider = Arc::new(MockCompletionProvider::with_reply("hi"));
    let sink = Arc::new(MockAlertSink::new());
    let state = test_state(store, provider.clone(), sink, vec!["test-key".to_string()]);

    let (status, _) = post_chat(state, chat_body("hello")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(provider.last_model().as_deref(), Some(DEFAULT_MODEL));
}

#[tokio::test]
async fn upstream_failure_returns_soft_apology_with_no_side_effects() {
    let store = Arc::new(MockTenantStore::new().with_tenant(tenant()));
    let provider = Arc::new(MockCompletionProvider::failing());
    let sink = Arc::new(MockAlertSink::new());
    let state = test_state(
        store.clone(),
        provider.clone(),
        sink.clone(),
        vec!["test-key".to_string()],
    );

    let (status, body) = post_chat(state, chat_body("hello")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["reply"].as_str().unwrap().contains("try again"));
    assert_eq!(provider.call_count(), 1);

    // Give any stray background task a moment, then confirm nothing landed.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(store.appended_turns().is_empty());
    assert_eq!(store.increment_count(), 0);
    assert!(sink.sent_alerts().is_empty());
}

#[tokio::test]
async fn empty_credential_pool_is_a_configuration_error() {
    let store = Arc::new(MockTenantStore::new().with_tenant(tenant()));
    let provider = Arc::new(MockCompletionProvider::with_reply("hi"));
    let sink = Arc::new(MockAlertSink::new());
    let state = test_state(store, provider.clone(), sink, Vec::new());

    let (status, body) = post_chat(state, chat_body("hello")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Configuration error");
    // Failed before any upstream call.
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn lead_keyword_in_user_message_dispatches_alert() {
    let store = Arc::new(MockTenantStore::new().with_tenant(tenant()));
    let provider = Arc::new(MockCompletionProvider::with_reply("Happy to help."));
    let sink = Arc::new(MockAlertSink::new());
    let state = test_state(
        store,
        provider,
        sink.clone(),
        vec!["test-key".to_string()],
    );

    let (status, _) = post_chat(state, chat_body("What's the PRICE?")).await;

    assert_eq!(status, StatusCode::OK);
    wait_until(|| !sink.sent_alerts().is_empty()).await;

    let alerts = sink.sent_alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].0, "chat-123");
    assert!(alerts[0].1.contains("Acme Flowers"));
    assert!(alerts[0].1.contains("What's the PRICE?"));
}

#[tokio::test]
async fn ordinary_exchange_dispatches_no_alert() {
    let store = Arc::new(MockTenantStore::new().with_tenant(tenant()));
    let provider = Arc::new(MockCompletionProvider::with_reply("Good morning!"));
    let sink = Arc::new(MockAlertSink::new());
    let state = test_state(
        store.clone(),
        provider,
        sink.clone(),
        vec!["test-key".to_string()],
    );

    let (status, _) = post_chat(state, chat_body("hello there")).await;

    assert_eq!(status, StatusCode::OK);
    wait_until(|| store.appended_turns().len() == 2).await;
    assert!(sink.sent_alerts().is_empty());
}

#[tokio::test]
async fn failing_alert_sink_affects_neither_response_nor_persistence() {
    let store = Arc::new(MockTenantStore::new().with_tenant(tenant()));
    let provider = Arc::new(MockCompletionProvider::with_reply("The price is 500."));
    let sink = Arc::new(MockAlertSink::failing());
    let state = test_state(
        store.clone(),
        provider,
        sink,
        vec!["test-key".to_string()],
    );

    let (status, body) = post_chat(state, chat_body("price?")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], "The price is 500.");
    wait_until(|| store.appended_turns().len() == 2 && store.increment_count() == 1).await;
}

#[tokio::test]
async fn failing_persistence_never_affects_the_response() {
    let store = Arc::new(
        MockTenantStore::new()
            .with_tenant(tenant())
            .failing_writes(),
    );
    let provider = Arc::new(MockCompletionProvider::with_reply("Here you go."));
    let sink = Arc::new(MockAlertSink::new());
    let state = test_state(
        store.clone(),
        provider.clone(),
        sink,
        vec!["test-key".to_string()],
    );

    let (status, body) = post_chat(state, chat_body("hello")).await;

    // The caller already has its answer; write failures stay in the logs.
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], "Here you go.");
    assert_eq!(provider.call_count(), 1);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(store.appended_turns().is_empty());
    assert_eq!(store.increment_count(), 0);
}

#[tokio::test]
async fn context_window_trims_and_reorders_history() {
    // Repository order: newest first.
    let history: Vec<ChatMessage> = (0..10)
        .rev()
        .map(|i| ChatMessage::user(format!("turn {}", i)))
        .collect();
    let store = Arc::new(
        MockTenantStore::new()
            .with_tenant(tenant())
            .with_history(history),
    );
    let provider = Arc::new(MockCompletionProvider::with_reply("ok"));
    let sink = Arc::new(MockAlertSink::new());
    let state = test_state(store, provider.clone(), sink, vec!["test-key".to_string()]);

    let (status, _) = post_chat(state, chat_body("current")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(provider.call_count(), 1);

    // System message, six context turns oldest-to-newest, current message.
    let messages = provider.last_messages();
    assert_eq!(messages.len(), 8);
    assert_eq!(messages[0].role, "system");
    let context: Vec<&str> = messages[1..7].iter().map(|m| m.content.as_str()).collect();
    assert_eq!(
        context,
        vec!["turn 4", "turn 5", "turn 6", "turn 7", "turn 8", "turn 9"]
    );
    assert_eq!(messages[7].content, "current");
}

#[tokio::test]
async fn non_post_methods_get_405() {
    let store = Arc::new(MockTenantStore::new().with_tenant(tenant()));
    let provider = Arc::new(MockCompletionProvider::with_reply("hi"));
    let sink = Arc::new(MockAlertSink::new());
    let state = test_state(store, provider, sink, vec!["test-key".to_string()]);

    let router = build_router(state);
    let response = router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/chat")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "Method not allowed");
}
