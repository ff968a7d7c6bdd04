//! Rolling conversation context assembly.

use super::repository::TenantStore;
use crate::models::ChatMessage;

/// Load the most recent `limit` turns of a session in chronological order.
///
/// The repository returns turns newest first; we reverse before handing
/// them to the prompt builder. An empty session yields an empty sequence,
/// and a failed read degrades to an empty context rather than failing the
/// exchange.
pub async fn load_context(
    store: &dyn TenantStore,
    session_id: &str,
    limit: usize,
) -> Vec<ChatMessage> {
    match store.recent_turns(session_id, limit).await {
        Ok(mut turns) => {
            turns.reverse();
            turns
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                session_id,
                "failed to load conversation context, continuing without it"
            );
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mock::MockTenantStore;

    #[tokio::test]
    async fn returns_most_recent_turns_in_chronological_order() {
        // Ten turns, newest first as the repository would return them.
        let history: Vec<ChatMessage> = (0..10)
            .rev()
            .map(|i| ChatMessage::user(format!("message {}", i)))
            .collect();
        let store = MockTenantStore::new().with_history(history);

        let context = load_context(&store, "session-1", 6).await;

        assert_eq!(context.len(), 6);
        // Oldest of the window first, newest last.
        let contents: Vec<&str> = context.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                "message 4",
                "message 5",
                "message 6",
                "message 7",
                "message 8",
                "message 9"
            ]
        );
    }

    #[tokio::test]
    async fn empty_session_yields_empty_context() {
        let store = MockTenantStore::new();
        let context = load_context(&store, "session-1", 6).await;
        assert!(context.is_empty());
    }

    #[tokio::test]
    async fn read_failure_degrades_to_empty_context() {
        let store = MockTenantStore::new().failing_reads();
        let context = load_context(&store, "session-1", 6).await;
        assert!(context.is_empty());
    }
}
