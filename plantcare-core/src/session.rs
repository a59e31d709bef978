// plantcare-core/src/session.rs

//! Chat sessions and the keyed store that owns them.

use crate::errors::ProviderError;
use crate::models::chat::{ChatMessage, ChatTurnResult, ModelResponse};
use crate::models::tools::{ToolResult, ToolSpec};
use crate::providers::Provider;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Everything a new session needs: the provider, the system instruction and
/// the tool specs advertised to the model.
#[derive(Clone)]
pub struct SessionTemplate {
    provider: Arc<dyn Provider>,
    system_instruction: Arc<str>,
    tools: Arc<[ToolSpec]>,
}

impl SessionTemplate {
    pub fn new(provider: Arc<dyn Provider>, system_instruction: &str, tools: Vec<ToolSpec>) -> Self {
        Self {
            provider,
            system_instruction: Arc::from(system_instruction),
            tools: Arc::from(tools),
        }
    }

    pub fn open(&self) -> ChatSession {
        ChatSession {
            id: Uuid::new_v4().to_string(),
            template: self.clone(),
            history: Vec::new(),
        }
    }
}

/// Conversation state with the remote model.
///
/// `send` and `send_tool_result` are the only ways history grows. Each
/// successful call appends the outgoing turn and the model's answer; a
/// failed call leaves history untouched.
pub struct ChatSession {
    id: String,
    template: SessionTemplate,
    history: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub async fn send(&mut self, text: &str) -> Result<ChatTurnResult, ProviderError> {
        self.exchange(ChatMessage::user(text)).await
    }

    pub async fn send_tool_result(
        &mut self,
        tool_name: &str,
        result: ToolResult,
    ) -> Result<ChatTurnResult, ProviderError> {
        self.exchange(ChatMessage::tool(tool_name, result)).await
    }

    pub fn reset(&mut self) {
        debug!(session_id = %self.id, turns = self.history.len(), "Resetting chat session");
        self.history.clear();
    }

    async fn exchange(&mut self, outgoing: ChatMessage) -> Result<ChatTurnResult, ProviderError> {
        self.history.push(outgoing);
        let template = &self.template;
        let response = template
            .provider
            .generate(&template.system_instruction, &self.history, &template.tools)
            .await
            .and_then(decode_response);

        let turn = match response {
            Ok(turn) => turn,
            Err(e) => {
                self.history.pop();
                return Err(e);
            }
        };

        match &turn {
            ChatTurnResult::FinalReply(text) => {
                self.history.push(ChatMessage::model_text(text.clone()))
            }
            ChatTurnResult::ToolCall(request) => {
                self.history.push(ChatMessage::model_tool_call(request.clone()))
            }
        }
        trace!(session_id = %self.id, turns = self.history.len(), "Session history updated");
        Ok(turn)
    }
}

/// A function call wins over accompanying text.
fn decode_response(response: ModelResponse) -> Result<ChatTurnResult, ProviderError> {
    match response {
        ModelResponse {
            tool_call: Some(request),
            text,
        } => {
            if let Some(text) = text {
                debug!(text = %text, "Dropping text that accompanied a function call");
            }
            Ok(ChatTurnResult::ToolCall(request))
        }
        ModelResponse {
            text: Some(text),
            tool_call: None,
        } if !text.trim().is_empty() => Ok(ChatTurnResult::FinalReply(text)),
        _ => Err(ProviderError::Malformed(
            "model returned neither text nor a function call".to_string(),
        )),
    }
}

struct SessionEntry {
    session: Arc<Mutex<ChatSession>>,
    last_used: Instant,
}

/// Sessions keyed by caller-supplied id. Entries are created lazily, expire
/// after `ttl` without use, and the least recently used one is evicted when
/// `max_sessions` is reached.
pub struct SessionStore {
    template: SessionTemplate,
    sessions: Mutex<HashMap<String, SessionEntry>>,
    ttl: Duration,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(template: SessionTemplate, ttl: Duration, max_sessions: usize) -> Self {
        Self {
            template,
            sessions: Mutex::new(HashMap::new()),
            ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    /// A session that belongs to no key and is dropped by the caller.
    pub fn ephemeral(&self) -> ChatSession {
        self.template.open()
    }

    pub async fn get_or_create(&self, key: &str) -> Arc<Mutex<ChatSession>> {
        let mut sessions = self.sessions.lock().await;
        let now = Instant::now();

        let before = sessions.len();
        sessions.retain(|_, entry| now.duration_since(entry.last_used) < self.ttl);
        if sessions.len() < before {
            debug!(expired = before - sessions.len(), "Purged idle chat sessions");
        }

        if let Some(entry) = sessions.get_mut(key) {
            entry.last_used = now;
            return Arc::clone(&entry.session);
        }

        if sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                warn!(session_key = %oldest, limit = self.max_sessions, "Session limit reached, evicting oldest");
                sessions.remove(&oldest);
            }
        }

        let session = Arc::new(Mutex::new(self.template.open()));
        info!(session_key = %key, "Opened chat session");
        sessions.insert(
            key.to_string(),
            SessionEntry {
                session: Arc::clone(&session),
                last_used: now,
            },
        );
        session
    }

    /// Whether `key` still maps to `session`, i.e. it was neither discarded
    /// nor replaced since it was handed out.
    pub async fn holds(&self, key: &str, session: &Arc<Mutex<ChatSession>>) -> bool {
        self.sessions
            .lock()
            .await
            .get(key)
            .map_or(false, |entry| Arc::ptr_eq(&entry.session, session))
    }

    pub async fn discard(&self, key: &str) {
        if self.sessions.lock().await.remove(key).is_some() {
            info!(session_key = %key, "Discarded chat session");
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Role;
    use crate::models::tools::ToolInvocationRequest;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;

    /// Replays canned responses and records the history length it saw.
    struct Canned {
        responses: std::sync::Mutex<VecDeque<Result<ModelResponse, ProviderError>>>,
        seen_turns: std::sync::Mutex<Vec<usize>>,
    }

    impl Canned {
        fn new(responses: Vec<Result<ModelResponse, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: std::sync::Mutex::new(responses.into()),
                seen_turns: std::sync::Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Provider for Canned {
        async fn generate(
            &self,
            _system_instruction: &str,
            history: &[ChatMessage],
            _tools: &[ToolSpec],
        ) -> Result<ModelResponse, ProviderError> {
            self.seen_turns.lock().unwrap().push(history.len());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::Malformed("script exhausted".into())))
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    fn text(t: &str) -> Result<ModelResponse, ProviderError> {
        Ok(ModelResponse {
            text: Some(t.to_string()),
            tool_call: None,
        })
    }

    fn call(name: &str) -> Result<ModelResponse, ProviderError> {
        Ok(ModelResponse {
            text: None,
            tool_call: Some(ToolInvocationRequest::new(name, json!({}))),
        })
    }

    fn template(provider: Arc<Canned>) -> SessionTemplate {
        SessionTemplate::new(provider, "Eres PlantCare", Vec::new())
    }

    #[tokio::test]
    async fn test_send_appends_both_turns() {
        let provider = Canned::new(vec![call("get_cultivos_internal"), text("No tienes cultivos.")]);
        let mut session = template(provider.clone()).open();

        let turn = session.send("muéstrame mis cultivos").await.unwrap();
        assert!(matches!(turn, ChatTurnResult::ToolCall(ref r) if r.name == "get_cultivos_internal"));
        assert_eq!(session.history().len(), 2);

        let turn = session
            .send_tool_result("get_cultivos_internal", ToolResult::Success(json!([])))
            .await
            .unwrap();
        assert_eq!(turn, ChatTurnResult::FinalReply("No tienes cultivos.".into()));

        let roles: Vec<Role> = session.history().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Model, Role::Tool, Role::Model]);
        assert_eq!(*provider.seen_turns.lock().unwrap(), vec![1, 3]);
    }

    #[tokio::test]
    async fn test_failed_exchange_leaves_history_untouched() {
        let provider = Canned::new(vec![
            text("hola"),
            Err(ProviderError::Api(anyhow::anyhow!("503"))),
        ]);
        let mut session = template(provider).open();
        session.send("hola").await.unwrap();
        assert!(session.send("¿sigues ahí?").await.is_err());
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_response_is_provider_error() {
        let provider = Canned::new(vec![Ok(ModelResponse::default()), text("   ")]);
        let mut session = template(provider).open();
        assert!(matches!(
            session.send("hola").await,
            Err(ProviderError::Malformed(_))
        ));
        assert!(matches!(
            session.send("hola").await,
            Err(ProviderError::Malformed(_))
        ));
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_tool_call_wins_over_text() {
        let provider = Canned::new(vec![Ok(ModelResponse {
            text: Some("Voy a mirar".into()),
            tool_call: Some(ToolInvocationRequest::new("get_cultivos_internal", json!({}))),
        })]);
        let mut session = template(provider).open();
        let turn = session.send("hola").await.unwrap();
        assert!(matches!(turn, ChatTurnResult::ToolCall(_)));
    }

    #[tokio::test]
    async fn test_reset_clears_history() {
        let mut session = template(Canned::new(vec![text("hola")])).open();
        session.send("hola").await.unwrap();
        session.reset();
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_store_reuses_session_per_key() {
        let store = SessionStore::new(template(Canned::new(vec![])), Duration::from_secs(60), 10);
        let a1 = store.get_or_create("a").await;
        let a2 = store.get_or_create("a").await;
        let b = store.get_or_create("b").await;
        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b));
        assert_eq!(store.len().await, 2);

        assert!(store.holds("a", &a1).await);
        assert!(!store.holds("a", &b).await);

        store.discard("a").await;
        assert!(!store.holds("a", &a1).await);
        let a3 = store.get_or_create("a").await;
        assert!(!Arc::ptr_eq(&a1, &a3));
        assert!(!store.holds("a", &a1).await);
        assert!(store.holds("a", &a3).await);
    }

    #[tokio::test]
    async fn test_store_expires_idle_sessions() {
        let store = SessionStore::new(template(Canned::new(vec![])), Duration::from_millis(50), 10);
        let first = store.get_or_create("a").await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        let second = store.get_or_create("a").await;
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_store_evicts_least_recently_used() {
        let store = SessionStore::new(template(Canned::new(vec![])), Duration::from_secs(60), 2);
        let a = store.get_or_create("a").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let b = store.get_or_create("b").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.get_or_create("a").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.get_or_create("c").await;

        assert_eq!(store.len().await, 2);
        assert!(Arc::ptr_eq(&a, &store.get_or_create("a").await));
        assert!(!Arc::ptr_eq(&b, &store.get_or_create("b").await));
    }
}
