// plantcare-core/src/conversation.rs

//! The tool-calling conversation loop and the chat service around it.

use crate::config::ChatConfig;
use crate::errors::{ChatError, ValidationError};
use crate::models::chat::{ChatReply, ChatTurnResult};
use crate::models::tools::ActionPerformed;
use crate::providers::Provider;
use crate::session::{ChatSession, SessionStore, SessionTemplate};
use crate::tools::dispatcher::ActionDispatcher;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, info, trace, warn};

/// Where a turn currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingUserInput,
    ModelThinking,
    ToolRequested,
    ToolExecuting,
    ReplyReady,
    Failed,
}

/// Drives one user turn: send the message, run requested tools one at a
/// time and feed their results back until the model answers with text.
pub struct ConversationLoop {
    dispatcher: ActionDispatcher,
    max_tool_iterations: usize,
}

impl ConversationLoop {
    pub fn new(dispatcher: ActionDispatcher, max_tool_iterations: usize) -> Self {
        Self {
            dispatcher,
            max_tool_iterations,
        }
    }

    pub fn dispatcher(&self) -> &ActionDispatcher {
        &self.dispatcher
    }

    /// Runs one user turn. On failure the returned [`TurnError`] still
    /// reports any effect a tool committed before the turn broke down.
    pub async fn run_turn(&self, session: &mut ChatSession, message: &str) -> Result<ChatReply, TurnError> {
        if message.trim().is_empty() {
            return Err(TurnError::new(
                ValidationError::new("'message' must not be empty").into(),
                None,
            ));
        }

        let session_id = session.id().to_string();
        let mut state = LoopState::AwaitingUserInput;
        let mut action_performed: Option<ActionPerformed> = None;
        let mut tool_executions = 0usize;

        advance(&mut state, LoopState::ModelThinking, &session_id);
        let mut turn = match session.send(message).await {
            Ok(turn) => turn,
            Err(e) => {
                advance(&mut state, LoopState::Failed, &session_id);
                return Err(TurnError::new(e.into(), action_performed));
            }
        };

        loop {
            let request = match turn {
                ChatTurnResult::FinalReply(text) => {
                    advance(&mut state, LoopState::ReplyReady, &session_id);
                    info!(session_id = %session_id, tool_executions, ?action_performed, "Turn finished");
                    return Ok(ChatReply::new(text, action_performed));
                }
                ChatTurnResult::ToolCall(request) => request,
            };

            advance(&mut state, LoopState::ToolRequested, &session_id);
            if tool_executions >= self.max_tool_iterations {
                advance(&mut state, LoopState::Failed, &session_id);
                error!(
                    session_id = %session_id,
                    limit = self.max_tool_iterations,
                    tool_name = %request.name,
                    "Model kept requesting tools past the limit"
                );
                return Err(TurnError::new(
                    ChatError::ToolLimit(self.max_tool_iterations),
                    action_performed,
                ));
            }
            tool_executions += 1;

            advance(&mut state, LoopState::ToolExecuting, &session_id);
            let dispatch = self.dispatcher.invoke(&request).await;
            if dispatch.action.is_some() {
                action_performed = dispatch.action;
            }

            advance(&mut state, LoopState::ModelThinking, &session_id);
            turn = match session.send_tool_result(&request.name, dispatch.result).await {
                Ok(turn) => turn,
                Err(e) => {
                    advance(&mut state, LoopState::Failed, &session_id);
                    return Err(TurnError::new(e.into(), action_performed));
                }
            };
        }
    }
}

/// A failed turn. Store writes are not rolled back, so the effect of any
/// tool that succeeded before the failure is carried along.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct TurnError {
    #[source]
    pub error: ChatError,
    pub action_performed: Option<ActionPerformed>,
}

impl TurnError {
    fn new(error: ChatError, action_performed: Option<ActionPerformed>) -> Self {
        Self {
            error,
            action_performed,
        }
    }
}

fn advance(state: &mut LoopState, next: LoopState, session_id: &str) {
    trace!(session_id = %session_id, from = ?state, to = ?next, "Loop transition");
    *state = next;
}

/// Entry point for the chat endpoint. Owns the session store and converts
/// every failed turn into the fallback reply.
pub struct ChatService {
    sessions: SessionStore,
    conversation: ConversationLoop,
    fallback_reply: String,
}

impl ChatService {
    pub fn new(
        provider: Arc<dyn Provider>,
        system_prompt: &str,
        dispatcher: ActionDispatcher,
        config: &ChatConfig,
    ) -> Self {
        let template = SessionTemplate::new(provider, system_prompt, dispatcher.specs());
        Self {
            sessions: SessionStore::new(
                template,
                Duration::from_secs(config.session_ttl_secs),
                config.max_sessions,
            ),
            conversation: ConversationLoop::new(dispatcher, config.max_tool_iterations),
            fallback_reply: config.fallback_reply.clone(),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Runs one turn. Only an empty message is an error; provider failures
    /// and the tool limit produce the fallback reply, and a keyed session
    /// that failed is discarded so the next message starts fresh.
    pub async fn handle_message(
        &self,
        session_key: Option<&str>,
        message: &str,
    ) -> Result<ChatReply, ValidationError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ValidationError::new("'message' must not be empty"));
        }

        match session_key {
            Some(key) => {
                let mut session = self.lock_session(key).await;
                debug!(session_key = %key, session_id = %session.id(), "Handling chat message");
                match self.conversation.run_turn(&mut session, message).await {
                    Ok(reply) => Ok(reply),
                    Err(e) => {
                        session.reset();
                        self.sessions.discard(key).await;
                        self.fallback(e)
                    }
                }
            }
            None => {
                let mut session = self.sessions.ephemeral();
                debug!(session_id = %session.id(), "Handling chat message without a session key");
                match self.conversation.run_turn(&mut session, message).await {
                    Ok(reply) => Ok(reply),
                    Err(e) => self.fallback(e),
                }
            }
        }
    }

    /// Locks the session stored under `key`. A session discarded by a failed
    /// turn while we waited for its lock is skipped and the lookup retried.
    async fn lock_session(&self, key: &str) -> OwnedMutexGuard<ChatSession> {
        loop {
            let session = self.sessions.get_or_create(key).await;
            let guard = Arc::clone(&session).lock_owned().await;
            if self.sessions.holds(key, &session).await {
                return guard;
            }
            debug!(session_key = %key, "Session was discarded while waiting, reopening");
        }
    }

    fn fallback(&self, failure: TurnError) -> Result<ChatReply, ValidationError> {
        match failure.error {
            ChatError::Validation(e) => Err(e),
            other => {
                warn!(
                    error = %other,
                    action_performed = ?failure.action_performed,
                    "Chat turn failed, answering with fallback reply"
                );
                Ok(ChatReply::new(
                    self.fallback_reply.clone(),
                    failure.action_performed,
                ))
            }
        }
    }
}
