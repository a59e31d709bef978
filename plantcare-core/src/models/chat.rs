// plantcare-core/src/models/chat.rs
use super::tools::{ActionPerformed, ToolInvocationRequest, ToolResult};
use serde::{Deserialize, Serialize};

/// Who produced a turn in the conversation.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
    Tool,
}

/// A single turn in the conversation history.
///
/// A model turn carries either `content` or a `tool_call`; a tool turn
/// carries the tool name and the result fed back to the model.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tool_call: Option<ToolInvocationRequest>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tool_result: Option<ToolResult>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tool_name: Option<String>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(text.into()),
            tool_call: None,
            tool_result: None,
            tool_name: None,
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            content: Some(text.into()),
            ..Self::user("")
        }
    }

    pub fn model_tool_call(request: ToolInvocationRequest) -> Self {
        Self {
            role: Role::Model,
            content: None,
            tool_call: Some(request),
            ..Self::user("")
        }
    }

    pub fn tool(name: impl Into<String>, result: ToolResult) -> Self {
        Self {
            role: Role::Tool,
            content: None,
            tool_call: None,
            tool_result: Some(result),
            tool_name: Some(name.into()),
        }
    }
}

/// What the provider returned for one request, before decoding.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub text: Option<String>,
    pub tool_call: Option<ToolInvocationRequest>,
}

/// Decoded model turn: either the final answer or a request to run a tool.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatTurnResult {
    FinalReply(String),
    ToolCall(ToolInvocationRequest),
}

/// The unit returned to the caller of the chat endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub reply: String,
    pub action_performed: Option<ActionPerformed>,
}

impl ChatReply {
    pub fn new(reply: impl Into<String>, action_performed: Option<ActionPerformed>) -> Self {
        Self {
            reply: reply.into(),
            action_performed,
        }
    }
}
