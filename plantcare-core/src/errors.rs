// plantcare-core/src/errors.rs
use thiserror::Error;

/// Rejected caller input. Raised before any collaborator is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Validation Error: {0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(msg: impl Into<String>) -> Self {
        ValidationError(msg.into())
    }
}

/// Errors raised by the tool registry and by individual tool actions.
#[derive(Error, Debug)]
pub enum ToolError {
    /// A tool with the same name was registered twice.
    #[error("duplicate tool: {0}")]
    DuplicateTool(String),

    /// The model asked for a tool that is not registered.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// The arguments sent by the model do not satisfy the tool's schema.
    #[error("invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// The action itself failed.
    #[error("tool '{tool}' failed: {message}")]
    Execution { tool: String, message: String },
}

impl ToolError {
    pub fn invalid_arguments(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        ToolError::InvalidArguments {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    pub fn execution(tool: impl Into<String>, message: impl Into<String>) -> Self {
        ToolError::Execution {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Errors from the remote model provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Transport failure or non-success HTTP status.
    #[error("API Error: {0}")]
    Api(#[source] anyhow::Error),

    /// The provider refused to answer (safety block, unusual finish reason).
    #[error("Blocked: {0}")]
    Blocked(String),

    /// The response could not be decoded into text or a function call.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Errors from the backing entity store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("Store unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("Store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The store answered with a body we could not decode.
    #[error("Store returned an unexpected payload: {0}")]
    Decode(String),

    /// A stored record does not match the expected crop shape.
    #[error("Invalid record: {0}")]
    InvalidRecord(#[from] serde_json::Error),
}

/// Errors that terminate a conversation turn.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The model kept requesting tools past the configured bound.
    #[error("Tool-call limit of {0} reached without a final reply")]
    ToolLimit(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_messages() {
        assert_eq!(
            ToolError::UnknownTool("borrar_todo".into()).to_string(),
            "unknown tool: borrar_todo"
        );
        assert_eq!(
            ToolError::invalid_arguments("create_cultivo_internal", "missing 'nombre'").to_string(),
            "invalid arguments for tool 'create_cultivo_internal': missing 'nombre'"
        );
    }

    #[test]
    fn test_chat_error_wraps_validation() {
        let err: ChatError = ValidationError::new("message must not be empty").into();
        assert_eq!(err.to_string(), "Validation Error: message must not be empty");
    }
}
