// plantcare-core/src/tools/dispatcher.rs
use super::ToolRegistry;
use crate::errors::ToolError;
use crate::models::tools::{ActionPerformed, ToolInvocationRequest, ToolResult, ToolSpec};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Result of one [`ActionDispatcher::invoke`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub result: ToolResult,
    /// Side effect committed by the tool. Only set when it succeeded.
    pub action: Option<ActionPerformed>,
}

impl Dispatch {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            result: ToolResult::Failure(message.into()),
            action: None,
        }
    }
}

/// Executes model-requested tools. Nothing raised by an action escapes
/// `invoke`: unknown names, bad arguments, errors, panics and timeouts all
/// come back as [`ToolResult::Failure`].
#[derive(Clone)]
pub struct ActionDispatcher {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ActionDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.registry.specs()
    }

    pub async fn invoke(&self, request: &ToolInvocationRequest) -> Dispatch {
        let tool_name = request.name.as_str();
        debug!(tool_name = %tool_name, "Dispatching tool call");
        let raw_arguments = Value::Object(request.arguments.clone());
        trace!(arguments = %raw_arguments, "Raw arguments for '{}'", tool_name);

        let (spec, action) = match self.registry.resolve(tool_name) {
            Ok(found) => found,
            Err(e) => {
                warn!(tool_name = %tool_name, "Model requested an unknown tool");
                return Dispatch::failure(e.to_string());
            }
        };

        if let Err(e) = validate_arguments(spec, &request.arguments) {
            warn!(tool_name = %tool_name, error = %e, "Rejected tool arguments");
            return Dispatch::failure(e.to_string());
        }

        let effect = spec.effect;
        let arguments = request.arguments.clone();
        // Run on its own task so a panicking action is observed as a JoinError.
        let mut handle = tokio::spawn(async move { action.call(arguments).await });

        match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(Ok(Ok(value))) => {
                info!(tool_name = %tool_name, "Tool executed successfully.");
                trace!(output = %value, "Output from tool '{}'", tool_name);
                Dispatch {
                    result: ToolResult::Success(value),
                    action: effect,
                }
            }
            Ok(Ok(Err(e))) => {
                warn!(tool_name = %tool_name, error = %e, "Tool returned an error");
                Dispatch::failure(e.to_string())
            }
            Ok(Err(join_error)) => {
                error!(tool_name = %tool_name, error = %join_error, "Tool task aborted");
                Dispatch::failure(format!("tool '{}' failed unexpectedly", tool_name))
            }
            Err(_) => {
                handle.abort();
                error!(tool_name = %tool_name, timeout = ?self.timeout, "Tool timed out");
                Dispatch::failure(format!(
                    "tool '{}' timed out after {}s",
                    tool_name,
                    self.timeout.as_secs_f32()
                ))
            }
        }
    }
}

/// Required parameters must be present and non-null. Unknown fields are ignored.
fn validate_arguments(spec: &ToolSpec, arguments: &Map<String, Value>) -> Result<(), ToolError> {
    for name in spec.required_params() {
        match arguments.get(name) {
            None | Some(Value::Null) => {
                return Err(ToolError::invalid_arguments(
                    &spec.name,
                    format!("missing required argument '{}'", name),
                ))
            }
            Some(_) => {}
        }
    }
    Ok(())
}
