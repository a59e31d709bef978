// plantcare-core/src/tools/mod.rs

//! Server-side actions the model may call.
//!
//! A [`ToolRegistry`] is filled once at startup and shared read-only
//! afterwards. Execution always goes through the
//! [`dispatcher::ActionDispatcher`], which turns every failure into a
//! [`ToolResult::Failure`](crate::models::tools::ToolResult).

pub mod crops;
pub mod dispatcher;

use crate::errors::ToolError;
use crate::models::tools::ToolSpec;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A callable server-side action.
#[async_trait]
pub trait ToolAction: Send + Sync {
    /// Runs the action with arguments that already passed required-field
    /// validation. Returns the payload handed back to the model.
    async fn call(&self, arguments: Map<String, Value>) -> Result<Value, ToolError>;
}

struct RegisteredTool {
    spec: ToolSpec,
    action: Arc<dyn ToolAction>,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
    // Registration order, so specs are presented to the model stably.
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: ToolSpec, action: Arc<dyn ToolAction>) -> Result<(), ToolError> {
        if self.tools.contains_key(&spec.name) {
            return Err(ToolError::DuplicateTool(spec.name));
        }
        debug!(tool = %spec.name, "Registering tool");
        self.order.push(spec.name.clone());
        self.tools
            .insert(spec.name.clone(), RegisteredTool { spec, action });
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<(&ToolSpec, Arc<dyn ToolAction>), ToolError> {
        self.tools
            .get(name)
            .map(|t| (&t.spec, Arc::clone(&t.action)))
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| t.spec.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
