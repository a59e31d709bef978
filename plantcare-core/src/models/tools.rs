// plantcare-core/src/models/tools.rs
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};

// --- Tool declaration ---

/// Represents the type of a tool parameter.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolParameterType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

/// Defines a single parameter within a tool's schema.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ToolParameterType,
    pub description: String,
    #[serde(default)]
    pub required: bool,
    /// Element type when `param_type` is `Array`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<ToolParameterType>,
}

impl ToolParameter {
    pub fn required(name: &str, param_type: ToolParameterType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            required: true,
            items: None,
        }
    }

    pub fn optional(name: &str, param_type: ToolParameterType, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    pub fn with_items(mut self, items: ToolParameterType) -> Self {
        self.items = Some(items);
        self
    }
}

/// Side effect a tool has on the outside world, reported to the caller.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActionPerformed {
    Create,
}

/// Declares a tool that can be presented to the model.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// Parameters in declaration order.
    #[serde(default)]
    pub parameters: Vec<ToolParameter>,
    /// Set for tools that mutate external state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<ActionPerformed>,
}

impl ToolSpec {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: Vec::new(),
            effect: None,
        }
    }

    pub fn param(mut self, parameter: ToolParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn mutating(mut self, effect: ActionPerformed) -> Self {
        self.effect = Some(effect);
        self
    }

    pub fn required_params(&self) -> impl Iterator<Item = &str> {
        self.parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
    }

    /// JSON schema object for the parameters, in declaration order.
    pub fn parameters_schema(&self) -> JsonValue {
        let mut properties = Map::new();
        for param in &self.parameters {
            let mut prop = json!({
                "type": param.param_type,
                "description": param.description,
            });
            if let Some(items) = param.items {
                prop["items"] = json!({ "type": items });
            }
            properties.insert(param.name.clone(), prop);
        }
        let required: Vec<&str> = self.required_params().collect();
        let mut schema = json!({
            "type": "object",
            "properties": properties,
        });
        if !required.is_empty() {
            schema["required"] = json!(required);
        }
        schema
    }
}

// --- Runtime structures ---

/// A tool call requested by the model.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolInvocationRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, JsonValue>,
}

impl ToolInvocationRequest {
    pub fn new(name: impl Into<String>, arguments: JsonValue) -> Self {
        let arguments = match arguments {
            JsonValue::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Outcome of a single tool execution.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ToolResult {
    Success(JsonValue),
    Failure(String),
}

impl ToolResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolResult::Success(_))
    }

    /// Payload handed back to the model as the function response.
    pub fn to_response(&self) -> JsonValue {
        match self {
            ToolResult::Success(value) => json!({ "result": value }),
            ToolResult::Failure(message) => json!({ "error": message }),
        }
    }
}
