// plantcare-core/src/providers/gemini.rs
use super::Provider;
use crate::config::ModelConfig;
use crate::errors::ProviderError;
use crate::models::chat::{ChatMessage, ModelResponse, Role};
use crate::models::tools::{ToolInvocationRequest, ToolSpec};
use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, trace, warn};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const ACCEPTED_FINISH_REASONS: [&str; 2] = ["STOP", "MAX_TOKENS"];
const MAX_BACKOFF: Duration = Duration::from_secs(60);
const BACKOFF_FACTOR: f64 = 2.0;

#[derive(Clone)]
pub struct GeminiProvider {
    config: ModelConfig,
    http_client: Client,
    api_key: String,
}

impl GeminiProvider {
    pub fn new(config: ModelConfig, http_client: Client, api_key: String) -> Self {
        Self {
            config,
            http_client,
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        let base = self
            .config
            .endpoint
            .as_deref()
            .unwrap_or(DEFAULT_GEMINI_BASE_URL)
            .trim_end_matches('/');
        format!("{}/{}:generateContent", base, self.config.model_name)
    }

    /// Builds the `generateContent` request body.
    pub fn build_payload(
        &self,
        system_instruction: &str,
        history: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<Value, ProviderError> {
        let contents: Vec<Value> = history.iter().filter_map(message_to_content).collect();
        let mut payload = json!({ "contents": contents });

        if !system_instruction.trim().is_empty() {
            payload["systemInstruction"] = json!({ "parts": [{ "text": system_instruction }] });
        }

        if !tools.is_empty() {
            let declarations: Vec<Value> = tools
                .iter()
                .map(|tool| {
                    let mut declaration = json!({
                        "name": tool.name,
                        "description": tool.description,
                    });
                    // Gemini rejects an object schema with no properties.
                    if !tool.parameters.is_empty() {
                        declaration["parameters"] = tool.parameters_schema();
                    }
                    declaration
                })
                .collect();
            payload["tools"] = json!([{ "functionDeclarations": declarations }]);
        }

        if let Some(parameters) = &self.config.parameters {
            let generation_config = serde_json::to_value(parameters).map_err(|e| {
                ProviderError::Api(anyhow!(e).context("Failed to convert model parameters to JSON"))
            })?;
            payload["generationConfig"] = generation_config;
        }

        Ok(payload)
    }

    async fn post_with_retry(&self, url: &str, payload: &Value) -> Result<String, ProviderError> {
        let max_retries = self.config.max_retries;
        let mut retries = 0;
        let mut current_delay = Duration::from_millis(self.config.initial_backoff_ms);

        loop {
            let response_result = self
                .http_client
                .post(url)
                .header("x-goog-api-key", &self.api_key)
                .json(payload)
                .send()
                .await;

            let response = match response_result {
                Ok(resp) => resp,
                Err(e) => {
                    if retries < max_retries {
                        retries += 1;
                        warn!(
                            "Network error sending request: {}. Retrying in {:?} (attempt {}/{})",
                            e, current_delay, retries, max_retries
                        );
                        tokio::time::sleep(current_delay).await;
                        current_delay = next_delay(current_delay);
                        continue;
                    }
                    error!(error = %e, retries, "Gemini request failed");
                    return Err(ProviderError::Api(
                        anyhow::Error::new(e)
                            .context(format!("Network error after {} retries", retries)),
                    ));
                }
            };

            let status = response.status();

            if (status.as_u16() == 429 || status.is_server_error()) && retries < max_retries {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(Duration::from_secs);

                let wait_time = retry_after.unwrap_or(current_delay).min(MAX_BACKOFF);
                retries += 1;
                warn!(
                    "API request failed with status {}. Retrying in {:?} (attempt {}/{})",
                    status, wait_time, retries, max_retries
                );
                tokio::time::sleep(wait_time).await;
                current_delay = next_delay(current_delay);
                continue;
            }

            let body = response.text().await.map_err(|e| {
                ProviderError::Api(anyhow::Error::new(e).context("Failed to read Gemini response body"))
            })?;

            if !status.is_success() {
                error!(status = %status, body = %body, "Gemini API returned an error");
                return Err(ProviderError::Api(anyhow!("API error: {} - {}", status, body)));
            }

            return Ok(body);
        }
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    async fn generate(
        &self,
        system_instruction: &str,
        history: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<ModelResponse, ProviderError> {
        trace!("Entering GeminiProvider::generate");
        let url = self.endpoint();
        let payload = self.build_payload(system_instruction, history, tools)?;
        debug!(url = %url, turns = history.len(), tools = tools.len(), "Sending request to Gemini");
        trace!(payload = %payload, "Gemini request body");

        let body = self.post_with_retry(&url, &payload).await?;
        trace!(body = %body, "Gemini response body");
        parse_response(&body)
    }

    fn name(&self) -> &str {
        &self.config.model_name
    }
}

fn next_delay(current: Duration) -> Duration {
    std::cmp::min(
        Duration::from_secs_f64(current.as_secs_f64() * BACKOFF_FACTOR),
        MAX_BACKOFF,
    )
}

fn message_to_content(message: &ChatMessage) -> Option<Value> {
    match message.role {
        Role::User => message
            .content
            .as_ref()
            .map(|text| json!({ "role": "user", "parts": [{ "text": text }] })),
        Role::Model => match &message.tool_call {
            Some(call) => Some(json!({
                "role": "model",
                "parts": [{ "functionCall": { "name": call.name, "args": call.arguments } }]
            })),
            None => message
                .content
                .as_ref()
                .map(|text| json!({ "role": "model", "parts": [{ "text": text }] })),
        },
        Role::Tool => {
            let name = message.tool_name.as_ref()?;
            let result = message.tool_result.as_ref()?;
            Some(json!({
                "role": "user",
                "parts": [{
                    "functionResponse": { "name": name, "response": result.to_response() }
                }]
            }))
        }
    }
}

/// Decodes a `generateContent` response body. Only the first candidate and
/// the first function call are used.
pub fn parse_response(response_body: &str) -> Result<ModelResponse, ProviderError> {
    let raw: Value = serde_json::from_str(response_body).map_err(|e| {
        ProviderError::Malformed(format!("Failed to parse Gemini response: {}: {}", e, response_body))
    })?;

    let candidates = raw
        .get("candidates")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    let candidate = match candidates.first() {
        Some(candidate) => candidate,
        None => return Err(handle_empty_candidates(&raw, response_body)),
    };
    if candidates.len() > 1 {
        warn!("Handling only the first candidate from Gemini response.");
    }

    let finish_reason = candidate
        .get("finishReason")
        .and_then(Value::as_str)
        .unwrap_or("STOP");
    if !ACCEPTED_FINISH_REASONS.contains(&finish_reason) {
        return Err(handle_non_standard_finish_reason(&raw, finish_reason, response_body));
    }

    let parts = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    let mut text = String::new();
    let mut calls = Vec::new();
    for part in parts {
        if let Some(t) = part.get("text").and_then(Value::as_str) {
            text.push_str(t);
        } else if let Some(function_call) = part.get("functionCall") {
            match function_call.get("name").and_then(Value::as_str) {
                Some(name) => calls.push(ToolInvocationRequest::new(
                    name,
                    function_call.get("args").cloned().unwrap_or(Value::Null),
                )),
                None => warn!(part = %part, "Skipping functionCall part without a name"),
            }
        }
    }

    if calls.len() > 1 {
        let dropped: Vec<&str> = calls[1..].iter().map(|c| c.name.as_str()).collect();
        warn!(?dropped, "Gemini requested several function calls; only the first is executed");
    }
    let tool_call = calls.into_iter().next();
    let text = if text.trim().is_empty() { None } else { Some(text) };

    if text.is_none() && tool_call.is_none() {
        error!(raw_response = %response_body, "Gemini candidate has neither text nor a function call");
        return Err(ProviderError::Malformed(format!(
            "candidate has neither text nor a function call (finishReason: {})",
            finish_reason
        )));
    }

    Ok(ModelResponse { text, tool_call })
}

fn blocked_reason(raw_response: &Value) -> Option<String> {
    let feedback = raw_response.get("promptFeedback")?;
    if let Some(reason) = feedback.get("blockReason").and_then(Value::as_str) {
        return Some(reason.to_string());
    }
    let high_severity: Vec<String> = feedback
        .get("safetyRatings")?
        .as_array()?
        .iter()
        .filter(|rating| {
            rating
                .get("severity")
                .and_then(Value::as_str)
                .map_or(false, |s| s.starts_with("HIGH"))
        })
        .map(|rating| {
            rating
                .get("category")
                .and_then(Value::as_str)
                .unwrap_or("UNKNOWN")
                .to_string()
        })
        .collect();
    if high_severity.is_empty() {
        None
    } else {
        Some(format!("safety ratings: {}", high_severity.join(", ")))
    }
}

fn handle_empty_candidates(raw_response: &Value, response_body: &str) -> ProviderError {
    match blocked_reason(raw_response) {
        Some(reason) => {
            error!(block_reason = %reason, raw_response = %response_body, "Gemini request blocked (empty candidates).");
            ProviderError::Blocked(reason)
        }
        None => {
            error!(raw_response = %response_body, "Gemini response has no candidates.");
            ProviderError::Malformed("candidates array was empty".to_string())
        }
    }
}

fn handle_non_standard_finish_reason(
    raw_response: &Value,
    finish_reason: &str,
    response_body: &str,
) -> ProviderError {
    warn!(
        finish_reason = %finish_reason,
        raw_response = %response_body,
        "Gemini candidate finishReason indicates potential issue (e.g., safety block)."
    );
    match blocked_reason(raw_response) {
        Some(reason) => ProviderError::Blocked(format!("{} (finishReason: {})", reason, finish_reason)),
        None => ProviderError::Blocked(format!("finishReason: {}", finish_reason)),
    }
}
