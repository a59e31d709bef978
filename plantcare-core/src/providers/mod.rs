// plantcare-core/src/providers/mod.rs
use crate::config::ModelConfig;
use crate::errors::ProviderError;
use crate::models::chat::{ChatMessage, ModelResponse};
use crate::models::tools::ToolSpec;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

pub mod gemini;

/// Remote model that can answer with text or request a tool call.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn generate(
        &self,
        system_instruction: &str,
        history: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<ModelResponse, ProviderError>;

    fn name(&self) -> &str;
}

/// Builds the provider selected by `[model].type`.
pub fn build_provider(config: &ModelConfig, api_key: String) -> Result<Arc<dyn Provider>> {
    match config.provider_type.as_str() {
        "gemini" => {
            let http_client = Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .context("Failed to build HTTP client for Gemini")?;
            Ok(Arc::new(gemini::GeminiProvider::new(
                config.clone(),
                http_client,
                api_key,
            )))
        }
        other => Err(anyhow!("Unsupported model type '{}'", other)),
    }
}
