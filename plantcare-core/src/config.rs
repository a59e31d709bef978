// plantcare-core/src/config.rs

//! Configuration structures and parsing for the PlantCare backend.
//!
//! The TOML file never holds secrets: it names the environment variables
//! the API key and the store credentials are read from.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;
use url::Url;

pub const DEFAULT_SYSTEM_PROMPT: &str = "Eres PlantCare, un asistente de jardinería. \
Responde siempre en español, de forma breve y amable. \
Usa get_cultivos_internal para consultar los cultivos del usuario y \
create_cultivo_internal para crear uno nuevo cuando el usuario lo pida.";

pub const DEFAULT_FALLBACK_REPLY: &str =
    "Lo siento, tuve un problema procesando tu mensaje. Por favor, inténtalo de nuevo.";

#[derive(Deserialize, Debug, Clone)]
pub struct PlantCareConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default)]
    pub server: ServerConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct ModelConfig {
    // Use `type` in TOML, map to `provider_type`
    #[serde(rename = "type", default = "default_provider_type")]
    pub provider_type: String,
    pub model_name: String,
    #[serde(default = "default_api_key_env_var")]
    pub api_key_env_var: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub parameters: Option<toml::Value>,
    #[serde(default = "default_model_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Supabase,
    Memory,
}

#[derive(Deserialize, Debug, Clone)]
pub struct StoreConfig {
    #[serde(rename = "type", default = "default_store_kind")]
    pub kind: StoreKind,
    #[serde(default = "default_url_env_var")]
    pub url_env_var: String,
    #[serde(default = "default_key_env_var")]
    pub key_env_var: String,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_notes_table")]
    pub notes_table: String,
    #[serde(default = "default_store_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: default_store_kind(),
            url_env_var: default_url_env_var(),
            key_env_var: default_key_env_var(),
            table: default_table(),
            notes_table: default_notes_table(),
            timeout_secs: default_store_timeout_secs(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: default_max_tool_iterations(),
            tool_timeout_secs: default_tool_timeout_secs(),
            session_ttl_secs: default_session_ttl_secs(),
            max_sessions: default_max_sessions(),
            fallback_reply: default_fallback_reply(),
        }
    }
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://localhost:3000".to_string(),
    ]
}
fn default_provider_type() -> String {
    "gemini".to_string()
}
fn default_api_key_env_var() -> String {
    "GEMINI_API_KEY".to_string()
}
fn default_model_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}
fn default_initial_backoff_ms() -> u64 {
    500
}
fn default_store_kind() -> StoreKind {
    StoreKind::Supabase
}
fn default_url_env_var() -> String {
    "SUPABASE_URL".to_string()
}
fn default_key_env_var() -> String {
    "SUPABASE_KEY".to_string()
}
fn default_table() -> String {
    "cultivos".to_string()
}
fn default_notes_table() -> String {
    "notes".to_string()
}
fn default_store_timeout_secs() -> u64 {
    10
}
fn default_max_tool_iterations() -> usize {
    5
}
fn default_tool_timeout_secs() -> u64 {
    15
}
fn default_session_ttl_secs() -> u64 {
    30 * 60
}
fn default_max_sessions() -> usize {
    1000
}
fn default_fallback_reply() -> String {
    DEFAULT_FALLBACK_REPLY.to_string()
}

impl PlantCareConfig {
    pub fn from_toml_str(config_toml_content: &str) -> Result<PlantCareConfig> {
        let config: PlantCareConfig = match toml::from_str(config_toml_content) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::error!(error = %e, "Failed to parse TOML content");
                return Err(anyhow!(e))
                    .context("Failed to parse configuration TOML content. Check TOML syntax.");
            }
        };

        // --- Basic Checks ---
        if config.system_prompt.trim().is_empty() {
            return Err(anyhow!("'system_prompt' in config content is empty."));
        }

        // --- Model Validation ---
        let model = &config.model;
        if model.provider_type != "gemini" {
            return Err(anyhow!(
                "Unsupported model type '{}'. Supported: gemini.",
                model.provider_type
            ));
        }
        if model.model_name.trim().is_empty() {
            return Err(anyhow!("'model.model_name' is empty."));
        }
        if model.api_key_env_var.trim().is_empty() {
            return Err(anyhow!("'model.api_key_env_var' is empty."));
        }
        if let Some(endpoint) = &model.endpoint {
            Url::parse(endpoint)
                .with_context(|| format!("Invalid URL format for 'model.endpoint' ('{}').", endpoint))?;
        }
        if let Some(params) = &model.parameters {
            if !params.is_table() {
                return Err(anyhow!(
                    "'model.parameters' must be a TOML table (e.g. {{ temperature = 0.4 }})."
                ));
            }
        }
        if model.timeout_secs == 0 {
            return Err(anyhow!("'model.timeout_secs' must be greater than zero."));
        }

        // --- Store Validation ---
        if config.store.table.trim().is_empty() {
            return Err(anyhow!("'store.table' is empty."));
        }
        if config.store.notes_table.trim().is_empty() {
            return Err(anyhow!("'store.notes_table' is empty."));
        }
        if config.store.kind == StoreKind::Supabase
            && (config.store.url_env_var.trim().is_empty()
                || config.store.key_env_var.trim().is_empty())
        {
            return Err(anyhow!(
                "Supabase store requires 'store.url_env_var' and 'store.key_env_var'."
            ));
        }

        // --- Server / Chat Validation ---
        for origin in &config.server.allowed_origins {
            Url::parse(origin)
                .with_context(|| format!("Invalid origin in 'server.allowed_origins': '{}'", origin))?;
        }
        if config.chat.max_tool_iterations == 0 {
            return Err(anyhow!("'chat.max_tool_iterations' must be at least 1."));
        }
        if config.chat.tool_timeout_secs == 0 {
            return Err(anyhow!("'chat.tool_timeout_secs' must be greater than zero."));
        }
        if config.chat.session_ttl_secs == 0 {
            return Err(anyhow!("'chat.session_ttl_secs' must be greater than zero."));
        }
        if config.chat.max_sessions == 0 {
            return Err(anyhow!("'chat.max_sessions' must be at least 1."));
        }
        if config.chat.fallback_reply.trim().is_empty() {
            return Err(anyhow!("'chat.fallback_reply' is empty."));
        }

        tracing::info!("Successfully parsed and validated configuration.");
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<PlantCareConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse or validate config file: {:?}", path))
    }
}

/// Reads a secret from the environment variable named in the config.
pub fn read_env_secret(env_var: &str) -> Result<String> {
    match std::env::var(env_var) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        Ok(_) => Err(anyhow!("Environment variable '{}' is empty", env_var)),
        Err(e) => Err(anyhow!(e)).with_context(|| format!("Environment variable '{}' is not set", env_var)),
    }
}
