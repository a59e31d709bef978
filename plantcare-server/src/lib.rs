// plantcare-server/src/lib.rs

//! HTTP surface of the PlantCare backend: crop CRUD, calendar notes and the
//! chat assistant.

pub mod cors;
pub mod error;
pub mod routes;


use anyhow::{Context, Result};
use axum::routing::{delete, get, post};
use axum::Router;
use plantcare_core::config::read_env_secret;
use plantcare_core::providers::build_provider;
use plantcare_core::store::memory::MemoryStore;
use plantcare_core::store::supabase::SupabaseStore;
use plantcare_core::tools::crops::register_crop_tools;
use plantcare_core::{
    ActionDispatcher, ChatService, CropRepository, EntityStore, NoteRepository, PlantCareConfig,
    Provider, ServerConfig, StoreKind, ToolRegistry,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub crops: CropRepository,
    pub notes: NoteRepository,
    pub chat: Arc<ChatService>,
}

impl AppState {
    /// Wires the tool registry, dispatcher and chat service over the given
    /// collaborators.
    pub fn new(
        store: Arc<dyn EntityStore>,
        provider: Arc<dyn Provider>,
        config: &PlantCareConfig,
    ) -> Result<Self> {
        let notes = NoteRepository::new(Arc::clone(&store), config.store.notes_table.clone());
        let crops = CropRepository::new(store, config.store.table.clone());

        let mut registry = ToolRegistry::new();
        register_crop_tools(&mut registry, crops.clone()).context("Failed to register crop tools")?;
        info!(tools = registry.len(), provider = provider.name(), "Tool registry ready");

        let dispatcher = ActionDispatcher::new(
            Arc::new(registry),
            Duration::from_secs(config.chat.tool_timeout_secs),
        );
        let chat = ChatService::new(provider, &config.system_prompt, dispatcher, &config.chat);
        Ok(Self {
            crops,
            notes,
            chat: Arc::new(chat),
        })
    }

    /// Builds the store and the model provider from the config and the
    /// environment variables it names.
    pub fn from_config(config: &PlantCareConfig) -> Result<Self> {
        let store: Arc<dyn EntityStore> = match config.store.kind {
            StoreKind::Supabase => {
                let url = read_env_secret(&config.store.url_env_var)?;
                let key = read_env_secret(&config.store.key_env_var)?;
                let store = SupabaseStore::new(&url, key, Duration::from_secs(config.store.timeout_secs))
                    .context("Failed to build Supabase client")?;
                info!(table = %config.store.table, "Using Supabase crop store");
                Arc::new(store)
            }
            StoreKind::Memory => {
                warn!("Using in-memory crop store; crops are lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        let api_key = read_env_secret(&config.model.api_key_env_var)?;
        let provider = build_provider(&config.model, api_key)?;
        Self::new(store, provider, config)
    }
}

pub fn build_router(state: AppState, server: &ServerConfig) -> Result<Router> {
    Ok(Router::new()
        .route("/", get(routes::root))
        .route("/chat", post(routes::chat))
        .route(
            "/cultivos",
            get(routes::list_cultivos).post(routes::create_cultivo),
        )
        .route("/notes", get(routes::list_notes).post(routes::create_note))
        .route("/notes/:id", delete(routes::delete_note))
        .layer(cors::cors_layer(&server.allowed_origins)?)
        .with_state(state))
}
