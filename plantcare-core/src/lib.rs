// plantcare-core/src/lib.rs

#![doc = include_str!("../../README.md")]

pub mod config;
pub mod conversation;
pub mod errors;
pub mod providers;
pub mod session;
pub mod store;
pub mod tools;


pub use config::{ChatConfig, ModelConfig, PlantCareConfig, ServerConfig, StoreConfig, StoreKind};
pub use conversation::{ChatService, ConversationLoop, LoopState, TurnError};
pub use errors::{ChatError, ProviderError, StoreError, ToolError, ValidationError};
pub use models::chat::{ChatMessage, ChatReply, ChatTurnResult, ModelResponse, Role};
pub use models::crop::{Crop, NewCrop};
pub use models::note::{NewNote, Note};
pub use models::record::RecordId;
pub use models::tools::{
    ActionPerformed, ToolInvocationRequest, ToolParameter, ToolParameterType, ToolResult, ToolSpec,
};
pub use providers::Provider;
pub use session::{ChatSession, SessionStore, SessionTemplate};
pub use store::{CreateRecordError, CropRepository, EntityStore, NoteRepository};
pub use tools::dispatcher::{ActionDispatcher, Dispatch};
pub use tools::{ToolAction, ToolRegistry};

pub use async_trait::async_trait;

pub mod models {
    pub mod chat;
    pub mod crop;
    pub mod note;
    pub mod record;
    pub mod tools;
}
