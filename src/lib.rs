pub mod app;
pub mod composer;
pub mod config;
pub mod handler;
pub mod logging;
pub mod message_list;
pub mod ollama;
pub mod state;
pub mod template;
pub mod tui;
pub mod ui;
pub mod view_model;

// Re-export main types for convenience
pub use composer::Composer;
pub use config::Config;
pub use ollama::{InferenceClient, OllamaClient};
pub use state::{ChatMessage, UiState};
pub use template::{DiagnosticTable, PromptTemplate, TemplateError};
pub use view_model::{ChatViewModel, InferenceEvent, InferenceUpdate};
