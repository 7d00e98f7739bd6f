pub mod agents;
pub mod app;
pub mod config;
pub mod context;
pub mod gemini;
pub mod handler;
pub mod mock;
pub mod preview;
pub mod provider;
pub mod tree;
pub mod tui;
pub mod ui;

// Re-export main types for convenience
pub use agents::{AgentType, SystemPrompts, WorkflowStep};
pub use app::{App, ChatMessage, ChatRole, GenerationJob, PendingGeneration};
pub use config::Config;
pub use context::{assemble, AssembledContext};
pub use gemini::GeminiClient;
pub use mock::MockBackend;
pub use preview::{diff_rows, PendingPreview};
pub use provider::GenerateBackend;
pub use tree::{FileNode, FileRole};
