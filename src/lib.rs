//! Conversation and request orchestration for the Gunadarma AI assistant console.
//!
//! - [`conversations`] persists conversation threads through a [`storage::KeyValueStore`]
//! - [`ai`] asks the question-answering endpoint
//! - [`session`] queues questions for the active conversation, one in flight at a time
//! - [`workspace`] wires the three together

pub mod ai;
pub mod config;
pub mod conversations;
pub mod logging;
pub mod session;
pub mod storage;
pub mod types;
pub mod workspace;

pub use ai::{ChatApiError, QuestionBackend, QuestionClient};
pub use config::AppConfig;
pub use conversations::ConversationStore;
pub use session::{ChatSession, SessionOptions};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use types::{ChatMessage, Conversation, Role, SendOptions};
pub use workspace::ChatWorkspace;
