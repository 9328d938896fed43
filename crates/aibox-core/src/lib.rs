pub mod error;
pub mod constants;
pub mod config;
pub mod auth;
pub mod history;
pub mod llm;
pub mod session;

// Re-export key types
pub use error::{AiboxError, AuthError, ChatFailure, SessionError};
pub use config::Settings;
pub use auth::CredentialStore;
pub use history::{HistoryEntry, HistoryLog, Period};
pub use llm::{ChatBackend, CompletionClient, Message, Role};
pub use session::{PendingReply, ReplyOutcome, SessionController, SessionEvent, SessionState};
