use crate::error::ChatFailure;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Something that turns one user message into one reply.
///
/// Every call is a single independent round trip; no conversation state is
/// carried between calls.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send(&self, message: &str) -> Result<String, ChatFailure>;
}
