use async_trait::async_trait;
use serde::Serialize;

pub mod graph;
pub use graph::GraphClient;

pub mod openai;
pub use openai::OpenAiClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A chat-completion backend: takes an ordered conversation and returns the completion text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<String>;
}

/// Something able to post a reply under an existing comment.
///
/// The returned value is the platform's raw answer, only used for logging.
#[async_trait]
pub trait CommentReplier: Send + Sync {
    async fn reply(&self, comment_id: &str, message: &str) -> anyhow::Result<serde_json::Value>;
}
