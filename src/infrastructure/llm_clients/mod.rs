pub mod openai;

use crate::domain::error::Result;
use crate::domain::llm_config::{ChatMessage, LLMConfig};
use async_trait::async_trait;

pub use openai::OpenAIClient;

#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Send a full message list and return the first completion's text.
    async fn complete(&self, config: &LLMConfig, messages: &[ChatMessage]) -> Result<String>;

    async fn generate(&self, config: &LLMConfig, system: &str, user: &str) -> Result<String> {
        let messages = [ChatMessage::system(system), ChatMessage::user(user)];
        self.complete(config, &messages).await
    }
}
