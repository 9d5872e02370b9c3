use super::viewer_session::ChatRequest;
use crate::domain::error::RemoteErrorKind;
use crate::domain::llm_config::{ChatMessage, LLMConfig};
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::response::clean_llm_response;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

const SYSTEM_PROMPT: &str = "You are a helpful study assistant. Answer questions using only the document text below. \
If the answer is not in the text, say so. Refer to page numbers when that helps the reader.";

/// Text to put in place of the pending turn, plus the failure category if the request failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub content: String,
    pub failure: Option<RemoteErrorKind>,
}

pub struct ChatAssistantUseCase {
    llm_client: Arc<dyn LLMClient>,
    config: LLMConfig,
}

impl ChatAssistantUseCase {
    pub fn new(llm_client: Arc<dyn LLMClient>, config: LLMConfig) -> Self {
        Self { llm_client, config }
    }

    pub fn build_messages(request: &ChatRequest) -> Vec<ChatMessage> {
        let system = format!(
            "{}\n\n--- DOCUMENT START ---\n{}\n--- DOCUMENT END ---",
            SYSTEM_PROMPT, request.context
        );
        let mut messages = Vec::with_capacity(request.history.len() + 1);
        messages.push(ChatMessage::system(system));
        messages.extend(request.history.iter().cloned());
        messages
    }

    /// One attempt, no retry. Failures become a user-facing message.
    pub async fn ask(&self, request: &ChatRequest) -> ChatReply {
        let messages = Self::build_messages(request);
        let started = Instant::now();

        match self.llm_client.complete(&self.config, &messages).await {
            Ok(raw) => {
                info!(
                    model = %self.config.model,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Chat completion received"
                );
                ChatReply {
                    content: clean_llm_response(&raw),
                    failure: None,
                }
            }
            Err(err) => {
                let kind = err.remote_kind();
                warn!(kind = ?kind, error = %err, "Chat completion failed");
                ChatReply {
                    content: kind.user_message().to_string(),
                    failure: Some(kind),
                }
            }
        }
    }
}
