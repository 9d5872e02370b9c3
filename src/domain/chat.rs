use serde::{Deserialize, Serialize};

use super::llm_config::ChatMessage;

pub const THINKING_PLACEHOLDER: &str = "Thinking...";

/// Settles a reply whose request outlived the page selection it was asked about.
pub const SUPERSEDED_REPLY: &str =
    "The page selection changed before this answer arrived. Please ask again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub id: u64,
    pub role: ChatRole,
    pub content: String,
    /// Interim assistant turn shown while a request is in flight.
    pub pending: bool,
}

/// Append-only conversation for the current session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatTranscript {
    turns: Vec<ChatTurn>,
    next_id: u64,
}

impl ChatTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    fn push(&mut self, role: ChatRole, content: String, pending: bool) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.turns.push(ChatTurn {
            id,
            role,
            content,
            pending,
        });
        id
    }

    pub fn push_user(&mut self, content: impl Into<String>) -> u64 {
        self.push(ChatRole::User, content.into(), false)
    }

    pub fn push_thinking(&mut self) -> u64 {
        self.push(ChatRole::Assistant, THINKING_PLACEHOLDER.to_string(), true)
    }

    /// Replace the pending turn `id` with a final assistant message.
    pub fn resolve(&mut self, id: u64, content: impl Into<String>) -> bool {
        match self.turns.iter_mut().find(|t| t.id == id && t.pending) {
            Some(turn) => {
                turn.content = content.into();
                turn.pending = false;
                true
            }
            None => false,
        }
    }

    /// Settled turns as chat-completions messages.
    pub fn history(&self) -> Vec<ChatMessage> {
        self.turns
            .iter()
            .filter(|t| !t.pending)
            .map(|t| ChatMessage {
                role: t.role.as_str().to_string(),
                content: t.content.clone(),
            })
            .collect()
    }
}
