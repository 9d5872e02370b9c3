use super::note_formatter::format_notes;
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use crate::domain::notes::{GeneratedNotes, NotesSource};
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::response::{clean_llm_response, sanitize_html};
use std::sync::Arc;
use tracing::{info, warn};

const NOTES_PROMPT: &str = "Turn the document text you are given into well-structured study notes. \
Respond with an HTML fragment only: use <h2>/<h3> for sections, <ul>/<ol> with <li> for lists, \
<p> for prose and <strong> for key terms. Do not include <html>, <head>, <body>, scripts or styles.";

pub struct NotesUseCase {
    llm_client: Arc<dyn LLMClient>,
    config: LLMConfig,
}

impl NotesUseCase {
    pub fn new(llm_client: Arc<dyn LLMClient>, config: LLMConfig) -> Self {
        Self { llm_client, config }
    }

    /// Ask the notes model; fall back to the local formatter on any failure.
    pub async fn generate(&self, document_text: &str) -> Result<GeneratedNotes> {
        let remote = match self
            .llm_client
            .generate(&self.config, NOTES_PROMPT, document_text)
            .await
        {
            Ok(raw) => {
                let cleaned = clean_llm_response(&raw);
                if cleaned.trim().is_empty() {
                    warn!("Notes model returned nothing, using local formatter");
                    None
                } else {
                    Some(cleaned)
                }
            }
            Err(err) => {
                warn!(kind = ?err.remote_kind(), error = %err, "Notes request failed, using local formatter");
                None
            }
        };

        let (markup, source) = match remote {
            Some(markup) => (markup, NotesSource::Remote),
            None => (format_notes(document_text), NotesSource::Local),
        };

        let html = sanitize_html(&markup)
            .map_err(|e| AppError::LLMError(format!("Notes could not be rendered: {}", e)))?;
        info!(source = ?source, chars = html.len(), "Notes generated");
        Ok(GeneratedNotes { html, source })
    }
}
