//! State of the single viewing session: open document, active page range,
//! viewport, extracted text, chat transcript and generated notes.
//!
//! Every asynchronous operation takes a [`RequestTicket`] when it starts.
//! Loading a document or applying a split advances the session epoch, and
//! results carrying an older ticket are dropped when they come back.

use super::page_virtualizer::{PageVirtualizer, Viewport, VisibleWindow};
use crate::domain::chat::{ChatTranscript, SUPERSEDED_REPLY};
use crate::domain::document::{DocumentHandle, DocumentSummary};
use crate::domain::error::{AppError, Result};
use crate::domain::extracted_text::ExtractedText;
use crate::domain::llm_config::ChatMessage;
use crate::domain::notes::GeneratedNotes;
use crate::domain::page_range::PageRange;
use serde::Serialize;
use tracing::{debug, info};

/// Session epoch captured when an asynchronous operation starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket {
    epoch: u64,
}

/// Everything a chat request needs once the session lock is released.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub ticket: RequestTicket,
    pub placeholder_id: u64,
    pub context: String,
    pub history: Vec<ChatMessage>,
}

/// Input for an extraction run over the active range.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub ticket: RequestTicket,
    pub document: DocumentHandle,
    pub pages: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JumpResult {
    pub scroll_offset: f64,
    pub window: VisibleWindow,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub document: Option<DocumentSummary>,
    pub range: Option<PageRange>,
    pub split_applied: bool,
    pub current_page: u32,
    pub scroll_top: f64,
    pub window: Option<VisibleWindow>,
    pub can_extract: bool,
    pub can_chat: bool,
    pub has_notes: bool,
}

pub struct ViewerSession {
    virtualizer: PageVirtualizer,
    document: Option<DocumentHandle>,
    range: Option<PageRange>,
    split_applied: bool,
    current_page: u32,
    viewport: Viewport,
    extracted: Option<ExtractedText>,
    transcript: ChatTranscript,
    notes: Option<GeneratedNotes>,
    epoch: u64,
}

impl ViewerSession {
    pub fn new(virtualizer: PageVirtualizer) -> Self {
        Self {
            virtualizer,
            document: None,
            range: None,
            split_applied: false,
            current_page: 0,
            viewport: Viewport::default(),
            extracted: None,
            transcript: ChatTranscript::new(),
            notes: None,
            epoch: 0,
        }
    }

    pub fn document(&self) -> Option<&DocumentHandle> {
        self.document.as_ref()
    }

    #[cfg(test)]
    pub fn range(&self) -> Option<PageRange> {
        self.range
    }

    #[cfg(test)]
    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    #[cfg(test)]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[cfg(test)]
    pub fn extracted_text(&self) -> Option<&ExtractedText> {
        self.extracted.as_ref()
    }

    pub fn transcript(&self) -> &ChatTranscript {
        &self.transcript
    }

    pub fn notes(&self) -> Option<&GeneratedNotes> {
        self.notes.as_ref()
    }

    fn open_document(&self) -> Result<&DocumentHandle> {
        self.document
            .as_ref()
            .ok_or_else(|| AppError::ValidationError("No document is open".to_string()))
    }

    fn bump_epoch(&mut self) {
        self.epoch += 1;
    }

    fn reset_scroll(&mut self, first_page: u32) {
        self.current_page = first_page;
        self.viewport.scroll_top = 0.0;
    }

    /// Replace the open document. Text, chat and notes belong to the old file and are dropped.
    pub fn load_document(&mut self, document: DocumentHandle) {
        info!(
            name = %document.name,
            pages = document.num_pages,
            size = document.size(),
            "Document loaded"
        );
        self.range = Some(PageRange::full(document.num_pages));
        self.document = Some(document);
        self.split_applied = false;
        self.extracted = None;
        self.transcript = ChatTranscript::new();
        self.notes = None;
        self.reset_scroll(1);
        self.bump_epoch();
    }

    /// Restrict the active sequence to `start..=end`. Invalid input changes nothing.
    pub fn split(&mut self, start: u32, end: u32) -> bool {
        let num_pages = match &self.document {
            Some(document) => document.num_pages,
            None => return false,
        };
        let range = match PageRange::checked(start, end, num_pages) {
            Some(range) => range,
            None => {
                debug!(start, end, num_pages, "Split rejected");
                return false;
            }
        };

        self.range = Some(range);
        self.split_applied = true;
        self.reset_scroll(start);
        self.bump_epoch();
        info!(start, end, "Split applied");
        true
    }

    pub fn window(&self) -> Option<VisibleWindow> {
        self.range
            .map(|range| self.virtualizer.compute(&self.viewport, &range))
    }

    pub fn update_viewport(&mut self, viewport: Viewport) -> Result<VisibleWindow> {
        let range = self
            .range
            .ok_or_else(|| AppError::ValidationError("No document is open".to_string()))?;
        self.viewport = viewport;
        let window = self.virtualizer.compute(&self.viewport, &range);
        self.current_page = window.primary_page;
        Ok(window)
    }

    pub fn jump_to_page(&mut self, page: u32) -> Result<JumpResult> {
        let num_pages = self.open_document()?.num_pages;
        let range = self.range.unwrap_or_else(|| PageRange::full(num_pages));
        let scroll_offset =
            self.virtualizer
                .jump_offset(page, &range, num_pages, self.viewport.width)?;

        self.viewport.scroll_top = scroll_offset;
        let window = self.virtualizer.compute(&self.viewport, &range);
        self.current_page = window.primary_page;
        Ok(JumpResult {
            scroll_offset,
            window,
        })
    }

    pub fn begin_request(&self) -> RequestTicket {
        RequestTicket { epoch: self.epoch }
    }

    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        ticket.epoch == self.epoch
    }

    pub fn begin_extraction(&self) -> Result<ExtractionRequest> {
        let document = self.open_document()?;
        if !self.split_applied {
            return Err(AppError::ValidationError(
                "Split the document before extracting text".to_string(),
            ));
        }
        let range = self.range.unwrap_or_else(|| PageRange::full(document.num_pages));
        Ok(ExtractionRequest {
            ticket: self.begin_request(),
            document: document.clone(),
            pages: range.pages(),
        })
    }

    /// Store a finished extraction unless the session moved on meanwhile.
    pub fn apply_extraction(&mut self, ticket: RequestTicket, text: ExtractedText) -> bool {
        if !self.is_current(ticket) {
            info!("Dropping extraction result for a superseded range");
            return false;
        }
        self.extracted = Some(text);
        true
    }

    /// Append the question and a pending reply, and snapshot what the model needs.
    pub fn begin_chat(&mut self, question: &str) -> Result<ChatRequest> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::ValidationError(
                "Please enter a question".to_string(),
            ));
        }
        let context = match &self.extracted {
            Some(text) if !text.is_empty() => text.to_document(),
            _ => {
                return Err(AppError::ValidationError(
                    "Extract text before asking questions".to_string(),
                ))
            }
        };

        self.transcript.push_user(question);
        let history = self.transcript.history();
        let placeholder_id = self.transcript.push_thinking();

        Ok(ChatRequest {
            ticket: self.begin_request(),
            placeholder_id,
            context,
            history,
        })
    }

    /// Settle the pending reply. A stale ticket settles it with a notice instead of the answer.
    pub fn finish_chat(&mut self, ticket: RequestTicket, placeholder_id: u64, reply: &str) -> bool {
        if !self.is_current(ticket) {
            self.transcript.resolve(placeholder_id, SUPERSEDED_REPLY);
            info!("Dropping chat reply for a superseded session");
            return false;
        }
        self.transcript.resolve(placeholder_id, reply)
    }

    pub fn extracted_context(&self) -> Result<String> {
        match &self.extracted {
            Some(text) if !text.is_empty() => Ok(text.to_document()),
            _ => Err(AppError::ValidationError(
                "Extract text before generating notes".to_string(),
            )),
        }
    }

    pub fn apply_notes(&mut self, ticket: RequestTicket, notes: GeneratedNotes) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.notes = Some(notes);
        true
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            document: self.document.as_ref().map(DocumentHandle::summary),
            range: self.range,
            split_applied: self.split_applied,
            current_page: self.current_page,
            scroll_top: self.viewport.scroll_top,
            window: self.window(),
            can_extract: self.document.is_some() && self.split_applied,
            can_chat: self.extracted.as_ref().map_or(false, |t| !t.is_empty()),
            has_notes: self.notes.is_some(),
        }
    }
}

impl Default for ViewerSession {
    fn default() -> Self {
        Self::new(PageVirtualizer::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::text_extraction::tests::{FakeOcr, FakeRenderer};
    use crate::application::use_cases::text_extraction::{
        ExtractionConfig, NoProgress, TextExtractionUseCase,
    };
    use crate::domain::chat::ChatRole;
    use crate::domain::extracted_text::{ExtractionMethod, PageText};
    use std::sync::Arc;

    fn session_with_pages(num_pages: u32) -> ViewerSession {
        let mut session = ViewerSession::default();
        session.load_document(DocumentHandle::new(
            "book.pdf",
            b"%PDF-1.4".to_vec(),
            num_pages,
        ));
        session
    }

    fn one_page_text(page_number: u32) -> ExtractedText {
        ExtractedText::new(vec![PageText {
            page_number,
            text: "Photosynthesis converts light into chemical energy.".to_string(),
            method: ExtractionMethod::Native,
        }])
    }

    #[test]
    fn test_valid_split_sets_exact_range() {
        for (start, end) in [(1, 1), (2, 4), (1, 10), (10, 10), (3, 9)] {
            let mut session = session_with_pages(10);
            assert!(session.split(start, end));
            let range = session.range().unwrap();
            assert_eq!(range.pages(), (start..=end).collect::<Vec<_>>());
            assert_eq!(session.current_page(), start);
            assert_eq!(session.viewport().scroll_top, 0.0);
        }
    }

    #[test]
    fn test_invalid_split_changes_nothing() {
        for (start, end) in [(0, 3), (5, 4), (1, 11), (11, 12), (0, 0)] {
            let mut session = session_with_pages(10);
            session.split(2, 5);
            let before_ticket = session.begin_request();

            assert!(!session.split(start, end));
            assert_eq!(session.range(), Some(PageRange { start: 2, end: 5 }));
            assert!(session.is_current(before_ticket));
        }
    }

    #[test]
    fn test_split_without_document_is_rejected() {
        let mut session = ViewerSession::default();
        assert!(!session.split(1, 1));
        assert!(session.range().is_none());
    }

    #[test]
    fn test_jump_offsets_and_rejections() {
        let mut session = session_with_pages(10);
        let jump = session.jump_to_page(5).unwrap();
        assert_eq!(jump.scroll_offset, 4.0 * 1100.0);
        assert_eq!(jump.window.primary_page, 5);
        assert_eq!(session.current_page(), 5);

        for page in [0, 11] {
            let err = session.jump_to_page(page).unwrap_err();
            assert!(matches!(err, AppError::ValidationError(_)));
            assert_eq!(session.viewport().scroll_top, 4.0 * 1100.0);
        }
    }

    #[test]
    fn test_jump_respects_scale_and_split() {
        let mut session = session_with_pages(10);
        session
            .update_viewport(Viewport {
                scroll_top: 0.0,
                width: 500.0,
                height: 700.0,
            })
            .unwrap();
        let jump = session.jump_to_page(3).unwrap();
        assert!((jump.scroll_offset - 2.0 * 1100.0 * 0.6).abs() < 1e-9);

        session.split(4, 8);
        assert!(session.jump_to_page(2).is_err());
        let jump = session.jump_to_page(6).unwrap();
        assert!((jump.scroll_offset - 2.0 * 1100.0 * 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_viewport_updates_page_indicator() {
        let mut session = session_with_pages(10);
        let window = session
            .update_viewport(Viewport {
                scroll_top: 3.5 * 1100.0,
                width: 1280.0,
                height: 800.0,
            })
            .unwrap();
        assert_eq!(window.primary_page, 4);
        assert_eq!(session.current_page(), 4);
    }

    #[test]
    fn test_extraction_requires_split() {
        let session = session_with_pages(10);
        assert!(matches!(
            session.begin_extraction(),
            Err(AppError::ValidationError(_))
        ));
    }

    #[test]
    fn test_stale_extraction_is_dropped() {
        let mut session = session_with_pages(10);
        session.split(1, 3);
        let request = session.begin_extraction().unwrap();

        session.split(5, 6);
        assert!(!session.apply_extraction(request.ticket, one_page_text(1)));
        assert!(session.extracted_text().is_none());
    }

    #[test]
    fn test_split_keeps_previous_text_and_chat() {
        let mut session = session_with_pages(10);
        session.split(1, 1);
        let request = session.begin_extraction().unwrap();
        assert!(session.apply_extraction(request.ticket, one_page_text(1)));
        let chat = session.begin_chat("What is it?").unwrap();
        session.finish_chat(chat.ticket, chat.placeholder_id, "Biology.");

        session.split(2, 3);
        assert!(session.extracted_text().is_some());
        assert_eq!(session.transcript().turns().len(), 2);
    }

    #[test]
    fn test_chat_requires_text_and_question() {
        let mut session = session_with_pages(3);
        assert!(session.begin_chat("hello").is_err());

        session.split(1, 1);
        let request = session.begin_extraction().unwrap();
        session.apply_extraction(request.ticket, one_page_text(1));
        assert!(matches!(
            session.begin_chat("   "),
            Err(AppError::ValidationError(_))
        ));
        assert!(session.transcript().turns().is_empty());
    }

    #[test]
    fn test_chat_request_snapshot() {
        let mut session = session_with_pages(3);
        session.split(2, 2);
        let request = session.begin_extraction().unwrap();
        session.apply_extraction(request.ticket, one_page_text(2));

        let chat = session.begin_chat("  Summarize page two  ").unwrap();
        assert!(chat.context.starts_with("Page 2:\n"));
        assert_eq!(chat.history, vec![ChatMessage::user("Summarize page two")]);
        assert!(session.transcript().turns().last().unwrap().pending);
    }

    #[test]
    fn test_stale_chat_is_answered_with_notice() {
        let mut session = session_with_pages(3);
        session.split(1, 1);
        let request = session.begin_extraction().unwrap();
        session.apply_extraction(request.ticket, one_page_text(1));
        let chat = session.begin_chat("Question?").unwrap();

        session.split(2, 3);
        assert!(!session.finish_chat(chat.ticket, chat.placeholder_id, "late answer"));

        let turns = session.transcript().turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, ChatRole::User);
        assert_eq!(turns[1].role, ChatRole::Assistant);
        assert_eq!(turns[1].content, SUPERSEDED_REPLY);
        assert!(turns.iter().all(|t| !t.pending));
    }

    #[test]
    fn test_stale_chat_after_reload_adds_nothing() {
        let mut session = session_with_pages(3);
        session.split(1, 1);
        let request = session.begin_extraction().unwrap();
        session.apply_extraction(request.ticket, one_page_text(1));
        let chat = session.begin_chat("Question?").unwrap();

        session.load_document(DocumentHandle::new("next.pdf", b"%PDF".to_vec(), 2));
        assert!(!session.finish_chat(chat.ticket, chat.placeholder_id, "late answer"));
        assert!(session.transcript().turns().is_empty());
    }

    #[test]
    fn test_loading_document_resets_everything() {
        let mut session = session_with_pages(10);
        session.split(2, 3);
        let request = session.begin_extraction().unwrap();
        session.apply_extraction(request.ticket, one_page_text(2));

        session.load_document(DocumentHandle::new("other.pdf", b"%PDF".to_vec(), 4));
        let view = session.view();
        assert_eq!(view.range, Some(PageRange { start: 1, end: 4 }));
        assert!(!view.split_applied);
        assert!(!view.can_extract);
        assert!(!view.can_chat);
        assert_eq!(view.current_page, 1);
    }

    #[tokio::test]
    async fn test_split_then_extract_ten_page_text_document() {
        let mut session = session_with_pages(10);
        let renderer = FakeRenderer::with_text_pages(10);
        let ocr = Arc::new(FakeOcr::default());
        let extractor = TextExtractionUseCase::new(ocr.clone(), ExtractionConfig::default());

        assert!(session.split(2, 4));
        let request = session.begin_extraction().unwrap();
        assert_eq!(request.pages, vec![2, 3, 4]);

        let text = extractor
            .extract(&renderer, &request.pages, &NoProgress)
            .await
            .unwrap();
        assert!(session.apply_extraction(request.ticket, text));

        let document = session.extracted_text().unwrap().to_document();
        let sections: Vec<&str> = document.split("\n\n").collect();
        assert_eq!(sections.len(), 3);
        for (section, page) in sections.iter().zip([2, 3, 4]) {
            assert!(section.starts_with(&format!("Page {}:\n", page)));
        }
        assert_eq!(ocr.call_count(), 0);
        assert!(session.view().can_chat);
    }
}
