use crate::application::use_cases::chat_assistant::ChatAssistantUseCase;
use crate::application::use_cases::notes::NotesUseCase;
use crate::application::use_cases::recent_files::RecentFilesCache;
use crate::application::use_cases::text_extraction::TextExtractionUseCase;
use crate::application::use_cases::viewer_session::ViewerSession;
use crate::domain::error::{AppError, Result};
use crate::infrastructure::pdf::PdfBackend;
use std::sync::{Arc, Mutex, MutexGuard};

/// Use cases and the one viewing session shared by every request.
pub struct AppState {
    pub session: Mutex<ViewerSession>,
    pub pdf_backend: Arc<dyn PdfBackend>,
    pub extraction: TextExtractionUseCase,
    pub chat: ChatAssistantUseCase,
    pub notes: NotesUseCase,
    pub recent_files: RecentFilesCache,
}

impl AppState {
    /// Never hold the returned guard across an `.await`.
    pub fn session(&self) -> Result<MutexGuard<'_, ViewerSession>> {
        self.session
            .lock()
            .map_err(|_| AppError::Internal("Session lock poisoned".to_string()))
    }
}
