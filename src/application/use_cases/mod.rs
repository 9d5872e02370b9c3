pub mod chat_assistant;
pub mod note_formatter;
pub mod notes;
pub mod page_virtualizer;
pub mod recent_files;
pub mod text_extraction;
pub mod viewer_session;
