pub mod chat;
pub mod document;
pub mod error;
pub mod extracted_text;
pub mod llm_config;
pub mod notes;
pub mod page_range;
pub mod recent_file;
