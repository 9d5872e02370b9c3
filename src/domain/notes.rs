use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotesSource {
    /// Produced by the notes model endpoint.
    Remote,
    /// Produced by the built-in formatter after the remote request failed.
    Local,
}

/// Sanitized notes markup kept for copy and download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedNotes {
    pub html: String,
    pub source: NotesSource,
}
