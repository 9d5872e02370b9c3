use serde::{Deserialize, Serialize};

/// Persisted record: `{ name, data: base64 bytes, lastOpened: epoch millis }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentFileEntry {
    pub name: String,
    pub data: String,
    pub last_opened: i64,
}

impl RecentFileEntry {
    /// Decoded size estimated from the base64 length.
    pub fn estimated_size(&self) -> usize {
        estimated_decoded_size(&self.data)
    }

    pub fn summary(&self) -> RecentFileSummary {
        RecentFileSummary {
            name: self.name.clone(),
            last_opened: self.last_opened,
            size_bytes: self.estimated_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentFileSummary {
    pub name: String,
    pub last_opened: i64,
    pub size_bytes: usize,
}

pub fn estimated_decoded_size(base64_data: &str) -> usize {
    let padding = base64_data
        .as_bytes()
        .iter()
        .rev()
        .take(2)
        .filter(|b| **b == b'=')
        .count();
    (base64_data.len() / 4 * 3).saturating_sub(padding)
}
