use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// A loaded PDF: the original bytes plus what the viewer needs to know about them.
#[derive(Debug, Clone)]
pub struct DocumentHandle {
    pub name: String,
    pub bytes: Arc<[u8]>,
    pub num_pages: u32,
    pub fingerprint: String,
}

impl DocumentHandle {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>, num_pages: u32) -> Self {
        let fingerprint = hex::encode(Sha256::digest(&bytes));
        Self {
            name: name.into(),
            bytes: Arc::from(bytes),
            num_pages,
            fingerprint,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            name: self.name.clone(),
            num_pages: self.num_pages,
            size_bytes: self.size(),
            fingerprint: self.fingerprint.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DocumentSummary {
    pub name: String,
    pub num_pages: u32,
    pub size_bytes: usize,
    pub fingerprint: String,
}
