use super::rasterize::render_page;
use super::{PageBitmap, PageRenderer, PdfBackend};
use crate::domain::document::DocumentHandle;
use crate::domain::error::{AppError, Result};
use async_trait::async_trait;
use lopdf::Document;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// External tools used for rasterization and OCR.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfToolsConfig {
    pub pdftoppm_cmd: String,
    pub tesseract_cmd: String,
}

impl Default for PdfToolsConfig {
    fn default() -> Self {
        Self {
            pdftoppm_cmd: std::env::var("PDFTOPPM_CMD").unwrap_or_else(|_| "pdftoppm".to_string()),
            tesseract_cmd: std::env::var("TESSERACT_CMD")
                .unwrap_or_else(|_| "tesseract".to_string()),
        }
    }
}

/// Page count and text layer via `lopdf`, rasterization via `pdftoppm`.
pub struct LopdfBackend {
    tools: PdfToolsConfig,
}

impl LopdfBackend {
    pub fn new(tools: PdfToolsConfig) -> Self {
        Self { tools }
    }
}

fn parse(bytes: &[u8]) -> Result<Document> {
    Document::load_mem(bytes).map_err(|e| AppError::ParseError(format!("Invalid PDF: {}", e)))
}

#[async_trait]
impl PdfBackend for LopdfBackend {
    async fn page_count(&self, bytes: &[u8]) -> Result<u32> {
        let document = parse(bytes)?;
        let count = document.get_pages().len() as u32;
        if count == 0 {
            return Err(AppError::ParseError("PDF has no pages".to_string()));
        }
        Ok(count)
    }

    fn open(&self, document: &DocumentHandle) -> Result<Box<dyn PageRenderer>> {
        let parsed = parse(&document.bytes)?;
        Ok(Box::new(LopdfRenderer {
            document: Arc::new(parsed),
            bytes: document.bytes.clone(),
            pdftoppm_cmd: self.tools.pdftoppm_cmd.clone(),
        }))
    }
}

struct LopdfRenderer {
    document: Arc<Document>,
    bytes: Arc<[u8]>,
    pdftoppm_cmd: String,
}

impl LopdfRenderer {
    fn ensure_page(&self, page_number: u32) -> Result<()> {
        if self.document.get_pages().contains_key(&page_number) {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("Page {} does not exist", page_number)))
        }
    }
}

#[async_trait]
impl PageRenderer for LopdfRenderer {
    async fn text_content(&self, page_number: u32) -> Result<Vec<String>> {
        self.ensure_page(page_number)?;
        let document = self.document.clone();

        let text = tokio::task::spawn_blocking(move || document.extract_text(&[page_number]))
            .await
            .map_err(|e| AppError::Internal(format!("Text extraction task failed: {}", e)))?
            .map_err(|e| {
                AppError::ParseError(format!(
                    "Failed to read text layer of page {}: {}",
                    page_number, e
                ))
            })?;

        let fragments: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        debug!(page = page_number, fragments = fragments.len(), "Read text layer");
        Ok(fragments)
    }

    async fn render(&self, page_number: u32, scale: f32) -> Result<PageBitmap> {
        self.ensure_page(page_number)?;
        render_page(&self.pdftoppm_cmd, &self.bytes, page_number, scale).await
    }
}
