mod lopdf_backend;
mod rasterize;

pub use lopdf_backend::{LopdfBackend, PdfToolsConfig};
pub(crate) use rasterize::ScratchDir;

#[cfg(test)]
pub(crate) use lopdf_backend::tests::sample_pdf;

use crate::domain::document::DocumentHandle;
use crate::domain::error::Result;
use async_trait::async_trait;

/// A rasterized page, PNG encoded.
#[derive(Debug, Clone)]
pub struct PageBitmap {
    pub page_number: u32,
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

/// Rendering capability for one opened document.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Text-run fragments of the page's embedded text layer, in reading order.
    async fn text_content(&self, page_number: u32) -> Result<Vec<String>>;

    /// Rasterize the page at `scale` (1.0 = 72 dpi).
    async fn render(&self, page_number: u32, scale: f32) -> Result<PageBitmap>;
}

#[async_trait]
pub trait PdfBackend: Send + Sync {
    async fn page_count(&self, bytes: &[u8]) -> Result<u32>;

    fn open(&self, document: &DocumentHandle) -> Result<Box<dyn PageRenderer>>;
}
