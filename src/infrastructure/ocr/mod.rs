mod tesseract;

pub use tesseract::TesseractEngine;

use crate::domain::error::Result;
use crate::infrastructure::pdf::PageBitmap;
use async_trait::async_trait;

#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, bitmap: &PageBitmap, language: &str) -> Result<String>;
}
