use super::OcrEngine;
use crate::domain::error::{AppError, Result};
use crate::infrastructure::pdf::{PageBitmap, ScratchDir};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs the `tesseract` command on a page bitmap.
pub struct TesseractEngine {
    command: String,
}

impl TesseractEngine {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn new_command(&self) -> Command {
        let mut command = Command::new(&self.command);
        if let Ok(tessdata_prefix) = std::env::var("TESSDATA_PREFIX") {
            command.env("TESSDATA_PREFIX", tessdata_prefix);
        }
        command
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn recognize(&self, bitmap: &PageBitmap, language: &str) -> Result<String> {
        let scratch = ScratchDir::new("pagewise-ocr")?;
        let image_path = scratch
            .path()
            .join(format!("page-{}.png", bitmap.page_number));
        tokio::fs::write(&image_path, &bitmap.png).await?;

        let languages = if language.trim().is_empty() { "eng" } else { language };
        debug!(page = bitmap.page_number, languages, "Running tesseract");

        let output = self
            .new_command()
            .arg(&image_path)
            .arg("stdout")
            .arg("-l")
            .arg(languages)
            .output()
            .await
            .map_err(|e| {
                AppError::Internal(format!("Tesseract OCR failed to start: {}", e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(page = bitmap.page_number, stderr = %stderr.trim(), "Tesseract failed");
            return Err(AppError::Internal(format!(
                "Tesseract failed on page {}: {}",
                bitmap.page_number,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
