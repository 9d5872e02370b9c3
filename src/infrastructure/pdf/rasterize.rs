use crate::domain::error::{AppError, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, warn};

use super::PageBitmap;

/// Scratch directory removed on drop.
pub(crate) struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub(crate) fn new(prefix: &str) -> Result<Self> {
        let path = std::env::temp_dir().join(format!("{}-{}", prefix, uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&path).map_err(|e| {
            AppError::IoError(format!("Failed to create temp dir {}: {}", path.display(), e))
        })?;
        Ok(Self { path })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

/// Resolution passed to `pdftoppm` for a zoom factor (1.0 = 72 dpi).
pub(super) fn dpi_for_scale(scale: f32) -> u32 {
    (72.0 * scale.max(0.1)).round() as u32
}

/// Rasterize a single page with `pdftoppm` and read the PNG back.
pub(super) async fn render_page(
    pdftoppm_cmd: &str,
    pdf_bytes: &[u8],
    page_number: u32,
    scale: f32,
) -> Result<PageBitmap> {
    let scratch = ScratchDir::new("pagewise-render")?;
    let input = scratch.path().join("input.pdf");
    tokio::fs::write(&input, pdf_bytes).await?;

    let output_prefix = scratch.path().join("page");
    let dpi = dpi_for_scale(scale);
    debug!(page = page_number, dpi, cmd = pdftoppm_cmd, "Rasterizing page");

    let output = Command::new(pdftoppm_cmd)
        .arg("-png")
        .arg("-r")
        .arg(dpi.to_string())
        .arg("-f")
        .arg(page_number.to_string())
        .arg("-l")
        .arg(page_number.to_string())
        .arg("-singlefile")
        .arg(&input)
        .arg(&output_prefix)
        .output()
        .await
        .map_err(|e| AppError::Internal(format!("{} not available: {}", pdftoppm_cmd, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(page = page_number, stderr = %stderr.trim(), "pdftoppm failed");
        return Err(AppError::Internal(format!(
            "pdftoppm failed on page {}: {}",
            page_number,
            stderr.trim()
        )));
    }

    let png_path = output_prefix.with_extension("png");
    let png = tokio::fs::read(&png_path).await.map_err(|e| {
        AppError::Internal(format!(
            "pdftoppm produced no image for page {}: {}",
            page_number, e
        ))
    })?;

    let image = image::load_from_memory_with_format(&png, image::ImageFormat::Png)
        .map_err(|e| AppError::ParseError(format!("Invalid PNG from pdftoppm: {}", e)))?;

    Ok(PageBitmap {
        page_number,
        width: image.width(),
        height: image.height(),
        png,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dpi_for_scale() {
        assert_eq!(dpi_for_scale(1.0), 72);
        assert_eq!(dpi_for_scale(2.0), 144);
        assert_eq!(dpi_for_scale(0.0), 7);
    }

    #[test]
    fn test_scratch_dir_removed_on_drop() {
        let scratch = ScratchDir::new("pagewise-test").unwrap();
        let path = scratch.path().to_path_buf();
        assert!(path.is_dir());
        drop(scratch);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_missing_tool_is_reported() {
        let err = render_page("pagewise-no-such-pdftoppm", b"%PDF-1.4", 1, 2.0)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
