//! Native-text-first extraction with an OCR fallback for image-only pages.

use crate::domain::error::{AppError, Result};
use crate::domain::extracted_text::{ExtractedText, ExtractionMethod, PageText};
use crate::infrastructure::ocr::OcrEngine;
use crate::infrastructure::pdf::PageRenderer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Any failing page fails the whole batch.
    Abort,
    /// Failing pages are left out; the batch fails only if no page succeeded.
    SkipFailedPages,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Pages whose trimmed native text is shorter than this go through OCR
    pub min_native_chars: usize,
    /// Zoom used when rasterizing for OCR, independent of display zoom
    pub ocr_scale: f32,
    /// Tesseract language code
    pub ocr_language: String,
    pub failure_policy: FailurePolicy,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_native_chars: 50,
            ocr_scale: 2.0,
            ocr_language: "eng".to_string(),
            failure_policy: FailurePolicy::Abort,
        }
    }
}

/// Receives recognition start/finish notifications, one page at a time.
pub trait ExtractionProgress: Send + Sync {
    fn recognition_started(&self, page_number: u32);
    fn recognition_finished(&self, page_number: u32, success: bool);
}

#[cfg(test)]
pub struct NoProgress;

#[cfg(test)]
impl ExtractionProgress for NoProgress {
    fn recognition_started(&self, _page_number: u32) {}
    fn recognition_finished(&self, _page_number: u32, _success: bool) {}
}

pub struct TextExtractionUseCase {
    ocr: Arc<dyn OcrEngine>,
    config: ExtractionConfig,
}

impl TextExtractionUseCase {
    pub fn new(ocr: Arc<dyn OcrEngine>, config: ExtractionConfig) -> Self {
        Self { ocr, config }
    }

    /// Whether native text this short marks the page as image-based.
    pub fn needs_ocr(&self, native_text: &str) -> bool {
        native_text.trim().chars().count() < self.config.min_native_chars
    }

    /// Extract `pages` in order. Pages are processed sequentially.
    pub async fn extract(
        &self,
        renderer: &dyn PageRenderer,
        pages: &[u32],
        progress: &dyn ExtractionProgress,
    ) -> Result<ExtractedText> {
        if pages.is_empty() {
            return Err(AppError::ValidationError(
                "No pages selected for extraction".to_string(),
            ));
        }

        let started = Instant::now();
        let mut results = Vec::with_capacity(pages.len());
        let mut failures = 0usize;

        for &page_number in pages {
            match self.extract_page(renderer, page_number, progress).await {
                Ok(page) => results.push(page),
                Err(err) => match self.config.failure_policy {
                    FailurePolicy::Abort => {
                        warn!(page = page_number, error = %err, "Extraction aborted");
                        return Err(err);
                    }
                    FailurePolicy::SkipFailedPages => {
                        warn!(page = page_number, error = %err, "Skipping page that failed extraction");
                        failures += 1;
                    }
                },
            }
        }

        if results.is_empty() {
            return Err(AppError::Internal(format!(
                "Text extraction failed for all {} pages",
                failures
            )));
        }

        let text = ExtractedText::new(results);
        info!(
            pages = text.pages.len(),
            ocr_pages = text.ocr_page_count(),
            skipped = failures,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Text extraction finished"
        );
        Ok(text)
    }

    async fn extract_page(
        &self,
        renderer: &dyn PageRenderer,
        page_number: u32,
        progress: &dyn ExtractionProgress,
    ) -> Result<PageText> {
        let fragments = renderer.text_content(page_number).await?;
        let native = fragments.join(" ");

        if !self.needs_ocr(&native) {
            debug!(page = page_number, chars = native.len(), "Using embedded text");
            return Ok(PageText {
                page_number,
                text: native.trim().to_string(),
                method: ExtractionMethod::Native,
            });
        }

        info!(page = page_number, "Page looks image-based, running OCR");
        progress.recognition_started(page_number);
        let recognized = self.recognize_page(renderer, page_number).await;
        progress.recognition_finished(page_number, recognized.is_ok());

        Ok(PageText {
            page_number,
            text: recognized?.trim().to_string(),
            method: ExtractionMethod::Ocr,
        })
    }

    async fn recognize_page(&self, renderer: &dyn PageRenderer, page_number: u32) -> Result<String> {
        let bitmap = renderer.render(page_number, self.config.ocr_scale).await?;
        debug!(
            page = page_number,
            width = bitmap.width,
            height = bitmap.height,
            "Rasterized page for OCR"
        );
        self.ocr.recognize(&bitmap, &self.config.ocr_language).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::infrastructure::pdf::PageBitmap;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    /// Renderer whose pages hold fixed text; unknown pages have no text layer.
    #[derive(Default)]
    pub(crate) struct FakeRenderer {
        pub texts: HashMap<u32, Vec<String>>,
        pub broken_pages: HashSet<u32>,
        pub render_scales: Mutex<Vec<(u32, f32)>>,
    }

    impl FakeRenderer {
        pub(crate) fn with_text_pages(count: u32) -> Self {
            let mut texts = HashMap::new();
            for page in 1..=count {
                texts.insert(
                    page,
                    vec![
                        format!("Chapter heading for page {}", page),
                        "with enough embedded text to count as a text layer".to_string(),
                    ],
                );
            }
            Self {
                texts,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl PageRenderer for FakeRenderer {
        async fn text_content(&self, page_number: u32) -> Result<Vec<String>> {
            if self.broken_pages.contains(&page_number) {
                return Err(AppError::Internal(format!("page {} is broken", page_number)));
            }
            Ok(self.texts.get(&page_number).cloned().unwrap_or_default())
        }

        async fn render(&self, page_number: u32, scale: f32) -> Result<PageBitmap> {
            self.render_scales.lock().unwrap().push((page_number, scale));
            Ok(PageBitmap {
                page_number,
                width: 10,
                height: 10,
                png: vec![page_number as u8],
            })
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeOcr {
        pub calls: Mutex<Vec<(u32, String)>>,
        pub failing_pages: HashSet<u32>,
    }

    impl FakeOcr {
        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl OcrEngine for FakeOcr {
        async fn recognize(&self, bitmap: &PageBitmap, language: &str) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push((bitmap.page_number, language.to_string()));
            if self.failing_pages.contains(&bitmap.page_number) {
                return Err(AppError::Internal("tesseract crashed".to_string()));
            }
            Ok(format!("  recognized text of page {}  ", bitmap.page_number))
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        events: Mutex<Vec<String>>,
    }

    impl ExtractionProgress for RecordingProgress {
        fn recognition_started(&self, page_number: u32) {
            self.events.lock().unwrap().push(format!("start {}", page_number));
        }

        fn recognition_finished(&self, page_number: u32, success: bool) {
            self.events
                .lock()
                .unwrap()
                .push(format!("finish {} {}", page_number, success));
        }
    }

    fn use_case(ocr: Arc<FakeOcr>, policy: FailurePolicy) -> TextExtractionUseCase {
        TextExtractionUseCase::new(
            ocr,
            ExtractionConfig {
                failure_policy: policy,
                ..ExtractionConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn test_pages_are_concatenated_in_order() {
        let ocr = Arc::new(FakeOcr::default());
        let extractor = use_case(ocr.clone(), FailurePolicy::Abort);
        let renderer = FakeRenderer::with_text_pages(10);

        let text = extractor
            .extract(&renderer, &[3, 4, 5], &NoProgress)
            .await
            .unwrap();
        let document = text.to_document();

        let p3 = document.find("Page 3:").unwrap();
        let p4 = document.find("Page 4:").unwrap();
        let p5 = document.find("Page 5:").unwrap();
        assert!(p3 < p4 && p4 < p5);
        assert!(document[p3..p4].contains("Chapter heading for page 3"));
        assert!(document[p5..].contains("Chapter heading for page 5"));
        assert_eq!(ocr.call_count(), 0);
    }

    #[tokio::test]
    async fn test_fragments_joined_with_single_space() {
        let ocr = Arc::new(FakeOcr::default());
        let extractor = use_case(ocr, FailurePolicy::Abort);
        let renderer = FakeRenderer::with_text_pages(1);

        let text = extractor.extract(&renderer, &[1], &NoProgress).await.unwrap();
        assert_eq!(
            text.pages[0].text,
            "Chapter heading for page 1 with enough embedded text to count as a text layer"
        );
        assert_eq!(text.pages[0].method, ExtractionMethod::Native);
    }

    #[tokio::test]
    async fn test_threshold_decides_fallback() {
        let ocr = Arc::new(FakeOcr::default());
        let extractor = use_case(ocr.clone(), FailurePolicy::Abort);
        let mut renderer = FakeRenderer::default();
        renderer.texts.insert(1, vec!["x".repeat(50)]);
        renderer.texts.insert(2, vec![format!("   {}   ", "y".repeat(49))]);

        let text = extractor
            .extract(&renderer, &[1, 2], &NoProgress)
            .await
            .unwrap();

        assert_eq!(text.pages[0].method, ExtractionMethod::Native);
        assert_eq!(text.pages[1].method, ExtractionMethod::Ocr);
        assert_eq!(text.pages[1].text, "recognized text of page 2");
        assert_eq!(*ocr.calls.lock().unwrap(), vec![(2, "eng".to_string())]);
        assert_eq!(*renderer.render_scales.lock().unwrap(), vec![(2, 2.0)]);
    }

    #[tokio::test]
    async fn test_progress_reported_around_recognition() {
        let ocr = Arc::new(FakeOcr {
            failing_pages: HashSet::from([3]),
            ..FakeOcr::default()
        });
        let extractor = use_case(ocr, FailurePolicy::SkipFailedPages);
        let renderer = FakeRenderer::default();
        let progress = RecordingProgress::default();

        extractor
            .extract(&renderer, &[2, 3], &progress)
            .await
            .unwrap();

        assert_eq!(
            *progress.events.lock().unwrap(),
            vec!["start 2", "finish 2 true", "start 3", "finish 3 false"]
        );
    }

    #[tokio::test]
    async fn test_abort_policy_discards_partial_results() {
        let ocr = Arc::new(FakeOcr {
            failing_pages: HashSet::from([2]),
            ..FakeOcr::default()
        });
        let extractor = use_case(ocr, FailurePolicy::Abort);
        let mut renderer = FakeRenderer::with_text_pages(3);
        renderer.texts.remove(&2);

        let result = extractor.extract(&renderer, &[1, 2, 3], &NoProgress).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_native_failure_aborts_batch() {
        let ocr = Arc::new(FakeOcr::default());
        let extractor = use_case(ocr, FailurePolicy::Abort);
        let mut renderer = FakeRenderer::with_text_pages(3);
        renderer.broken_pages.insert(3);

        assert!(extractor
            .extract(&renderer, &[1, 2, 3], &NoProgress)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_skip_policy_keeps_successful_pages() {
        let ocr = Arc::new(FakeOcr::default());
        let extractor = use_case(ocr, FailurePolicy::SkipFailedPages);
        let mut renderer = FakeRenderer::with_text_pages(3);
        renderer.broken_pages.insert(2);

        let text = extractor
            .extract(&renderer, &[1, 2, 3], &NoProgress)
            .await
            .unwrap();
        let numbers: Vec<u32> = text.pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_empty_page_list_is_rejected() {
        let extractor = use_case(Arc::new(FakeOcr::default()), FailurePolicy::Abort);
        let renderer = FakeRenderer::default();
        assert!(matches!(
            extractor.extract(&renderer, &[], &NoProgress).await,
            Err(AppError::ValidationError(_))
        ));
    }
}
