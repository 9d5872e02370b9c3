use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Embedded text-content stream.
    Native,
    /// Rasterized page run through recognition.
    Ocr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    pub page_number: u32,
    pub text: String,
    pub method: ExtractionMethod,
}

/// Text extracted from an ordered list of pages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedText {
    pub pages: Vec<PageText>,
}

impl ExtractedText {
    pub fn new(pages: Vec<PageText>) -> Self {
        Self { pages }
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn ocr_page_count(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| p.method == ExtractionMethod::Ocr)
            .count()
    }

    /// Document-level string: `Page N:` header, page text, blank line between pages.
    pub fn to_document(&self) -> String {
        self.pages
            .iter()
            .map(|p| format!("Page {}:\n{}", p.page_number, p.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_layout() {
        let text = ExtractedText::new(vec![
            PageText {
                page_number: 3,
                text: "alpha".to_string(),
                method: ExtractionMethod::Native,
            },
            PageText {
                page_number: 4,
                text: "beta".to_string(),
                method: ExtractionMethod::Ocr,
            },
        ]);
        assert_eq!(text.to_document(), "Page 3:\nalpha\n\nPage 4:\nbeta");
        assert_eq!(text.ocr_page_count(), 1);
    }
}
