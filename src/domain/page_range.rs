use serde::{Deserialize, Serialize};

/// Contiguous, 1-based, inclusive range of page numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    /// `1..=num_pages`. A document always has at least one page.
    pub fn full(num_pages: u32) -> Self {
        Self {
            start: 1,
            end: num_pages.max(1),
        }
    }

    /// Subrange of a `num_pages` document, or `None` unless `1 <= start <= end <= num_pages`.
    pub fn checked(start: u32, end: u32, num_pages: u32) -> Option<Self> {
        if start < 1 || start > end || end > num_pages {
            return None;
        }
        Some(Self { start, end })
    }

    pub fn len(&self) -> usize {
        (self.end - self.start + 1) as usize
    }

    pub fn contains(&self, page: u32) -> bool {
        page >= self.start && page <= self.end
    }

    /// Position of `page` inside the range.
    pub fn index_of(&self, page: u32) -> Option<usize> {
        self.contains(page).then(|| (page - self.start) as usize)
    }

    pub fn page_at(&self, index: usize) -> Option<u32> {
        if index < self.len() {
            Some(self.start + index as u32)
        } else {
            None
        }
    }

    pub fn pages(&self) -> Vec<u32> {
        (self.start..=self.end).collect()
    }
}
