//! Page virtualization for the continuous-scroll viewer.
//!
//! Only pages close to the viewport are rendered for real; every other page
//! is described as a placeholder of the same estimated height so the scroll
//! extent never changes while pages pop in and out.

use crate::domain::error::{AppError, Result};
use crate::domain::page_range::PageRange;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Unscaled height of one page slot in CSS pixels
    pub page_height_px: f64,
    /// Widths below this use `small_scale`
    pub small_breakpoint_px: f64,
    /// Widths below this (and not small) use `medium_scale`
    pub medium_breakpoint_px: f64,
    pub small_scale: f64,
    pub medium_scale: f64,
    /// Pages rendered beyond the visible window, each direction
    pub overscan_pages: usize,
    /// Extra pages kept rendered beyond the overscan, each direction
    pub render_buffer_pages: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            page_height_px: 1100.0,
            small_breakpoint_px: 640.0,
            medium_breakpoint_px: 1024.0,
            small_scale: 0.6,
            medium_scale: 0.8,
            overscan_pages: 2,
            render_buffer_pages: 1,
        }
    }
}

/// Scroll position and container size reported by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub scroll_top: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            scroll_top: 0.0,
            width: 1280.0,
            height: 800.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisibleWindow {
    pub scale: f64,
    /// Height of every page slot, rendered or placeholder
    pub page_height: f64,
    pub total_height: f64,
    /// Page shown in the page indicator
    pub primary_page: u32,
    pub visible_pages: Vec<u32>,
    pub render_pages: Vec<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct PageVirtualizer {
    config: ViewerConfig,
}

impl PageVirtualizer {
    pub fn new(config: ViewerConfig) -> Self {
        Self { config }
    }

    pub fn scale_for_width(&self, width: f64) -> f64 {
        if width < self.config.small_breakpoint_px {
            self.config.small_scale
        } else if width < self.config.medium_breakpoint_px {
            self.config.medium_scale
        } else {
            1.0
        }
    }

    pub fn page_height_for_width(&self, width: f64) -> f64 {
        self.config.page_height_px * self.scale_for_width(width)
    }

    pub fn compute(&self, viewport: &Viewport, range: &PageRange) -> VisibleWindow {
        let scale = self.scale_for_width(viewport.width);
        let page_height = self.config.page_height_px * scale;
        let count = range.len();
        let last_index = count - 1;

        let (first, last) = if page_height > 0.0 {
            let scroll = viewport.scroll_top.max(0.0);
            let first = ((scroll / page_height).floor() as usize).min(last_index);
            let bottom = scroll + viewport.height.max(0.0);
            let last = ((bottom / page_height).ceil() as usize)
                .saturating_sub(1)
                .clamp(first, last_index);
            (first, last)
        } else {
            (0, 0)
        };

        let margin = self.config.overscan_pages + self.config.render_buffer_pages;
        let render_first = first.saturating_sub(margin);
        let render_last = (last + margin).min(last_index);

        let pages_between = |from: usize, to: usize| -> Vec<u32> {
            (from..=to).filter_map(|idx| range.page_at(idx)).collect()
        };

        VisibleWindow {
            scale,
            page_height,
            total_height: page_height * count as f64,
            primary_page: range.page_at(first).unwrap_or(range.start),
            visible_pages: pages_between(first, last),
            render_pages: pages_between(render_first, render_last),
        }
    }

    /// Scroll offset that puts `page` at the top of the viewport.
    pub fn jump_offset(
        &self,
        page: u32,
        range: &PageRange,
        num_pages: u32,
        viewport_width: f64,
    ) -> Result<f64> {
        if page < 1 || page > num_pages {
            return Err(AppError::ValidationError(format!(
                "Please enter a page number between 1 and {}",
                num_pages
            )));
        }
        let index = range.index_of(page).ok_or_else(|| {
            AppError::ValidationError(format!(
                "Page {} is outside the current selection ({}-{})",
                page, range.start, range.end
            ))
        })?;
        Ok(index as f64 * self.page_height_for_width(viewport_width))
    }
}
