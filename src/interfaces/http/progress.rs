use crate::application::use_cases::text_extraction::ExtractionProgress;
use serde::Serialize;
use std::sync::Mutex;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub running: bool,
    /// Page currently going through recognition, if any
    pub recognizing_page: Option<u32>,
    pub recognized_pages: u32,
    pub failed_pages: Vec<u32>,
}

/// Shared view of the extraction in flight, polled by the UI.
#[derive(Default)]
pub struct ExtractionTracker {
    state: Mutex<ProgressSnapshot>,
}

impl ExtractionTracker {
    fn update(&self, f: impl FnOnce(&mut ProgressSnapshot)) {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
    }

    /// Claim the tracker for a new run; `false` while another run is still going.
    pub fn try_start(&self) -> bool {
        match self.state.lock() {
            Ok(mut state) if !state.running => {
                *state = ProgressSnapshot {
                    running: true,
                    ..ProgressSnapshot::default()
                };
                true
            }
            _ => false,
        }
    }

    pub fn finish(&self) {
        self.update(|s| {
            s.running = false;
            s.recognizing_page = None;
        });
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

impl ExtractionProgress for ExtractionTracker {
    fn recognition_started(&self, page_number: u32) {
        self.update(|s| s.recognizing_page = Some(page_number));
    }

    fn recognition_finished(&self, page_number: u32, success: bool) {
        self.update(|s| {
            s.recognizing_page = None;
            if success {
                s.recognized_pages += 1;
            } else {
                s.failed_pages.push(page_number);
            }
        });
    }
}
