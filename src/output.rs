//! Result types: accepted poems plus per-page and whole-run statistics.

use crate::error::PageError;
use serde::{Deserialize, Serialize};

/// One accepted poem, as written to the output table.
///
/// Field order is the column order of the CSV file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poem {
    pub author: String,
    pub title: String,
    pub text: String,
}

/// What happened to a single page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageReport {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Entries the model returned for this page (valid or not).
    pub items: usize,
    /// Poems accepted from this page.
    pub kept: usize,
    /// Poems accepted so far across the whole run, this page included.
    pub total_kept: usize,
    /// Entries that were not JSON objects.
    pub invalid_entries: usize,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    /// Set when the page contributed nothing because of a failure.
    pub error: Option<PageError>,
}

/// Whole-run counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Pages returned by OCR.
    pub total_pages: usize,
    /// Pages examined after applying the page cap.
    pub selected_pages: usize,
    /// Selected pages with no usable OCR text.
    pub blank_pages: usize,
    /// Pages whose model response was parsed.
    pub processed_pages: usize,
    /// Pages that yielded a [`PageError`].
    pub failed_pages: usize,
    pub candidates_seen: usize,
    pub poems_kept: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub ocr_duration_ms: u64,
    pub llm_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything produced by [`crate::extract`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// Accepted poems in page order, then in-page order.
    pub poems: Vec<Poem>,
    /// One report per non-blank selected page, in page order.
    pub pages: Vec<PageReport>,
    pub stats: ExtractionStats,
}

impl ExtractionOutput {
    /// Page errors, in page order.
    pub fn errors(&self) -> impl Iterator<Item = &PageError> {
        self.pages.iter().filter_map(|p| p.error.as_ref())
    }
}
