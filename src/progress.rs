//! Progress-callback trait for per-page extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the pipeline walks the document. The library does not care how
//! the host reports progress (terminal bar, log line, channel).
//!
//! # Example
//!
//! ```rust
//! use edgequake_poems::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ExtractionProgressCallback for Printer {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, items: usize, total_kept: usize) {
//!         eprintln!("Page {page_num}/{total_pages}: items={items}, total_kept={total_kept}");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the extraction pipeline as it processes each page.
///
/// Pages are processed strictly in order, one at a time, so events for a
/// given run never interleave. All methods default to no-ops.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once after OCR, before the first page is sent to the model.
    ///
    /// `total_pages` is the number of pages that will be examined (after
    /// any page cap).
    fn on_extraction_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before the model request for a page.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page's model response was parsed.
    ///
    /// * `items`      — entries the model returned for this page
    /// * `total_kept` — poems accepted so far, across all pages
    fn on_page_complete(
        &self,
        page_num: usize,
        total_pages: usize,
        items: usize,
        total_kept: usize,
    ) {
        let _ = (page_num, total_pages, items, total_kept);
    }

    /// Called for pages whose OCR text was blank (no model call made).
    fn on_page_skipped(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page yields nothing because of a [`crate::PageError`].
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after all pages have been attempted.
    fn on_extraction_complete(&self, total_pages: usize, poems_kept: usize) {
        let _ = (total_pages, poems_kept);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
