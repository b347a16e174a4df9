//! Error types for the edgequake-poems library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`PoemsError`] — **Fatal**: the run cannot proceed at all (missing
//!   input file, missing credential, OCR rejected the document, output not
//!   writable). Returned as `Err(PoemsError)` from the top-level `extract*`
//!   functions.
//!
//! * [`OcrError`] — failures at the OCR service boundary. Always fatal for
//!   the run (the OCR pass is once-per-document), wrapped in
//!   [`PoemsError::Ocr`].
//!
//! * [`PageError`] — **Non-fatal**: a single page could not be turned into
//!   poem candidates (model returned garbage, model unreachable after
//!   retries). Stored inside [`crate::output::PageReport`]; the run moves on
//!   to the next page.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-poems library.
#[derive(Debug, Error)]
pub enum PoemsError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Service errors ────────────────────────────────────────────────────
    /// No API credential was supplied.
    #[error("No API key configured.\nSet {env_var} in the environment.")]
    MissingCredential { env_var: &'static str },

    /// The OCR pass failed; nothing downstream can run.
    #[error(transparent)]
    Ocr(#[from] OcrError),

    /// The parsing model provider could not be constructed.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Every page that reached the model failed after all retries.
    #[error("All {total} pages failed after {retries} retries each.\nFirst error: {first_error}")]
    AllPagesFailed {
        total: usize,
        retries: u32,
        first_error: String,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output CSV file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures at the OCR service boundary.
#[derive(Debug, Error)]
pub enum OcrError {
    /// Network failure, timeout, or an unreadable response body.
    #[error("OCR {stage} failed: {reason}\nCheck your internet connection.")]
    Transport { stage: &'static str, reason: String },

    /// The service rejected the credential (HTTP 401/403).
    #[error("OCR service rejected the API key during {stage}: {detail}")]
    Auth { stage: &'static str, detail: String },

    /// The uploaded document (or endpoint) does not exist (HTTP 404).
    #[error("OCR {stage}: document not found: {detail}")]
    NotFound { stage: &'static str, detail: String },

    /// The service refused or could not process the document.
    #[error("OCR {stage} returned HTTP {status}: {detail}")]
    Service {
        stage: &'static str,
        status: u16,
        detail: String,
    },
}

/// A non-fatal error for a single page.
///
/// Stored in [`crate::output::PageReport`] when a page yields nothing.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The model response is not valid JSON.
    #[error("Page {page}: model response is not valid JSON: {detail}")]
    InvalidJson { page: usize, detail: String },

    /// Valid JSON, but neither a list nor an object with a `poems` list.
    #[error("Page {page}: unexpected response shape ({found})")]
    UnexpectedShape { page: usize, found: String },

    /// LLM call failed after retries.
    #[error("Page {page}: LLM call failed after {retries} retries: {detail}")]
    LlmFailed {
        page: usize,
        retries: u8,
        detail: String,
    },
}

impl PageError {
    /// Page number this error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::InvalidJson { page, .. }
            | PageError::UnexpectedShape { page, .. }
            | PageError::LlmFailed { page, .. } => *page,
        }
    }

    /// True when the model itself could not be reached.
    pub fn is_llm_failure(&self) -> bool {
        matches!(self, PageError::LlmFailed { .. })
    }
}
