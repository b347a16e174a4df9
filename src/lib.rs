//! # edgequake-poems
//!
//! Extract individual poems from scanned poetry anthologies (PDF) into a
//! CSV table of `author, title, text`.
//!
//! A hosted OCR engine reads the scan; a language model then segments each
//! page's text into poems. Cheap deterministic rules clean up after the
//! model: authors stated once are carried over to the following poems, short
//! fragments and front-matter boilerplate are dropped, and placeholder
//! titles (`***`) are replaced by the poem's opening words.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      read the local file, check %PDF magic
//!  ├─ 2. OCR        upload → signed URL → process → delete (always)
//!  ├─ 3. Normalize  markdown / text / blocks → one text per page
//!  ├─ 4. LLM        one JSON-mode prompt per page, in page order
//!  ├─ 5. Filter     author carry, ≥ 3 lines, skip keywords, titles
//!  └─ 6. Output     CSV (author,title,text) + per-page stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_poems::{extract_to_file, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads MISTRAL_API_KEY from the environment.
//!     let config = ExtractionConfig::default();
//!     let stats = extract_to_file("anthology.pdf", "poems.csv", &config).await?;
//!     eprintln!("{} poems from {} pages", stats.poems_kept, stats.processed_pages);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2poems` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, API_KEY_ENV, DEFAULT_SKIP_KEYWORDS};
pub use error::{OcrError, PageError, PoemsError};
pub use extract::{extract, extract_pages, extract_sync, extract_to_file, extract_with};
pub use output::{ExtractionOutput, ExtractionStats, PageReport, Poem};
pub use pipeline::filter::{AuthorCarry, PoemCandidate};
pub use pipeline::llm::{Completion, LanguageModel, ModelError, ProviderModel};
pub use pipeline::normalize::Page;
pub use pipeline::ocr::{DocumentHandle, MistralOcrClient, OcrService};
pub use pipeline::table::{read_poems, write_poems, write_poems_to_path};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
