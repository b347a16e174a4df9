//! Pipeline stages for poem extraction.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and swapped (e.g. another OCR backend) without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ ocr ──▶ normalize ──▶ llm ──▶ parse ──▶ filter ──▶ table
//! (PDF)   (upload,  (best text   (one    (JSON    (carry,    (CSV)
//!          process,  per page)    prompt  shape)   filters,
//!          delete)                /page)           titles)
//! ```
//!
//! 1. [`input`]     — read the local PDF and check its magic bytes
//! 2. [`ocr`]       — once-per-document OCR with guaranteed upload cleanup
//! 3. [`normalize`] — pick markdown / text / blocks for each page
//! 4. [`llm`]       — one model call per page, retried with backoff
//! 5. [`parse`]     — accept a list or `{"poems": [...]}`
//! 6. [`filter`]    — author carry, line and keyword filters, titles
//! 7. [`table`]     — write (and read back) the CSV

pub mod filter;
pub mod input;
pub mod llm;
pub mod normalize;
pub mod ocr;
pub mod parse;
pub mod table;
