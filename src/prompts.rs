//! Prompts for segmenting OCR page text into poems.
//!
//! The default prompt lives here so it can be inspected by unit tests and
//! changed in one place. Callers can override it via
//! [`crate::config::ExtractionConfig::prompt_template`].

/// Placeholder replaced by the page's OCR text.
pub const PAGE_TEXT_PLACEHOLDER: &str = "{page_text}";

/// Author value the model is told to use when a poem has no visible author.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Default page prompt.
///
/// Asks for either a bare JSON list or `{"poems": [...]}`; JSON mode on most
/// providers forces a top-level object, so both shapes are accepted downstream.
pub const DEFAULT_PAGE_PROMPT: &str = r#"Analyze the following text extracted from a page of a Russian poetry anthology:

--- OCR TEXT START ---
{page_text}
--- OCR TEXT END ---

Extract all distinct poems, each as an object with:
- author (string; use "Unknown" if missing)
- title_or_first_line (string; if the title is missing or a placeholder such as "***", substitute the first line)
- text (string with line and stanza breaks preserved)

Ignore non-poem content (title pages, tables of contents, page numbers, running headers, epigraphs, front matter).
Output strictly JSON: either a list of these objects or an object of the form {"poems": [...]}."#;

/// Render the page prompt for `page_text`, using `template` when given.
pub fn page_prompt(template: Option<&str>, page_text: &str) -> String {
    template
        .unwrap_or(DEFAULT_PAGE_PROMPT)
        .replace(PAGE_TEXT_PLACEHOLDER, page_text)
}
