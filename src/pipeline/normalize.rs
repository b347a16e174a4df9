//! Page text normalisation: pick one plain-text body per OCR page.
//!
//! OCR responses are not uniform. Depending on engine and version a page
//! carries rich `markdown`, a flat `text` field, or only a list of `blocks`
//! each holding a fragment. The strategies below are tried in order and the
//! first non-blank result wins.

use serde_json::Value;

/// One page of OCR output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-indexed, sequential in OCR order.
    pub number: usize,
    /// Best available text; empty when the page had none.
    pub text: String,
}

impl Page {
    /// Build a page from a raw OCR page object.
    pub fn from_ocr(number: usize, raw: &Value) -> Self {
        Self {
            number,
            text: page_text(raw).unwrap_or_default(),
        }
    }

    /// True when there is nothing worth sending to the model.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

type Strategy = fn(&Value) -> Option<String>;

const STRATEGIES: &[Strategy] = &[markdown_field, text_field, joined_blocks];

/// Best plain-text representation of a raw OCR page, if any.
pub fn page_text(raw: &Value) -> Option<String> {
    STRATEGIES
        .iter()
        .filter_map(|strategy| strategy(raw))
        .find(|text| !text.trim().is_empty())
}

/// Normalise every raw page, numbering from 1.
pub fn normalize_pages(raw_pages: &[Value]) -> Vec<Page> {
    raw_pages
        .iter()
        .enumerate()
        .map(|(i, raw)| Page::from_ocr(i + 1, raw))
        .collect()
}

fn string_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key).and_then(Value::as_str).map(str::to_string)
}

fn markdown_field(raw: &Value) -> Option<String> {
    string_field(raw, "markdown")
}

fn text_field(raw: &Value) -> Option<String> {
    string_field(raw, "text")
}

fn joined_blocks(raw: &Value) -> Option<String> {
    let blocks = raw.get("blocks")?.as_array()?;
    let fragments: Vec<&str> = blocks
        .iter()
        .map(|b| b.get("text").and_then(Value::as_str).unwrap_or(""))
        .collect();
    Some(fragments.join("\n"))
}
