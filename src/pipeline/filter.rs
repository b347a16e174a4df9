//! Candidate filtering: authorship carry, length and keyword filters, titles.
//!
//! Anthologies usually name an author once above a run of poems; later
//! pages of that run carry no author at all. [`AuthorCarry`] remembers the
//! last explicit author and lends it to candidates that have none. It is a
//! plain value: each step takes it by value and hands back the updated one,
//! so a page can be processed (and tested) in isolation given the carry
//! from the page before.

use crate::output::Poem;
use crate::prompts::UNKNOWN_AUTHOR;
use serde_json::Value;
use tracing::{debug, warn};

/// Titles the model uses when a poem has no real title.
pub const PLACEHOLDER_TITLES: &[&str] = &["***", "*"];

/// Candidates with fewer non-blank lines are not poems.
pub const MIN_POEM_LINES: usize = 3;

/// Words of the text used as a substitute title.
pub const TITLE_FALLBACK_WORDS: usize = 6;

/// The last explicit author seen in this run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorCarry {
    last_author: Option<String>,
}

impl AuthorCarry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update from a candidate's raw author field.
    ///
    /// Blank values and the `"Unknown"` sentinel leave the carry unchanged.
    pub fn observe(self, raw_author: &str) -> Self {
        let author = raw_author.trim();
        if author.is_empty() || author == UNKNOWN_AUTHOR {
            return self;
        }
        Self {
            last_author: Some(author.to_string()),
        }
    }

    /// Author to attribute to the current candidate.
    pub fn resolved(&self) -> &str {
        self.last_author.as_deref().unwrap_or(UNKNOWN_AUTHOR)
    }

    pub fn last_author(&self) -> Option<&str> {
        self.last_author.as_deref()
    }
}

/// One poem as proposed by the model, before any filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoemCandidate {
    pub author: String,
    pub title_or_first_line: String,
    pub text: String,
}

impl PoemCandidate {
    /// Read a candidate from a response entry; `None` unless it is an object.
    ///
    /// Scalar author/title values are stringified; `null` or missing fields
    /// become empty. A `text` that is not a string is treated as empty.
    pub fn from_value(entry: &Value) -> Option<Self> {
        let obj = entry.as_object()?;
        Some(Self {
            author: scalar_string(obj.get("author")),
            title_or_first_line: scalar_string(obj.get("title_or_first_line")),
            text: obj
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
    }
}

fn scalar_string(v: Option<&Value>) -> String {
    match v {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Count of lines that contain something other than whitespace.
///
/// Any of `\n`, `\r`, `\r\n` and the Unicode line/paragraph separators ends a
/// line; OCR output mixes them.
pub fn non_blank_lines(text: &str) -> usize {
    text.split(is_line_break)
        .filter(|l| !l.trim().is_empty())
        .count()
}

fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n'
            | '\r'
            | '\x0b'
            | '\x0c'
            | '\x1c'
            | '\x1d'
            | '\x1e'
            | '\u{85}'
            | '\u{2028}'
            | '\u{2029}'
    )
}

/// First configured keyword found in `text` (case-sensitive).
pub fn excluded_by<'k>(text: &str, skip_keywords: &'k [String]) -> Option<&'k str> {
    skip_keywords
        .iter()
        .map(String::as_str)
        .find(|k| text.contains(k))
}

/// First [`TITLE_FALLBACK_WORDS`] whitespace-separated tokens of `text`.
pub fn fallback_title(text: &str) -> String {
    text.split_whitespace()
        .take(TITLE_FALLBACK_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Final title: trimmed raw title, or the fallback when it is blank or a placeholder.
pub fn resolve_title(raw_title: &str, text: &str) -> String {
    let title = raw_title.trim();
    if title.is_empty() || PLACEHOLDER_TITLES.contains(&title) {
        fallback_title(text)
    } else {
        title.to_string()
    }
}

/// Apply carry, filters and title resolution to one candidate.
///
/// The carry is updated before filtering, so an author named on a candidate
/// that is later dropped still applies to the candidates after it.
pub fn accept(
    candidate: PoemCandidate,
    carry: AuthorCarry,
    skip_keywords: &[String],
) -> (Option<Poem>, AuthorCarry) {
    let carry = carry.observe(&candidate.author);
    let text = candidate.text.trim();

    let lines = non_blank_lines(text);
    if lines < MIN_POEM_LINES {
        debug!("Dropping candidate with {} non-blank lines", lines);
        return (None, carry);
    }
    if let Some(keyword) = excluded_by(text, skip_keywords) {
        debug!("Dropping candidate containing {:?}", keyword);
        return (None, carry);
    }

    let poem = Poem {
        author: carry.resolved().to_string(),
        title: resolve_title(&candidate.title_or_first_line, text),
        text: text.to_string(),
    };
    (Some(poem), carry)
}

/// Outcome of filtering one page's response entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageHarvest {
    pub poems: Vec<Poem>,
    /// Entries in the response, valid or not.
    pub items: usize,
    /// Entries that were not JSON objects.
    pub invalid_entries: usize,
}

/// Filter every entry of one page, in order.
pub fn harvest_page(
    page_num: usize,
    entries: &[Value],
    carry: AuthorCarry,
    skip_keywords: &[String],
) -> (PageHarvest, AuthorCarry) {
    let mut harvest = PageHarvest {
        items: entries.len(),
        ..Default::default()
    };
    let mut carry = carry;

    for (i, entry) in entries.iter().enumerate() {
        let Some(candidate) = PoemCandidate::from_value(entry) else {
            warn!("Page {}: skipping invalid poem entry #{}", page_num, i + 1);
            harvest.invalid_entries += 1;
            continue;
        };
        let (poem, next) = accept(candidate, carry, skip_keywords);
        carry = next;
        harvest.poems.extend(poem);
    }

    (harvest, carry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SKIP_KEYWORDS;
    use serde_json::json;

    fn keywords() -> Vec<String> {
        DEFAULT_SKIP_KEYWORDS.iter().map(|s| s.to_string()).collect()
    }

    fn candidate(author: &str, title: &str, text: &str) -> PoemCandidate {
        PoemCandidate {
            author: author.into(),
            title_or_first_line: title.into(),
            text: text.into(),
        }
    }

    const THREE_LINES: &str = "Строка один\nСтрока два\nСтрока три";

    #[test]
    fn carry_starts_unknown() {
        let carry = AuthorCarry::new();
        assert_eq!(carry.resolved(), "Unknown");
        assert_eq!(carry.last_author(), None);
    }

    #[test]
    fn carry_ignores_blank_and_sentinel() {
        let carry = AuthorCarry::new().observe("Ахматова");
        assert_eq!(carry.clone().observe("").resolved(), "Ахматова");
        assert_eq!(carry.clone().observe("   ").resolved(), "Ахматова");
        assert_eq!(carry.clone().observe("Unknown").resolved(), "Ахматова");
        assert_eq!(carry.clone().observe(" Unknown ").resolved(), "Ахматова");
        assert_eq!(carry.observe(" Блок ").resolved(), "Блок");
    }

    #[test]
    fn placeholder_title_without_author() {
        let (poem, carry) = accept(
            candidate("", "***", THREE_LINES),
            AuthorCarry::new(),
            &keywords(),
        );
        let poem = poem.expect("three lines kept");
        assert_eq!(poem.title, "Строка один Строка два Строка три");
        assert_eq!(poem.author, "Unknown");
        assert_eq!(carry.last_author(), None);
    }

    #[test]
    fn author_carried_to_next_candidate() {
        let kw = keywords();
        let (first, carry) = accept(
            candidate("Ахматова", "Песня", THREE_LINES),
            AuthorCarry::new(),
            &kw,
        );
        assert_eq!(first.unwrap().author, "Ахматова");
        let (second, _) = accept(candidate("", "Другая", THREE_LINES), carry, &kw);
        assert_eq!(second.unwrap().author, "Ахматова");
    }

    #[test]
    fn dropped_candidate_still_sets_author() {
        let kw = keywords();
        let (dropped, carry) =
            accept(candidate("Блок", "", "одна\nдве"), AuthorCarry::new(), &kw);
        assert!(dropped.is_none());
        let (kept, _) = accept(candidate("Unknown", "", THREE_LINES), carry, &kw);
        assert_eq!(kept.unwrap().author, "Блок");
    }

    #[test]
    fn line_threshold() {
        let kw = keywords();
        let (two, _) = accept(candidate("", "t", "a\n\n   \nb"), AuthorCarry::new(), &kw);
        assert!(two.is_none());
        let (three, _) = accept(candidate("", "t", "a\n\nb\n  \nc"), AuthorCarry::new(), &kw);
        assert!(three.is_some());
    }

    #[test]
    fn carriage_returns_end_lines() {
        assert_eq!(non_blank_lines("a\rb\rc"), 3);
        assert_eq!(non_blank_lines("a\r\nb\r\n\r\nc"), 3);
        assert_eq!(non_blank_lines("a\u{2028}b\u{2029}c"), 3);
        let (poem, _) = accept(candidate("", "t", "a\rb\rc"), AuthorCarry::new(), &keywords());
        assert!(poem.is_some());
    }

    #[test]
    fn isbn_dropped_regardless_of_length() {
        let text = "Первая\nВторая\nТретья\nЧетвёртая\nISBN 978-5-00000-000-0";
        let (poem, _) = accept(candidate("", "t", text), AuthorCarry::new(), &keywords());
        assert!(poem.is_none());
    }

    #[test]
    fn keyword_match_is_case_sensitive() {
        let kw = keywords();
        assert_eq!(excluded_by("© 2023", &kw), Some("©"));
        assert_eq!(excluded_by("isbn lower case", &kw), None);
        assert_eq!(excluded_by("содержание", &kw), None);
    }

    #[test]
    fn text_is_trimmed() {
        let (poem, _) = accept(
            candidate("", "T", "\n\n  a\nb\nc  \n\n"),
            AuthorCarry::new(),
            &keywords(),
        );
        assert_eq!(poem.unwrap().text, "a\nb\nc");
    }

    #[test]
    fn title_resolution() {
        let text = "один два три четыре пять шесть семь\nвосемь\nдевять";
        assert_eq!(resolve_title("*", text), "один два три четыре пять шесть");
        assert_eq!(resolve_title("  ", text), "один два три четыре пять шесть");
        assert_eq!(resolve_title(" Зима ", text), "Зима");
        assert_eq!(resolve_title("** *", text), "** *");
    }

    #[test]
    fn title_resolution_idempotent() {
        let text = "один два\nтри\nчетыре";
        for raw in ["Зима", "***", "", "  Весна  "] {
            let once = resolve_title(raw, text);
            assert_eq!(resolve_title(&once, text), once);
        }
    }

    #[test]
    fn candidate_from_value() {
        let c = PoemCandidate::from_value(&json!({
            "author": 17,
            "title_or_first_line": null,
            "text": "x"
        }))
        .unwrap();
        assert_eq!(c.author, "17");
        assert_eq!(c.title_or_first_line, "");
        assert_eq!(c.text, "x");

        let c = PoemCandidate::from_value(&json!({"text": ["not", "a", "string"]})).unwrap();
        assert_eq!(c.text, "");

        assert!(PoemCandidate::from_value(&json!("just text")).is_none());
        assert!(PoemCandidate::from_value(&json!([1, 2])).is_none());
    }

    #[test]
    fn harvest_counts_and_skips_invalid_entries() {
        let entries = vec![
            json!({"author": "Цветаева", "title_or_first_line": "***", "text": THREE_LINES}),
            json!("stray string"),
            json!({"author": "", "title_or_first_line": "Короткое", "text": "одна строка"}),
            json!({"title_or_first_line": "Второе", "text": THREE_LINES}),
        ];
        let (harvest, carry) = harvest_page(3, &entries, AuthorCarry::new(), &keywords());
        assert_eq!(harvest.items, 4);
        assert_eq!(harvest.invalid_entries, 1);
        assert_eq!(harvest.poems.len(), 2);
        assert!(harvest.poems.iter().all(|p| p.author == "Цветаева"));
        assert_eq!(harvest.poems[1].title, "Второе");
        assert_eq!(carry.last_author(), Some("Цветаева"));
    }
}
