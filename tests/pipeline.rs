//! Offline integration tests for the full extraction pipeline.
//!
//! OCR and the language model are replaced by in-memory fakes, so these run
//! without network access or API keys.

use async_trait::async_trait;
use edgequake_poems::{
    extract, extract_with, read_poems, write_poems_to_path, Completion, DocumentHandle,
    ExtractionConfig, ExtractionProgressCallback, LanguageModel, ModelError, OcrError,
    OcrService, PageError, Poem, PoemsError,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ── Fakes ────────────────────────────────────────────────────────────────

/// OCR backend returning canned page objects and logging every call.
struct FakeOcr {
    pages: Vec<Value>,
    fail_process: bool,
    calls: Mutex<Vec<&'static str>>,
}

impl FakeOcr {
    fn with_markdown(pages: &[&str]) -> Self {
        Self {
            pages: pages.iter().map(|md| json!({ "markdown": md })).collect(),
            fail_process: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl OcrService for FakeOcr {
    async fn upload(&self, bytes: Vec<u8>, _file_name: &str) -> Result<DocumentHandle, OcrError> {
        assert!(bytes.starts_with(b"%PDF"));
        self.calls.lock().unwrap().push("upload");
        Ok(DocumentHandle { id: "file-1".into() })
    }

    async fn signed_url(&self, _handle: &DocumentHandle) -> Result<String, OcrError> {
        self.calls.lock().unwrap().push("signed_url");
        Ok("https://files.example/file-1".into())
    }

    async fn process(&self, _model: &str, _url: &str) -> Result<Vec<Value>, OcrError> {
        self.calls.lock().unwrap().push("process");
        if self.fail_process {
            return Err(OcrError::Service {
                stage: "process",
                status: 500,
                detail: "internal".into(),
            });
        }
        Ok(self.pages.clone())
    }

    async fn delete(&self, _handle: &DocumentHandle) -> Result<(), OcrError> {
        self.calls.lock().unwrap().push("delete");
        Ok(())
    }
}

/// Model answering prompts from a script, in call order.
struct ScriptedModel {
    responses: Mutex<Vec<Result<String, String>>>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    fn new(responses: &[&str]) -> Self {
        Self::from_results(responses.iter().map(|r| Ok(r.to_string())).collect())
    }

    fn from_results(mut responses: Vec<Result<String, String>>) -> Self {
        responses.reverse();
        Self {
            responses: Mutex::new(responses),
            calls: AtomicUsize::new(0),
        }
    }

    fn always_failing() -> Self {
        Self::from_results(Vec::new())
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, _prompt: &str) -> Result<Completion, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.responses.lock().unwrap().pop() {
            Some(Ok(content)) => Ok(Completion {
                content,
                prompt_tokens: 100,
                completion_tokens: 20,
            }),
            Some(Err(e)) => Err(e.into()),
            None => Err("service unavailable".into()),
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn sample_pdf() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("anthology.pdf");
    std::fs::write(&path, b"%PDF-1.4\n%fake scan\n").unwrap();
    (dir, path)
}

fn fast_config() -> ExtractionConfig {
    ExtractionConfig::builder()
        .retry_backoff_ms(0)
        .build()
        .unwrap()
}

fn poem(author: &str, title: &str, text: &str) -> Poem {
    Poem {
        author: author.into(),
        title: title.into(),
        text: text.into(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn anthology_pages_become_filtered_poems() {
    let (_dir, pdf) = sample_pdf();
    let ocr = FakeOcr::with_markdown(&["страница 1", "страница 2"]);
    let model = ScriptedModel::new(&[
        r#"[
            {"author": "Анна Ахматова", "title_or_first_line": "Песня последней встречи",
             "text": "Так беспомощно грудь холодела,\nНо шаги мои были легки.\nЯ на правую руку надела"},
            {"author": "", "title_or_first_line": "***",
             "text": "Сжала руки под темной вуалью\nОттого, что я терпкой печалью\nНапоила его допьяна"}
        ]"#,
        r#"{"poems": [
            {"author": "Составитель", "title_or_first_line": "Предисловие",
             "text": "Предисловие к изданию\nвторая строка\nтретья строка"},
            {"author": "Блок", "title_or_first_line": "Ночь", "text": "Ночь, улица\nфонарь"}
        ]}"#,
    ]);

    let output = extract_with(&pdf, &ocr, &model, &fast_config())
        .await
        .unwrap();

    assert_eq!(
        output.poems,
        vec![
            poem(
                "Анна Ахматова",
                "Песня последней встречи",
                "Так беспомощно грудь холодела,\nНо шаги мои были легки.\nЯ на правую руку надела",
            ),
            poem(
                "Анна Ахматова",
                "Сжала руки под темной вуалью Оттого,",
                "Сжала руки под темной вуалью\nОттого, что я терпкой печалью\nНапоила его допьяна",
            ),
        ]
    );
    assert_eq!(ocr.calls(), ["upload", "signed_url", "process", "delete"]);

    let stats = &output.stats;
    assert_eq!(stats.total_pages, 2);
    assert_eq!(stats.processed_pages, 2);
    assert_eq!(stats.candidates_seen, 4);
    assert_eq!(stats.poems_kept, 2);
    assert_eq!(stats.total_input_tokens, 200);
    assert_eq!(output.pages[0].total_kept, 2);
    assert_eq!(output.pages[1].kept, 0);
    assert_eq!(output.pages[1].total_kept, 2);
}

#[tokio::test]
async fn unknown_author_until_one_is_named() {
    let (_dir, pdf) = sample_pdf();
    let ocr = FakeOcr::with_markdown(&["p1"]);
    let model = ScriptedModel::new(&[
        r#"[{"author": null, "title_or_first_line": "Первое", "text": "а\nб\nв"}]"#,
    ]);

    let output = extract_with(&pdf, &ocr, &model, &fast_config())
        .await
        .unwrap();
    assert_eq!(output.poems, vec![poem("Unknown", "Первое", "а\nб\nв")]);
}

#[tokio::test]
async fn malformed_page_is_skipped_and_carry_survives() {
    let (_dir, pdf) = sample_pdf();
    let ocr = FakeOcr::with_markdown(&["p1", "p2", "p3"]);
    let model = ScriptedModel::new(&[
        r#"[{"author": "Фет", "title_or_first_line": "Шёпот", "text": "Шёпот,\nробкое дыханье,\nтрели соловья"}]"#,
        "Sorry, I cannot help with that.",
        r#"```json
[{"author": "", "title_or_first_line": "Вечер", "text": "Вечер\nтихий\nсвет"}]
```"#,
    ]);

    let output = extract_with(&pdf, &ocr, &model, &fast_config())
        .await
        .unwrap();

    assert_eq!(output.poems.len(), 2);
    assert_eq!(output.poems[1].author, "Фет");
    assert_eq!(output.stats.failed_pages, 1);
    let errors: Vec<&PageError> = output.errors().collect();
    assert!(matches!(errors[..], [PageError::InvalidJson { page: 2, .. }]));
}

#[tokio::test]
async fn blank_ocr_pages_are_not_sent_to_the_model() {
    let (_dir, pdf) = sample_pdf();
    let ocr = FakeOcr {
        pages: vec![
            json!({ "markdown": "  " }),
            json!({ "text": "только текст" }),
            json!({ "blocks": [] }),
        ],
        fail_process: false,
        calls: Mutex::new(Vec::new()),
    };
    let model = ScriptedModel::new(&["[]"]);

    let output = extract_with(&pdf, &ocr, &model, &fast_config())
        .await
        .unwrap();

    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    assert_eq!(output.stats.blank_pages, 2);
    assert_eq!(output.pages.len(), 1);
    assert_eq!(output.pages[0].page_num, 2);
}

#[tokio::test]
async fn page_cap_limits_model_calls() {
    let (_dir, pdf) = sample_pdf();
    let ocr = FakeOcr::with_markdown(&["p1", "p2", "p3", "p4"]);
    let model = ScriptedModel::new(&["[]", "[]", "[]", "[]"]);
    let config = ExtractionConfig::builder()
        .max_pages(2)
        .retry_backoff_ms(0)
        .build()
        .unwrap();

    let output = extract_with(&pdf, &ocr, &model, &config).await.unwrap();

    assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    assert_eq!(output.stats.total_pages, 4);
    assert_eq!(output.stats.selected_pages, 2);
}

#[tokio::test]
async fn ocr_failure_is_fatal_and_upload_is_deleted() {
    let (_dir, pdf) = sample_pdf();
    let mut ocr = FakeOcr::with_markdown(&["p1"]);
    ocr.fail_process = true;
    let model = ScriptedModel::new(&[]);

    let err = extract_with(&pdf, &ocr, &model, &fast_config())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PoemsError::Ocr(OcrError::Service { status: 500, .. })
    ));
    assert_eq!(ocr.calls(), ["upload", "signed_url", "process", "delete"]);
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn model_retries_then_recovers() {
    let (_dir, pdf) = sample_pdf();
    let ocr = FakeOcr::with_markdown(&["p1"]);
    let model = ScriptedModel::from_results(vec![
        Err("rate limited".into()),
        Ok(r#"[{"author": "Тютчев", "title_or_first_line": "Silentium!", "text": "Молчи,\nскрывайся\nи таи"}]"#.into()),
    ]);

    let output = extract_with(&pdf, &ocr, &model, &fast_config())
        .await
        .unwrap();

    assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    assert_eq!(output.poems.len(), 1);
}

#[tokio::test]
async fn every_page_failing_in_the_model_is_fatal() {
    let (_dir, pdf) = sample_pdf();
    let ocr = FakeOcr::with_markdown(&["p1", "p2"]);
    let model = ScriptedModel::always_failing();
    let config = ExtractionConfig::builder()
        .max_retries(1)
        .retry_backoff_ms(0)
        .build()
        .unwrap();

    let err = extract_with(&pdf, &ocr, &model, &config).await.unwrap_err();

    match err {
        PoemsError::AllPagesFailed { total, retries, .. } => {
            assert_eq!(total, 2);
            assert_eq!(retries, 1);
        }
        other => panic!("expected AllPagesFailed, got {other:?}"),
    }
    assert_eq!(model.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn not_a_pdf_is_rejected_before_ocr() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.pdf");
    std::fs::write(&path, b"hello").unwrap();
    let ocr = FakeOcr::with_markdown(&[]);
    let model = ScriptedModel::new(&[]);

    let err = extract_with(&path, &ocr, &model, &fast_config())
        .await
        .unwrap_err();

    assert!(matches!(err, PoemsError::NotAPdf { .. }));
    assert!(ocr.calls().is_empty());
}

#[tokio::test]
async fn missing_input_file_is_reported() {
    let ocr = FakeOcr::with_markdown(&[]);
    let model = ScriptedModel::new(&[]);
    let err = extract_with("/no/such/anthology.pdf", &ocr, &model, &fast_config())
        .await
        .unwrap_err();
    assert!(matches!(err, PoemsError::FileNotFound { .. }));
}

#[tokio::test]
async fn blank_api_key_fails_fast() {
    let (_dir, pdf) = sample_pdf();
    let config = ExtractionConfig::builder().api_key("   ").build().unwrap();

    let err = extract(&pdf, &config).await.unwrap_err();

    assert!(matches!(
        err,
        PoemsError::MissingCredential {
            env_var: "MISTRAL_API_KEY"
        }
    ));
}

#[tokio::test]
async fn progress_callback_sees_every_page() {
    #[derive(Default)]
    struct Counting {
        started: AtomicUsize,
        completed: AtomicUsize,
        skipped: AtomicUsize,
        errored: AtomicUsize,
        final_kept: AtomicUsize,
    }

    impl ExtractionProgressCallback for Counting {
        fn on_page_start(&self, _page: usize, _total: usize) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }
        fn on_page_complete(&self, _page: usize, _total: usize, _items: usize, _kept: usize) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
        fn on_page_skipped(&self, _page: usize, _total: usize) {
            self.skipped.fetch_add(1, Ordering::SeqCst);
        }
        fn on_page_error(&self, _page: usize, _total: usize, _error: &str) {
            self.errored.fetch_add(1, Ordering::SeqCst);
        }
        fn on_extraction_complete(&self, _total: usize, poems_kept: usize) {
            self.final_kept.store(poems_kept, Ordering::SeqCst);
        }
    }

    let (_dir, pdf) = sample_pdf();
    let ocr = FakeOcr::with_markdown(&["p1", "", "p3"]);
    let model = ScriptedModel::new(&[
        r#"[{"author": "Пушкин", "title_or_first_line": "Зимний вечер", "text": "Буря мглою\nнебо кроет,\nвихри снежные крутя"}]"#,
        "{}",
    ]);
    let counter = Arc::new(Counting::default());
    let config = ExtractionConfig::builder()
        .retry_backoff_ms(0)
        .progress_callback(counter.clone())
        .build()
        .unwrap();

    extract_with(&pdf, &ocr, &model, &config).await.unwrap();

    assert_eq!(counter.started.load(Ordering::SeqCst), 2);
    assert_eq!(counter.completed.load(Ordering::SeqCst), 1);
    assert_eq!(counter.skipped.load(Ordering::SeqCst), 1);
    assert_eq!(counter.errored.load(Ordering::SeqCst), 1);
    assert_eq!(counter.final_kept.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn extracted_poems_round_trip_through_csv() {
    let (dir, pdf) = sample_pdf();
    let ocr = FakeOcr::with_markdown(&["p1"]);
    let model = ScriptedModel::new(&[
        r#"[{"author": "Цветаева", "title_or_first_line": "Моим стихам, написанным так рано", "text": "Моим стихам, написанным так рано,\nЧто и не знала я, что я — поэт,\n\"Сорвавшимся, как брызги из фонтана\""}]"#,
    ]);

    let output = extract_with(&pdf, &ocr, &model, &fast_config())
        .await
        .unwrap();
    let csv_path = dir.path().join("out/poems.csv");
    write_poems_to_path(&csv_path, &output.poems).await.unwrap();

    let back = read_poems(std::fs::File::open(&csv_path).unwrap()).unwrap();
    assert_eq!(back, output.poems);
}
