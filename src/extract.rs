//! Full-document extraction entry points.
//!
//! One run is strictly sequential: the OCR pass happens once for the whole
//! document, then pages go to the model one at a time, in page order. Order
//! matters because the author carry flows from each page to the next.

use crate::config::ExtractionConfig;
use crate::error::{PageError, PoemsError};
use crate::output::{ExtractionOutput, ExtractionStats, PageReport, Poem};
use crate::pipeline::filter::{self, AuthorCarry};
use crate::pipeline::input::{self, SourceDocument};
use crate::pipeline::llm::{self, LanguageModel, ProviderModel};
use crate::pipeline::normalize::{self, Page};
use crate::pipeline::ocr::{self, MistralOcrClient, OcrService};
use crate::pipeline::{parse, table};
use crate::prompts;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extract poems from a local anthology PDF.
///
/// This is the primary entry point for the library. OCR goes through the
/// Mistral OCR endpoints using [`ExtractionConfig::resolve_api_key`]; the
/// parsing model goes through `edgequake_llm` (`config.provider`, else
/// `config.provider_name` + `config.parsing_model`, which reads its own key
/// from the environment).
///
/// # Errors
/// Returns `Err(PoemsError)` only for fatal errors:
/// - input missing, unreadable or not a PDF
/// - no API key / provider not configured
/// - any OCR failure
/// - every page's model call failed
///
/// Page-level problems (bad JSON, wrong shape) are reported in
/// [`ExtractionOutput::pages`] and do not fail the run.
pub async fn extract(
    input: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, PoemsError> {
    let source = input::resolve_input(input).await?;
    let api_key = config.resolve_api_key()?;
    let provider = resolve_provider(config)?;

    let ocr_client = MistralOcrClient::new(config, api_key)?;
    let model = ProviderModel::new(provider, config);

    run(source, &ocr_client, &model, config).await
}

/// Like [`extract`], with caller-supplied OCR and model backends.
pub async fn extract_with(
    input: impl AsRef<Path>,
    ocr_service: &dyn OcrService,
    model: &dyn LanguageModel,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, PoemsError> {
    let source = input::resolve_input(input).await?;
    run(source, ocr_service, model, config).await
}

/// Extract poems and write them to a CSV file.
pub async fn extract_to_file(
    input: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionStats, PoemsError> {
    let output = extract(input, config).await?;
    table::write_poems_to_path(output_path.as_ref(), &output.poems).await?;
    Ok(output.stats)
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, PoemsError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PoemsError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(input, config))
}

/// Run the per-page pipeline over already-normalised pages.
///
/// Blank pages are skipped without a model call and get no report. Returns
/// the accepted poems (page order, then in-page order) and one report per
/// non-blank page.
pub async fn extract_pages(
    model: &dyn LanguageModel,
    pages: &[Page],
    config: &ExtractionConfig,
) -> (Vec<Poem>, Vec<PageReport>) {
    let total = pages.len();
    let cb = config.progress_callback.as_deref();
    if let Some(cb) = cb {
        cb.on_extraction_start(total);
    }

    let mut poems: Vec<Poem> = Vec::new();
    let mut reports = Vec::with_capacity(total);
    let mut carry = AuthorCarry::new();

    for page in pages {
        if page.is_blank() {
            debug!("Page {}: no text, skipping", page.number);
            if let Some(cb) = cb {
                cb.on_page_skipped(page.number, total);
            }
            continue;
        }

        if let Some(cb) = cb {
            cb.on_page_start(page.number, total);
        }

        let (outcome, next) = process_page(model, page, carry, poems.len(), config).await;
        carry = next;
        poems.extend(outcome.poems);

        let report = outcome.report;
        match report.error {
            None => {
                info!(
                    "Page {}: items={}, total_kept={}",
                    page.number, report.items, report.total_kept
                );
                if let Some(cb) = cb {
                    cb.on_page_complete(page.number, total, report.items, report.total_kept);
                }
            }
            Some(ref e) => {
                warn!("{}, skipping", e);
                if let Some(cb) = cb {
                    cb.on_page_error(page.number, total, &e.to_string());
                }
            }
        }
        reports.push(report);
    }

    info!("Total poems after filtering: {}", poems.len());
    if let Some(cb) = cb {
        cb.on_extraction_complete(total, poems.len());
    }

    (poems, reports)
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// What one page produced.
struct PageOutcome {
    report: PageReport,
    poems: Vec<Poem>,
}

/// Prompt, complete, parse and filter a single non-blank page.
///
/// Takes the carry from the previous page and returns the updated one; on a
/// page error the carry is returned unchanged.
async fn process_page(
    model: &dyn LanguageModel,
    page: &Page,
    carry: AuthorCarry,
    kept_before: usize,
    config: &ExtractionConfig,
) -> (PageOutcome, AuthorCarry) {
    let start = Instant::now();
    let mut report = PageReport {
        page_num: page.number,
        total_kept: kept_before,
        ..Default::default()
    };

    let prompt = prompts::page_prompt(config.prompt_template.as_deref(), &page.text);

    let parsed = match llm::complete_page(model, page.number, &prompt, config).await {
        Ok(completion) => {
            report.input_tokens = completion.prompt_tokens;
            report.output_tokens = completion.completion_tokens;
            parse::parse_candidates(page.number, &completion.content)
        }
        Err(e) => Err(e),
    };

    let entries = match parsed {
        Ok(entries) => entries,
        Err(e) => {
            report.error = Some(e);
            report.duration_ms = start.elapsed().as_millis() as u64;
            let outcome = PageOutcome {
                report,
                poems: Vec::new(),
            };
            return (outcome, carry);
        }
    };

    let (harvest, carry) =
        filter::harvest_page(page.number, &entries, carry, &config.skip_keywords);

    report.items = harvest.items;
    report.invalid_entries = harvest.invalid_entries;
    report.kept = harvest.poems.len();
    report.total_kept = kept_before + report.kept;
    report.duration_ms = start.elapsed().as_millis() as u64;

    let outcome = PageOutcome {
        report,
        poems: harvest.poems,
    };
    (outcome, carry)
}

/// OCR, normalise, cap, and run the page pipeline.
async fn run(
    source: SourceDocument,
    ocr_service: &dyn OcrService,
    model: &dyn LanguageModel,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, PoemsError> {
    let total_start = Instant::now();
    info!("Starting extraction: {}", source.path.display());
    info!(
        "OCR model: {}, parsing model: {}",
        config.ocr_model, config.parsing_model
    );

    // ── Step 1: OCR the whole document ───────────────────────────────────
    let ocr_start = Instant::now();
    let raw_pages = ocr::recognise_document(
        ocr_service,
        source.bytes,
        &source.file_name,
        &config.ocr_model,
    )
    .await?;
    let ocr_duration_ms = ocr_start.elapsed().as_millis() as u64;

    // ── Step 2: Normalise and cap ────────────────────────────────────────
    let pages = normalize::normalize_pages(&raw_pages);
    let selected = &pages[..config.page_limit(pages.len())];
    info!("Parsing {} of {} pages", selected.len(), pages.len());

    // ── Step 3: Per-page model pass ──────────────────────────────────────
    let llm_start = Instant::now();
    let (poems, reports) = extract_pages(model, selected, config).await;
    let llm_duration_ms = llm_start.elapsed().as_millis() as u64;

    // ── Step 4: Fail if the model never answered ─────────────────────────
    let llm_failures = reports
        .iter()
        .filter(|r| r.error.as_ref().is_some_and(PageError::is_llm_failure))
        .count();
    if !reports.is_empty() && llm_failures == reports.len() {
        let first_error = reports
            .iter()
            .find_map(|r| r.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(PoemsError::AllPagesFailed {
            total: reports.len(),
            retries: config.max_retries,
            first_error,
        });
    }

    // ── Step 5: Stats ────────────────────────────────────────────────────
    let failed = reports.iter().filter(|r| r.error.is_some()).count();
    let stats = ExtractionStats {
        total_pages: pages.len(),
        selected_pages: selected.len(),
        blank_pages: selected.len() - reports.len(),
        processed_pages: reports.len() - failed,
        failed_pages: failed,
        candidates_seen: reports.iter().map(|r| r.items).sum(),
        poems_kept: poems.len(),
        total_input_tokens: reports.iter().map(|r| r.input_tokens as u64).sum(),
        total_output_tokens: reports.iter().map(|r| r.output_tokens as u64).sum(),
        ocr_duration_ms,
        llm_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Extraction complete: {} poems from {}/{} pages, {}ms total",
        stats.poems_kept, stats.processed_pages, stats.selected_pages, stats.total_duration_ms
    );

    Ok(ExtractionOutput {
        poems,
        pages: reports,
        stats,
    })
}

/// Resolve the parsing-model provider.
///
/// 1. **Pre-built provider** (`config.provider`) — used as-is.
/// 2. **Named provider + model** — built by
///    [`ProviderFactory::create_llm_provider`], which reads the matching API
///    key (`MISTRAL_API_KEY` for `mistral`) from the environment.
fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, PoemsError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    ProviderFactory::create_llm_provider(&config.provider_name, &config.parsing_model).map_err(
        |e| PoemsError::ProviderNotConfigured {
            provider: config.provider_name.clone(),
            hint: format!("{e}"),
        },
    )
}
