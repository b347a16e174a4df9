//! CLI binary for edgequake-poems.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and writes the CSV.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_poems::{
    extract, write_poems, write_poems_to_path, ExtractionConfig, ExtractionOutput,
    ExtractionProgressCallback, ProgressCallback, API_KEY_ENV,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a progress bar over pages plus one log line
/// per page with the running poem count.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until the page count is known (OCR runs first).
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("OCR");
        bar.set_message("Uploading and recognising PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Parsing");
        self.bar.reset_eta();
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Parsing {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, items: usize, total_kept: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("→"),
            page_num,
            total,
            dim(&format!("items={items}, total_kept={total_kept}")),
        ));
        self.bar.inc(1);
    }

    fn on_page_skipped(&self, _page_num: usize, _total: usize) {
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(std::iter::once('…')).collect()
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_extraction_complete(&self, _total_pages: usize, poems_kept: usize) {
        self.bar.finish_and_clear();
        let errors = self.errors.load(Ordering::SeqCst);
        if errors == 0 {
            eprintln!("{} {} poems after filtering", green("✔"), bold(&poems_kept.to_string()));
        } else {
            eprintln!(
                "{} {} poems after filtering  ({} pages skipped on errors)",
                cyan("⚠"),
                bold(&poems_kept.to_string()),
                red(&errors.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract to a CSV file
  pdf2poems anthology.pdf -o poems.csv

  # Only the first 20 pages
  pdf2poems --max-pages 20 anthology.pdf -o poems.csv

  # Different parsing model
  pdf2poems --model mistral-medium-latest anthology.pdf -o poems.csv

  # Replace the boilerplate keyword list
  pdf2poems --skip-keywords "Содержание,ISBN,©" anthology.pdf -o poems.csv

  # Full JSON report (poems + per-page stats) on stdout
  pdf2poems --json anthology.pdf > report.json

OUTPUT:
  UTF-8 CSV with header "author,title,text", one row per poem. Poem text
  keeps its line breaks inside a quoted field.

ENVIRONMENT VARIABLES:
  MISTRAL_API_KEY         API key for OCR and parsing (required)
  PDF2POEMS_*             Every flag can also be set as PDF2POEMS_<FLAG>
  RUST_LOG                Override log filter (e.g. edgequake_poems=debug)
"#;

/// Extract poems from scanned anthology PDFs into CSV.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2poems",
    version,
    about = "Extract poems from scanned poetry anthologies (PDF) into CSV",
    long_about = "OCR a scanned poetry anthology with a hosted OCR model, let a language model \
split each page into poems, filter out front matter and fragments, and write the poems \
as CSV (author, title, text).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path.
    input: PathBuf,

    /// Write CSV to this file instead of stdout.
    #[arg(short, long, env = "PDF2POEMS_OUTPUT")]
    output: Option<PathBuf>,

    /// OCR model ID.
    #[arg(long, env = "PDF2POEMS_OCR_MODEL", default_value = "mistral-ocr-latest")]
    ocr_model: String,

    /// Parsing model ID.
    #[arg(long, env = "PDF2POEMS_MODEL", default_value = "mistral-large-latest")]
    model: String,

    /// edgequake-llm provider for the parsing model.
    #[arg(long, env = "PDF2POEMS_PROVIDER", default_value = "mistral")]
    provider: String,

    /// Process only the first N pages (default: whole document).
    #[arg(long, env = "PDF2POEMS_MAX_PAGES")]
    max_pages: Option<usize>,

    /// Comma-separated substrings that disqualify a poem (case-sensitive).
    #[arg(long, env = "PDF2POEMS_SKIP_KEYWORDS", value_delimiter = ',')]
    skip_keywords: Option<Vec<String>>,

    /// Path to a text file with a custom page prompt containing {page_text}.
    #[arg(long, env = "PDF2POEMS_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Retries per page on model failure.
    #[arg(long, env = "PDF2POEMS_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Max model output tokens per page.
    #[arg(long, env = "PDF2POEMS_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// OCR API root URL.
    #[arg(
        long,
        env = "PDF2POEMS_OCR_BASE_URL",
        default_value = edgequake_poems::config::DEFAULT_OCR_BASE_URL
    )]
    ocr_base_url: String,

    /// HTTP timeout for each OCR request in seconds.
    #[arg(long, env = "PDF2POEMS_OCR_TIMEOUT", default_value_t = 300)]
    ocr_timeout: u64,

    /// Output the full JSON report (ExtractionOutput) instead of CSV.
    #[arg(long, env = "PDF2POEMS_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2POEMS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2POEMS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2POEMS_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar already shows per-page lines; keep INFO logs out of
    // its way unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // Fail before any upload when the key is missing.
    config
        .resolve_api_key()
        .with_context(|| format!("Set {API_KEY_ENV} before running pdf2poems"))?;

    // ── Run extraction ───────────────────────────────────────────────────
    let output = extract(&cli.input, &config)
        .await
        .context("Extraction failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if let Some(ref output_path) = cli.output {
        write_poems_to_path(output_path, &output.poems)
            .await
            .context("Failed to write CSV")?;
    } else {
        let stdout = io::stdout();
        write_poems(stdout.lock(), &output.poems).context("Failed to write CSV to stdout")?;
    }

    if !cli.quiet {
        print_summary(&output, cli.output.as_ref().filter(|_| !cli.json));
    }

    Ok(())
}

/// Final summary on stderr.
fn print_summary(output: &ExtractionOutput, written_to: Option<&PathBuf>) {
    let stats = &output.stats;
    let target = written_to
        .map(|p| format!("  →  {}", bold(&p.display().to_string())))
        .unwrap_or_default();
    eprintln!(
        "{}  {} poems  {}/{} pages  {}ms{}",
        if stats.failed_pages == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        stats.poems_kept,
        stats.processed_pages,
        stats.selected_pages,
        stats.total_duration_ms,
        target,
    );
    eprintln!(
        "   {} candidates seen  /  {} blank pages  /  {} tokens in  /  {} tokens out",
        dim(&stats.candidates_seen.to_string()),
        dim(&stats.blank_pages.to_string()),
        dim(&stats.total_input_tokens.to_string()),
        dim(&stats.total_output_tokens.to_string()),
    );
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .ocr_model(&cli.ocr_model)
        .parsing_model(&cli.model)
        .provider_name(&cli.provider)
        .ocr_base_url(&cli.ocr_base_url)
        .ocr_timeout_secs(cli.ocr_timeout)
        .max_retries(cli.max_retries)
        .max_tokens(cli.max_tokens);

    if let Some(n) = cli.max_pages {
        builder = builder.max_pages(n);
    }
    if let Some(ref keywords) = cli.skip_keywords {
        builder = builder.skip_keywords(
            keywords
                .iter()
                .map(|k| k.trim())
                .filter(|k| !k.is_empty())
                .map(str::to_string),
        );
    }
    if let Some(ref path) = cli.prompt_file {
        let template = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt template from {:?}", path))?;
        builder = builder.prompt_template(template);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
