//! Configuration types for poem extraction.
//!
//! All run behaviour is controlled through [`ExtractionConfig`], built via
//! its [`ExtractionConfigBuilder`]. Every knob lives in one struct so a run
//! can be logged, compared with another run, or reproduced exactly.

use crate::error::PoemsError;
use crate::progress::ProgressCallback;
use crate::prompts::PAGE_TEXT_PLACEHOLDER;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Environment variable holding the API key for both OCR and parsing calls.
pub const API_KEY_ENV: &str = "MISTRAL_API_KEY";

/// Default OCR endpoint root.
pub const DEFAULT_OCR_BASE_URL: &str = "https://api.mistral.ai/v1";

/// Substrings that mark anthology boilerplate rather than poem text:
/// table of contents, ISBN line, copyright sign, anthology section header,
/// foreword. Matched case-sensitively.
pub const DEFAULT_SKIP_KEYWORDS: &[&str] = &["Содержание", "ISBN", "©", "Антология", "Предисловие"];

/// Configuration for a poem-extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_poems::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .parsing_model("mistral-large-latest")
///     .max_pages(20)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_pages, Some(20));
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// OCR model identifier. Default: `mistral-ocr-latest`.
    pub ocr_model: String,

    /// Model used to segment page text into poems. Default: `mistral-large-latest`.
    pub parsing_model: String,

    /// edgequake-llm provider name for the parsing model. Default: `mistral`.
    pub provider_name: String,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// API key. When `None`, read from [`API_KEY_ENV`] at run time.
    pub api_key: Option<String>,

    /// Root URL of the OCR REST API.
    pub ocr_base_url: String,

    /// HTTP timeout for each OCR request in seconds. Default: 300.
    ///
    /// The `process` call on a 200-page scan routinely takes minutes.
    pub ocr_timeout_secs: u64,

    /// Sampling temperature for the parsing model. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the model may generate per page. Default: 4096.
    pub max_tokens: usize,

    /// Maximum retry attempts on a failed model call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Process only the first N pages. Default: `None` (whole document).
    pub max_pages: Option<usize>,

    /// Candidates whose text contains any of these substrings are dropped.
    pub skip_keywords: Vec<String>,

    /// Custom page prompt. Must contain `{page_text}`. If None, uses built-in default.
    pub prompt_template: Option<String>,

    /// Optional progress callback for per-page events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            ocr_model: "mistral-ocr-latest".to_string(),
            parsing_model: "mistral-large-latest".to_string(),
            provider_name: "mistral".to_string(),
            provider: None,
            api_key: None,
            ocr_base_url: DEFAULT_OCR_BASE_URL.to_string(),
            ocr_timeout_secs: 300,
            temperature: 0.0,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            max_pages: None,
            skip_keywords: DEFAULT_SKIP_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            prompt_template: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("ocr_model", &self.ocr_model)
            .field("parsing_model", &self.parsing_model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("ocr_base_url", &self.ocr_base_url)
            .field("ocr_timeout_secs", &self.ocr_timeout_secs)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("max_pages", &self.max_pages)
            .field("skip_keywords", &self.skip_keywords)
            .field("prompt_template", &self.prompt_template.as_ref().map(|_| "<custom>"))
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The API key from config, else from the environment.
    ///
    /// Fails with `MissingCredential` when neither is set.
    pub fn resolve_api_key(&self) -> Result<String, PoemsError> {
        let key = match self.api_key {
            Some(ref k) => k.clone(),
            None => std::env::var(API_KEY_ENV).unwrap_or_default(),
        };
        if key.trim().is_empty() {
            return Err(PoemsError::MissingCredential {
                env_var: API_KEY_ENV,
            });
        }
        Ok(key)
    }

    /// Number of pages to feed the model out of `total` OCR pages.
    pub fn page_limit(&self, total: usize) -> usize {
        self.max_pages.map_or(total, |cap| cap.min(total))
    }
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl fmt::Debug for ExtractionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ExtractionConfigBuilder {
    pub fn ocr_model(mut self, model: impl Into<String>) -> Self {
        self.config.ocr_model = model.into();
        self
    }

    pub fn parsing_model(mut self, model: impl Into<String>) -> Self {
        self.config.parsing_model = model.into();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn ocr_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.ocr_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs.max(1);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = Some(n);
        self
    }

    pub fn skip_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.skip_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn prompt_template(mut self, template: impl Into<String>) -> Self {
        self.config.prompt_template = Some(template.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, PoemsError> {
        let c = &self.config;
        if c.ocr_model.trim().is_empty() || c.parsing_model.trim().is_empty() {
            return Err(PoemsError::InvalidConfig(
                "Model identifiers must not be empty".into(),
            ));
        }
        if c.max_pages == Some(0) {
            return Err(PoemsError::InvalidConfig(
                "max_pages must be ≥ 1 (omit it to process every page)".into(),
            ));
        }
        if c.skip_keywords.iter().any(|k| k.is_empty()) {
            return Err(PoemsError::InvalidConfig(
                "Skip keywords must not be empty strings".into(),
            ));
        }
        if let Some(ref t) = c.prompt_template {
            if !t.contains(PAGE_TEXT_PLACEHOLDER) {
                return Err(PoemsError::InvalidConfig(format!(
                    "Prompt template must contain {PAGE_TEXT_PLACEHOLDER}"
                )));
            }
        }
        Ok(self.config)
    }
}
