//! Language-model interaction: send one page prompt, get one JSON answer.
//!
//! The pipeline talks to a [`LanguageModel`], a one-method seam that takes a
//! prompt and returns the model's text. [`ProviderModel`] adapts any
//! `edgequake_llm` provider to it with deterministic sampling and JSON
//! response format; tests substitute scripted models.
//!
//! ## Retry Strategy
//!
//! Transient provider errors (429/503, dropped connections) are retried with
//! exponential backoff (`retry_backoff_ms * 2^(attempt - 1)`). With the defaults
//! the waits are 500 ms → 1 s → 2 s. A single wait never exceeds
//! [`MAX_BACKOFF_MS`]. Once retries are exhausted the page is reported as
//! [`PageError::LlmFailed`] and the run moves on.

use crate::config::ExtractionConfig;
use crate::error::PageError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Upper bound on a single retry wait.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Error type returned by [`LanguageModel::complete`].
pub type ModelError = Box<dyn std::error::Error + Send + Sync>;

/// A model answer plus token accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

impl Completion {
    /// A completion carrying only text (token counts unknown).
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }
}

/// Anything that can answer a single-prompt completion.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<Completion, ModelError>;
}

/// [`LanguageModel`] backed by an `edgequake_llm` provider.
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl ProviderModel {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
        }
    }
}

#[async_trait]
impl LanguageModel for ProviderModel {
    async fn complete(&self, prompt: &str) -> Result<Completion, ModelError> {
        let messages = vec![ChatMessage::user(prompt)];
        let response = self.provider.chat(&messages, Some(&self.options)).await?;
        Ok(Completion {
            content: response.content,
            prompt_tokens: response.prompt_tokens,
            completion_tokens: response.completion_tokens,
        })
    }
}

/// Build `CompletionOptions` from the extraction config.
fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        response_format: Some("json_object".to_string()),
        ..Default::default()
    }
}

/// Ask the model about one page, retrying transient failures.
pub async fn complete_page(
    model: &dyn LanguageModel,
    page_num: usize,
    prompt: &str,
    config: &ExtractionConfig,
) -> Result<Completion, PageError> {
    let mut last_err: Option<String> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = backoff_ms(config.retry_backoff_ms, attempt);
            warn!(
                "Page {}: retry {}/{} after {}ms",
                page_num, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match model.complete(prompt).await {
            Ok(completion) => {
                debug!(
                    "Page {}: {} input tokens, {} output tokens",
                    page_num, completion.prompt_tokens, completion.completion_tokens
                );
                return Ok(completion);
            }
            Err(e) => {
                let err_msg = e.to_string();
                warn!("Page {}: attempt {} failed — {}", page_num, attempt + 1, err_msg);
                last_err = Some(err_msg);
            }
        }
    }

    Err(PageError::LlmFailed {
        page: page_num,
        retries: config.max_retries.min(u8::MAX as u32) as u8,
        detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
    })
}

/// Wait before retry `attempt` (1-based), saturating and capped.
fn backoff_ms(base_ms: u64, attempt: u32) -> u64 {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    base_ms.saturating_mul(factor).min(MAX_BACKOFF_MS)
}
