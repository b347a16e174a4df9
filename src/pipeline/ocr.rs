//! OCR service adapter: upload → signed URL → process → delete.
//!
//! The OCR engine is a hosted service that works on a URL, not on bytes, so
//! the document has to be uploaded first and a signed URL obtained for it.
//! The upload is a server-side resource owned by this run and must be
//! released on every exit path; [`recognise_document`] guarantees that.
//!
//! The raw page objects are returned untouched (`serde_json::Value`): their
//! shape is service-defined, and choosing the text field is the
//! normalizer's job ([`super::normalize`]).

use crate::config::ExtractionConfig;
use crate::error::{OcrError, PoemsError};
use async_trait::async_trait;
use reqwest::{multipart, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Server-side identifier of an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentHandle {
    pub id: String,
}

/// The four calls the pipeline needs from an OCR backend.
#[async_trait]
pub trait OcrService: Send + Sync {
    /// Upload raw document bytes.
    async fn upload(&self, bytes: Vec<u8>, file_name: &str) -> Result<DocumentHandle, OcrError>;

    /// Obtain a URL the OCR engine can fetch the uploaded document from.
    async fn signed_url(&self, handle: &DocumentHandle) -> Result<String, OcrError>;

    /// Run OCR and return raw page objects in document order.
    async fn process(&self, model: &str, document_url: &str) -> Result<Vec<Value>, OcrError>;

    /// Release the uploaded document.
    async fn delete(&self, handle: &DocumentHandle) -> Result<(), OcrError>;
}

/// Run the full OCR sequence for one document.
///
/// `delete` is always attempted once `upload` succeeded, whatever happens in
/// between. A failed `delete` is logged and does not replace the primary
/// result.
pub async fn recognise_document(
    service: &dyn OcrService,
    bytes: Vec<u8>,
    file_name: &str,
    model: &str,
) -> Result<Vec<Value>, OcrError> {
    info!("Uploading {} for OCR ({} bytes)", file_name, bytes.len());
    let handle = service.upload(bytes, file_name).await?;
    debug!("Uploaded file id: {}", handle.id);

    let result = signed_url_then_process(service, &handle, model).await;

    match service.delete(&handle).await {
        Ok(()) => debug!("Uploaded file {} deleted from server", handle.id),
        Err(e) => warn!("Failed to delete uploaded file {}: {}", handle.id, e),
    }

    result
}

async fn signed_url_then_process(
    service: &dyn OcrService,
    handle: &DocumentHandle,
    model: &str,
) -> Result<Vec<Value>, OcrError> {
    let url = service.signed_url(handle).await?;
    debug!("Signed URL: {}…", url.chars().take(50).collect::<String>());

    info!("Starting OCR with {} (this may take a while)", model);
    let pages = service.process(model, &url).await?;
    info!("OCR complete: {} pages", pages.len());
    Ok(pages)
}

// ── Mistral OCR over HTTPS ───────────────────────────────────────────────

/// [`OcrService`] backed by the Mistral files + OCR REST endpoints.
pub struct MistralOcrClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    id: String,
}

#[derive(Deserialize)]
struct SignedUrlResponse {
    url: String,
}

#[derive(Deserialize)]
struct OcrResponse {
    #[serde(default)]
    pages: Vec<Value>,
}

impl MistralOcrClient {
    /// Build a client from the run configuration and a resolved API key.
    pub fn new(config: &ExtractionConfig, api_key: String) -> Result<Self, PoemsError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.ocr_timeout_secs))
            .build()
            .map_err(|e| PoemsError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.ocr_base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Send a request, map status codes, and return the body text.
    async fn send(
        &self,
        stage: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<String, OcrError> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| OcrError::Transport {
                stage,
                reason: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| OcrError::Transport {
            stage,
            reason: e.to_string(),
        })?;

        if status.is_success() {
            return Ok(body);
        }
        Err(status_error(stage, status, body))
    }
}

fn status_error(stage: &'static str, status: StatusCode, detail: String) -> OcrError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => OcrError::Auth { stage, detail },
        StatusCode::NOT_FOUND => OcrError::NotFound { stage, detail },
        _ => OcrError::Service {
            stage,
            status: status.as_u16(),
            detail,
        },
    }
}

fn decode<T: serde::de::DeserializeOwned>(stage: &'static str, body: &str) -> Result<T, OcrError> {
    serde_json::from_str(body).map_err(|e| OcrError::Transport {
        stage,
        reason: format!("malformed response: {e}"),
    })
}

#[async_trait]
impl OcrService for MistralOcrClient {
    async fn upload(&self, bytes: Vec<u8>, file_name: &str) -> Result<DocumentHandle, OcrError> {
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")
            .map_err(|e| OcrError::Transport {
                stage: "upload",
                reason: e.to_string(),
            })?;
        let form = multipart::Form::new().text("purpose", "ocr").part("file", part);

        let body = self
            .send("upload", self.http.post(self.url("files")).multipart(form))
            .await?;
        let uploaded: UploadResponse = decode("upload", &body)?;
        Ok(DocumentHandle { id: uploaded.id })
    }

    async fn signed_url(&self, handle: &DocumentHandle) -> Result<String, OcrError> {
        let request = self
            .http
            .get(self.url(&format!("files/{}/url", handle.id)))
            .query(&[("expiry", "24")]);
        let body = self.send("signed URL", request).await?;
        let signed: SignedUrlResponse = decode("signed URL", &body)?;
        Ok(signed.url)
    }

    async fn process(&self, model: &str, document_url: &str) -> Result<Vec<Value>, OcrError> {
        let payload = json!({
            "model": model,
            "document": { "type": "document_url", "document_url": document_url },
            "include_image_base64": false,
        });
        let body = self
            .send("process", self.http.post(self.url("ocr")).json(&payload))
            .await?;
        let ocr: OcrResponse = decode("process", &body)?;
        Ok(ocr.pages)
    }

    async fn delete(&self, handle: &DocumentHandle) -> Result<(), OcrError> {
        self.send(
            "delete",
            self.http.delete(self.url(&format!("files/{}", handle.id))),
        )
        .await
        .map(|_| ())
    }
}
