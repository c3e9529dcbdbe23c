//! HTML-to-PDF conversion.
//!
//! Invoices are converted by posting the print document to a pdfshift-style
//! HTTP API. The renderer sits behind a trait so it can be disabled or mocked.

use crate::config::PdfConfig;
use crate::services::metrics::PDF_RENDER_DURATION;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Serialize;
use service_core::error::AppError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("PDF rendering is not enabled")]
    NotEnabled,

    #[error("PDF service request failed: {0}")]
    Request(String),

    #[error("PDF service returned {status}: {body}")]
    Upstream { status: u16, body: String },
}

impl From<PdfError> for AppError {
    fn from(err: PdfError) -> Self {
        match err {
            PdfError::NotEnabled => AppError::ServiceUnavailable(err.to_string()),
            other => AppError::BadGateway(other.to_string()),
        }
    }
}

/// Body posted to the conversion API.
#[derive(Debug, Serialize)]
pub struct ConvertRequest<'a> {
    pub source: &'a str,
    pub landscape: bool,
    pub use_print: bool,
    pub filename: &'a str,
}

impl<'a> ConvertRequest<'a> {
    pub fn portrait(source: &'a str, filename: &'a str) -> Self {
        Self {
            source,
            landscape: false,
            use_print: false,
            filename,
        }
    }
}

/// Download name for an invoice PDF. Anything outside `[A-Za-z0-9._-]` becomes
/// `_` so the name can sit inside a quoted `Content-Disposition` value.
pub fn pdf_filename(invoice_number: &str) -> String {
    let safe: String = invoice_number
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("invoice-{}.pdf", safe)
}

#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render(&self, html: &str, filename: &str) -> Result<Vec<u8>, PdfError>;
    fn is_enabled(&self) -> bool;
}

/// Renderer backed by the remote conversion API.
pub struct HttpPdfRenderer {
    client: Client,
    config: PdfConfig,
}

impl HttpPdfRenderer {
    pub fn new(config: PdfConfig) -> Result<Self, PdfError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| PdfError::Request(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    async fn convert(&self, html: &str, filename: &str) -> Result<Vec<u8>, PdfError> {
        let response = self
            .client
            .post(&self.config.url)
            .basic_auth("api", Some(self.config.api_key.expose_secret()))
            .json(&ConvertRequest::portrait(html, filename))
            .send()
            .await
            .map_err(|e| PdfError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "PDF conversion failed");
            return Err(PdfError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PdfError::Request(format!("Failed to read PDF body: {}", e)))?;

        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl PdfRenderer for HttpPdfRenderer {
    async fn render(&self, html: &str, filename: &str) -> Result<Vec<u8>, PdfError> {
        if !self.config.enabled {
            return Err(PdfError::NotEnabled);
        }

        let started = Instant::now();
        let result = self.convert(html, filename).await;
        let outcome = if result.is_ok() { "ok" } else { "error" };
        PDF_RENDER_DURATION
            .with_label_values(&[outcome])
            .observe(started.elapsed().as_secs_f64());

        if let Ok(ref bytes) = result {
            tracing::info!(filename = %filename, size = bytes.len(), "PDF generated");
        }

        result
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}

/// Renderer used when no conversion service is configured.
pub struct DisabledPdfRenderer;

#[async_trait]
impl PdfRenderer for DisabledPdfRenderer {
    async fn render(&self, _html: &str, _filename: &str) -> Result<Vec<u8>, PdfError> {
        Err(PdfError::NotEnabled)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Mock renderer for testing. Returns a minimal PDF header followed by the HTML.
pub struct MockPdfRenderer {
    render_count: AtomicU64,
}

impl MockPdfRenderer {
    pub fn new() -> Self {
        Self {
            render_count: AtomicU64::new(0),
        }
    }

    pub fn render_count(&self) -> u64 {
        self.render_count.load(Ordering::SeqCst)
    }
}

impl Default for MockPdfRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PdfRenderer for MockPdfRenderer {
    async fn render(&self, html: &str, filename: &str) -> Result<Vec<u8>, PdfError> {
        self.render_count.fetch_add(1, Ordering::SeqCst);
        tracing::info!(filename = %filename, "[MOCK] PDF would be generated");

        let mut bytes = b"%PDF-1.4\n".to_vec();
        bytes.extend_from_slice(html.as_bytes());
        Ok(bytes)
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Pick the renderer for the configured service.
pub fn renderer_from_config(config: &PdfConfig) -> Result<Arc<dyn PdfRenderer>, AppError> {
    if !config.enabled {
        tracing::warn!("PDF service not enabled - PDF downloads will be unavailable");
        return Ok(Arc::new(DisabledPdfRenderer));
    }

    let renderer = HttpPdfRenderer::new(config.clone())
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;
    tracing::info!(url = %config.url, "PDF renderer initialized");
    Ok(Arc::new(renderer))
}
