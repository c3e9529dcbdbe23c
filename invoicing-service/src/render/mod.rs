//! Invoice documents: HTML templates, multi-copy print output and email drafts.

pub mod email;
pub mod print;
pub mod templates;

pub use email::{compose_email, EmailDraft};
pub use print::{pdf_document, print_document};
pub use templates::{render_invoice, InvoiceView};

use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use thiserror::Error;

/// Visual layout of a rendered invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    #[default]
    Modern,
    Minimal,
}

impl TemplateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::Modern => "modern",
            TemplateKind::Minimal => "minimal",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "minimal" => TemplateKind::Minimal,
            _ => TemplateKind::Modern,
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to render template: {0}")]
    Template(#[from] askama::Error),

    #[error("Invoice has no {0} to render")]
    Missing(&'static str),
}

impl From<RenderError> for AppError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::Missing(_) => AppError::BadRequest(anyhow::anyhow!(err.to_string())),
            RenderError::Template(e) => AppError::InternalError(anyhow::anyhow!(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_names_round_trip() {
        assert_eq!(TemplateKind::from_string("minimal"), TemplateKind::Minimal);
        assert_eq!(TemplateKind::from_string("modern"), TemplateKind::Modern);
        assert_eq!(TemplateKind::Minimal.as_str(), "minimal");
    }

    #[test]
    fn unknown_template_is_rejected_on_input() {
        let parsed: Result<TemplateKind, _> = serde_json::from_str("\"professional\"");
        assert!(parsed.is_err());
    }
}
