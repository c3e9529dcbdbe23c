//! Multi-copy documents for printing and PDF conversion.

use super::templates::{render_invoice, InvoiceView};
use super::{RenderError, TemplateKind};
use askama::Template;

pub struct PrintCopy {
    pub label: String,
    pub body: String,
}

/// Copies of one invoice. A standalone document is a full HTML page with
/// print CSS and page breaks after each copy; otherwise the copies are bare
/// fragments separated by page breaks before each copy after the first.
#[derive(Template)]
#[template(path = "invoices/print.html")]
pub struct PrintTemplate<'a> {
    pub invoice_number: &'a str,
    pub copies: Vec<PrintCopy>,
    pub standalone: bool,
}

fn copies(
    view: &InvoiceView,
    kind: TemplateKind,
    labels: &[String],
) -> Result<Vec<PrintCopy>, RenderError> {
    let body = render_invoice(view, kind)?;
    Ok(labels
        .iter()
        .map(|label| PrintCopy {
            label: label.clone(),
            body: body.clone(),
        })
        .collect())
}

/// HTML page that prints one labelled copy per entry in `labels`.
pub fn print_document(
    view: &InvoiceView,
    kind: TemplateKind,
    labels: &[String],
) -> Result<String, RenderError> {
    let template = PrintTemplate {
        invoice_number: &view.invoice_number,
        copies: copies(view, kind, labels)?,
        standalone: true,
    };
    Ok(template.render()?)
}

/// Source posted to the PDF service.
pub fn pdf_document(
    view: &InvoiceView,
    kind: TemplateKind,
    labels: &[String],
) -> Result<String, RenderError> {
    let template = PrintTemplate {
        invoice_number: &view.invoice_number,
        copies: copies(view, kind, labels)?,
        standalone: false,
    };
    Ok(template.render()?)
}
