//! Askama templates and the view model they render.

use super::{RenderError, TemplateKind};
use crate::calculator::round_currency;
use crate::models::InvoiceDetail;
use askama::Template;
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Invoice flattened into display strings.
#[derive(Debug, Clone)]
pub struct InvoiceView {
    pub invoice_number: String,
    pub issue_date: String,
    pub due_date: String,
    pub currency: String,
    pub company_name: String,
    pub company_logo: String,
    /// Address, phone, email and PIN, one per line.
    pub company_details: Vec<String>,
    pub company_email: String,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: String,
    pub line_items: Vec<LineView>,
    pub subtotal: String,
    /// Empty when no invoice discount applies.
    pub discount: String,
    pub tax: String,
    /// Empty when withholding does not apply.
    pub withholding: String,
    pub total: String,
    pub notes: String,
}

#[derive(Debug, Clone)]
pub struct LineView {
    pub description: String,
    pub quantity: String,
    pub rate: String,
    pub amount: String,
}

pub fn format_money(value: Decimal) -> String {
    format!("{:.2}", round_currency(value))
}

fn format_date(date: NaiveDate) -> String {
    date.format("%d %b %Y").to_string()
}

impl InvoiceView {
    pub fn from_detail(detail: &InvoiceDetail) -> Result<Self, RenderError> {
        let company = detail.company.as_ref().ok_or(RenderError::Missing("company"))?;
        let client = detail.client.as_ref().ok_or(RenderError::Missing("client"))?;
        let invoice = &detail.invoice;

        let line_items = detail
            .line_items
            .iter()
            .map(|item| LineView {
                description: item.description.clone(),
                quantity: item.quantity.normalize().to_string(),
                rate: format_money(item.rate),
                amount: format_money(item.amount),
            })
            .collect();

        let optional_amount = |value: Decimal| {
            if value.is_zero() {
                String::new()
            } else {
                format_money(value)
            }
        };

        Ok(Self {
            invoice_number: invoice.invoice_number.clone(),
            issue_date: format_date(invoice.issue_date),
            due_date: format_date(invoice.due_date),
            currency: invoice.currency.clone(),
            company_name: company.name.clone(),
            company_logo: company.logo.clone().unwrap_or_default(),
            company_details: vec![
                company.address.clone(),
                company.phone.clone(),
                company.email.clone(),
                format!("PIN: {}", company.pin_number),
            ],
            company_email: company.email.clone(),
            client_name: client.name.clone(),
            client_email: client.email.clone(),
            client_phone: client.phone.clone(),
            line_items,
            subtotal: format_money(invoice.subtotal),
            discount: optional_amount(invoice.discount_amount),
            tax: format_money(invoice.vat_amount),
            withholding: optional_amount(invoice.withholding_tax_amount),
            total: format_money(invoice.total),
            notes: invoice.notes.clone().unwrap_or_default(),
        })
    }
}

#[derive(Template)]
#[template(path = "invoices/modern.html")]
pub struct ModernTemplate<'a> {
    pub invoice: &'a InvoiceView,
}

#[derive(Template)]
#[template(path = "invoices/minimal.html")]
pub struct MinimalTemplate<'a> {
    pub invoice: &'a InvoiceView,
}

/// Render one copy of the invoice in the chosen layout.
pub fn render_invoice(view: &InvoiceView, kind: TemplateKind) -> Result<String, RenderError> {
    let html = match kind {
        TemplateKind::Modern => ModernTemplate { invoice: view }.render()?,
        TemplateKind::Minimal => MinimalTemplate { invoice: view }.render()?,
    };
    Ok(html)
}
