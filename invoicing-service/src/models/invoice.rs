//! Invoice model for invoicing-service.

use super::{Client, Company, LineItem};
use crate::calculator::{Discount, InvoiceModifiers};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 5] = [
        InvoiceStatus::Draft,
        InvoiceStatus::Sent,
        InvoiceStatus::Paid,
        InvoiceStatus::Overdue,
        InvoiceStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "sent" => InvoiceStatus::Sent,
            "paid" => InvoiceStatus::Paid,
            "overdue" => InvoiceStatus::Overdue,
            "cancelled" => InvoiceStatus::Cancelled,
            _ => InvoiceStatus::Draft,
        }
    }

    /// Paid and cancelled invoices are final.
    pub fn can_transition_to(self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        matches!(
            (self, next),
            (Draft, Sent)
                | (Draft, Cancelled)
                | (Sent, Paid)
                | (Sent, Overdue)
                | (Sent, Cancelled)
                | (Overdue, Paid)
                | (Overdue, Cancelled)
        )
    }
}

/// Supported invoice currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Kes,
    Usd,
    Eur,
    Gbp,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Kes => "KES",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "KES" => Some(Currency::Kes),
            "USD" => Some(Currency::Usd),
            "EUR" => Some(Currency::Eur),
            "GBP" => Some(Currency::Gbp),
            _ => None,
        }
    }
}

/// Persisted invoice header with the totals computed at submission time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub client_id: Uuid,
    pub company_id: Uuid,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub payment_date: Option<NaiveDate>,
    pub currency: String,
    pub notes: Option<String>,
    pub status: String,
    pub status_updated_at: Option<DateTime<Utc>>,
    pub subtotal: Decimal,
    pub discount_type: Option<String>,
    pub discount_value: Decimal,
    pub discount_amount: Decimal,
    pub total_before_tax: Decimal,
    pub tax_rate: Decimal,
    pub vat_applicable: bool,
    pub withholding_applicable: bool,
    pub vat_amount: Decimal,
    pub withholding_tax_amount: Decimal,
    pub total: Decimal,
    pub template: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn stored_status(&self) -> InvoiceStatus {
        InvoiceStatus::from_string(&self.status)
    }

    /// A sent invoice past its due date reads as overdue.
    pub fn effective_status(&self, today: NaiveDate) -> InvoiceStatus {
        match self.stored_status() {
            InvoiceStatus::Sent if self.due_date < today => InvoiceStatus::Overdue,
            status => status,
        }
    }

    pub fn with_effective_status(mut self, today: NaiveDate) -> Self {
        self.status = self.effective_status(today).as_str().to_string();
        self
    }

    pub fn discount(&self) -> Discount {
        Discount::from_parts(self.discount_type.as_deref(), self.discount_value)
    }

    pub fn modifiers(&self) -> InvoiceModifiers {
        InvoiceModifiers {
            discount: self.discount(),
            tax_rate: self.tax_rate,
            vat_applicable: self.vat_applicable,
            withholding_applicable: self.withholding_applicable,
        }
    }

    /// Days between issue and due date.
    pub fn payment_window_days(&self) -> i64 {
        (self.due_date - self.issue_date).num_days()
    }
}

/// Invoice with everything needed to display or render it.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub client: Option<Client>,
    pub company: Option<Company>,
    pub line_items: Vec<LineItem>,
}

/// Invoice row in a listing, with its parties but without line items.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceWithParties {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub client: Option<Client>,
    pub company: Option<Company>,
}

/// Header fields written on create and update. Totals travel separately.
#[derive(Debug, Clone)]
pub struct InvoiceFields {
    pub invoice_number: String,
    pub client_id: Uuid,
    pub company_id: Uuid,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub currency: Currency,
    pub notes: Option<String>,
    pub template: String,
    pub modifiers: InvoiceModifiers,
}

impl InvoiceFields {
    pub fn from_invoice(invoice: &Invoice) -> Self {
        Self {
            invoice_number: invoice.invoice_number.clone(),
            client_id: invoice.client_id,
            company_id: invoice.company_id,
            issue_date: invoice.issue_date,
            due_date: invoice.due_date,
            currency: Currency::parse(&invoice.currency).unwrap_or(Currency::Kes),
            notes: invoice.notes.clone(),
            template: invoice.template.clone(),
            modifiers: invoice.modifiers(),
        }
    }
}

/// Filter parameters for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub status: Option<InvoiceStatus>,
    pub client_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub page_size: i64,
    pub offset: i64,
}

/// Count and summed total of the invoices in one status.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StatusSummary {
    pub status: String,
    pub count: i64,
    pub total: Decimal,
}

/// `PREFIX-YYYY-NNN`, sequence zero-padded to three digits.
pub fn format_invoice_number(prefix: &str, issue_date: NaiveDate, sequence: i64) -> String {
    format!("{}-{}-{:03}", prefix, issue_date.year(), sequence)
}
