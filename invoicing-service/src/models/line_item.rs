//! Line item model for invoicing-service.

use crate::calculator::{Discount, LineItemDraft};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Line item on a persisted invoice.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LineItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub position: i32,
    pub description: String,
    pub quantity: Decimal,
    pub rate: Decimal,
    pub discount_type: Option<String>,
    pub discount_value: Decimal,
    pub discount_amount: Decimal,
    /// quantity × rate, before the line discount.
    pub amount: Decimal,
    pub vat_applicable: bool,
    pub withholding_tax_applicable: bool,
    pub created_at: DateTime<Utc>,
}

impl LineItem {
    pub fn to_draft(&self) -> LineItemDraft {
        LineItemDraft {
            description: self.description.clone(),
            quantity: self.quantity,
            rate: self.rate,
            discount: Discount::from_parts(self.discount_type.as_deref(), self.discount_value),
            vat_applicable: self.vat_applicable,
            withholding_tax_applicable: self.withholding_tax_applicable,
        }
    }
}
