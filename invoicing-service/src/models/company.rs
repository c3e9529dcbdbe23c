//! Company model for invoicing-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Issuer of invoices.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub website: String,
    pub address: String,
    pub logo: Option<String>,
    pub pin_number: String,
    pub vat_registered: bool,
    pub employee_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Sum of the totals of this company's non-cancelled invoices.
    pub total_billed: Decimal,
}

/// Input for creating a company.
#[derive(Debug, Clone)]
pub struct CreateCompany {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub website: String,
    pub address: String,
    pub logo: Option<String>,
    pub pin_number: String,
    pub vat_registered: bool,
    pub employee_count: i32,
}

/// Input for updating a company. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateCompany {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub logo: Option<String>,
    pub pin_number: Option<String>,
    pub vat_registered: Option<bool>,
    pub employee_count: Option<i32>,
}
