//! Client model for invoicing-service.

use super::Company;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Billed party. Every client belongs to one company.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub avatar: Option<String>,
    pub pin_number: Option<String>,
    pub vat_registered: bool,
    pub company_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub total_billed: Decimal,
    /// Invoices still in play: draft, sent or overdue.
    pub active_projects: i64,
}

/// Client as returned by the API, with its company embedded.
#[derive(Debug, Clone, Serialize)]
pub struct ClientWithCompany {
    #[serde(flatten)]
    pub client: Client,
    pub company: Option<Company>,
}

/// Input for creating a client.
#[derive(Debug, Clone)]
pub struct CreateClient {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub avatar: Option<String>,
    pub pin_number: Option<String>,
    pub vat_registered: bool,
    pub company_id: Uuid,
}

/// Input for updating a client. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateClient {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub pin_number: Option<String>,
    pub vat_registered: Option<bool>,
    pub company_id: Option<Uuid>,
}
