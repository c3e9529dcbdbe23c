//! HTTP handlers for invoicing-service.

pub mod clients;
pub mod companies;
pub mod health;
pub mod invoices;

pub use health::{health_check, metrics_handler, readiness_check};
