//! Invoicing Service - companies, clients and invoices with computed totals,
//! HTML/print/PDF rendering and email drafts.

pub mod calculator;
pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod render;
pub mod services;
pub mod startup;
pub mod utils;

pub use startup::{build_router, AppState, Application};
