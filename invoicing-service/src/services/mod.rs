//! Services module for invoicing-service.

pub mod database;
pub mod invoices;
pub mod metrics;
pub mod pdf;

pub use database::Database;
pub use invoices::{InvoiceService, PdfDocument};
pub use metrics::{get_metrics, init_metrics, track_error};
pub use pdf::{renderer_from_config, MockPdfRenderer, PdfRenderer};
