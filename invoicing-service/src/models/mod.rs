//! Domain models for invoicing-service.

mod client;
mod company;
mod invoice;
mod line_item;

pub use client::{Client, ClientWithCompany, CreateClient, UpdateClient};
pub use company::{Company, CreateCompany, UpdateCompany};
pub use invoice::{
    format_invoice_number, Currency, Invoice, InvoiceDetail, InvoiceFields, InvoiceStatus,
    InvoiceWithParties, ListInvoicesFilter, StatusSummary,
};
pub use line_item::LineItem;
