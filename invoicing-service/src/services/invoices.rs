//! Invoice workflows: drafting, numbering, totals, status changes and output.

use crate::calculator::{
    compute_line_level_totals, compute_totals, line_totals, ComputedTotals, InvoiceModifiers,
    LineItemDraft,
};
use crate::config::InvoiceDefaults;
use crate::dtos::invoices::{
    CreateInvoiceRequest, ListInvoicesQuery, PreviewRequest, PreviewResponse,
    UpdateInvoiceRequest, UpdateStatusRequest,
};
use crate::models::{
    format_invoice_number, Client, Company, Invoice, InvoiceDetail, InvoiceFields,
    InvoiceStatus, InvoiceWithParties, ListInvoicesFilter, StatusSummary,
};
use crate::render::{
    compose_email, pdf_document, print_document, render_invoice, EmailDraft, InvoiceView,
    RenderError, TemplateKind,
};
use crate::services::database::Database;
use crate::services::metrics::{record_invoice_amount, INVOICES_TOTAL, TOTALS_DIVERGENCE_TOTAL};
use crate::services::pdf::{pdf_filename, PdfError, PdfRenderer};
use chrono::{Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const DEFAULT_PAGE_SIZE: i64 = 20;

/// Largest magnitude a `NUMERIC(19, 4)` money column holds.
pub const MAX_STORED_AMOUNT: Decimal = dec!(999999999999999.9999);

/// Rendered PDF ready for download.
pub struct PdfDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct InvoiceService {
    db: Arc<Database>,
    defaults: Arc<InvoiceDefaults>,
    pdf: Arc<dyn PdfRenderer>,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Invoice not found"))
}

fn check_dates(issue_date: NaiveDate, due_date: NaiveDate) -> Result<(), AppError> {
    if due_date < issue_date {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Due date cannot be before issue date"
        )));
    }
    Ok(())
}

/// Reject amounts that would overflow the money columns.
pub fn ensure_storable(items: &[LineItemDraft], totals: &ComputedTotals) -> Result<(), AppError> {
    let line_amounts = items.iter().map(line_totals).flat_map(|line| {
        [line.amount, line.discount_amount, line.net]
    });
    let invoice_amounts = [
        totals.subtotal,
        totals.discount_amount,
        totals.tax_amount,
        totals.withholding_amount,
        totals.total,
    ];

    if line_amounts
        .chain(invoice_amounts)
        .any(|amount| amount.abs() > MAX_STORED_AMOUNT)
    {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Invoice amounts exceed the supported range of {}",
            MAX_STORED_AMOUNT
        )));
    }
    Ok(())
}

/// Compute the totals that get stored, flagging drafts whose preview total
/// would have been different.
pub fn settle_totals(
    items: &[LineItemDraft],
    modifiers: &InvoiceModifiers,
    operation: &str,
) -> Result<ComputedTotals, AppError> {
    let persisted = compute_line_level_totals(items, modifiers.discount, modifiers.tax_rate);
    let draft = compute_totals(items, modifiers);

    if draft.total != persisted.total {
        warn!(
            operation = operation,
            draft_total = %draft.total,
            persisted_total = %persisted.total,
            "Draft and persisted invoice totals differ"
        );
        TOTALS_DIVERGENCE_TOTAL.with_label_values(&[operation]).inc();
    }

    ensure_storable(items, &persisted)?;
    Ok(persisted)
}

/// Header of a new draft, with configured defaults for anything left out.
/// Without a due date the invoice is due after the default payment terms.
pub fn draft_fields(
    req: &CreateInvoiceRequest,
    defaults: &InvoiceDefaults,
    invoice_number: String,
    today: NaiveDate,
) -> InvoiceFields {
    let issue_date = req.issue_date.unwrap_or(today);
    let due_date = req
        .due_date
        .unwrap_or_else(|| issue_date + Duration::days(defaults.payment_terms_days));

    InvoiceFields {
        invoice_number,
        client_id: req.client_id,
        company_id: req.company_id,
        issue_date,
        due_date,
        currency: req.currency.unwrap_or(defaults.currency),
        notes: req.notes.clone().or_else(|| defaults.notes.clone()),
        template: req.template.as_str().to_string(),
        modifiers: InvoiceModifiers {
            discount: req.discount,
            tax_rate: req.tax_rate.unwrap_or(defaults.tax_rate),
            vat_applicable: req.vat_applicable,
            withholding_applicable: req.withholding_applicable,
        },
    }
}

/// Stored header with the supplied changes laid over it.
pub fn merge_update(existing: &Invoice, req: &UpdateInvoiceRequest) -> InvoiceFields {
    let mut fields = InvoiceFields::from_invoice(existing);

    if let Some(number) = &req.invoice_number {
        fields.invoice_number = number.clone();
    }
    if let Some(client_id) = req.client_id {
        fields.client_id = client_id;
    }
    if let Some(company_id) = req.company_id {
        fields.company_id = company_id;
    }
    if let Some(issue_date) = req.issue_date {
        fields.issue_date = issue_date;
    }
    if let Some(due_date) = req.due_date {
        fields.due_date = due_date;
    }
    if let Some(currency) = req.currency {
        fields.currency = currency;
    }
    if let Some(notes) = &req.notes {
        fields.notes = Some(notes.clone());
    }
    if let Some(template) = req.template {
        fields.template = template.as_str().to_string();
    }
    if let Some(discount) = req.discount {
        fields.modifiers.discount = discount;
    }
    if let Some(tax_rate) = req.tax_rate {
        fields.modifiers.tax_rate = tax_rate;
    }
    if let Some(vat) = req.vat_applicable {
        fields.modifiers.vat_applicable = vat;
    }
    if let Some(withholding) = req.withholding_applicable {
        fields.modifiers.withholding_applicable = withholding;
    }

    fields
}

/// Copy of an invoice's header, issued today and due after the same window.
pub fn duplicate_fields(original: &Invoice, invoice_number: String, today: NaiveDate) -> InvoiceFields {
    let mut fields = InvoiceFields::from_invoice(original);
    fields.invoice_number = invoice_number;
    fields.issue_date = today;
    fields.due_date = today + Duration::days(original.payment_window_days());
    fields
}

/// One row per status, in lifecycle order, including statuses with no invoices.
pub fn fill_summary(rows: Vec<StatusSummary>) -> Vec<StatusSummary> {
    let mut by_status: HashMap<String, StatusSummary> =
        rows.into_iter().map(|row| (row.status.clone(), row)).collect();

    InvoiceStatus::ALL
        .iter()
        .map(|status| {
            by_status
                .remove(status.as_str())
                .unwrap_or_else(|| StatusSummary {
                    status: status.as_str().to_string(),
                    count: 0,
                    total: Decimal::ZERO,
                })
        })
        .collect()
}

impl InvoiceService {
    pub fn new(db: Arc<Database>, defaults: InvoiceDefaults, pdf: Arc<dyn PdfRenderer>) -> Self {
        Self {
            db,
            defaults: Arc::new(defaults),
            pdf,
        }
    }

    pub fn defaults(&self) -> &InvoiceDefaults {
        &self.defaults
    }

    /// Totals for an unsaved draft, from both computation paths.
    pub fn preview(&self, req: PreviewRequest) -> PreviewResponse {
        let modifiers = InvoiceModifiers {
            discount: req.discount,
            tax_rate: req.tax_rate.unwrap_or(self.defaults.tax_rate),
            vat_applicable: req.vat_applicable,
            withholding_applicable: req.withholding_applicable,
        };

        let lines = req.line_items.iter().map(line_totals).collect();
        let totals = compute_totals(&req.line_items, &modifiers);
        let line_level_totals =
            compute_line_level_totals(&req.line_items, modifiers.discount, modifiers.tax_rate);

        PreviewResponse {
            lines,
            totals,
            line_level_totals,
            totals_diverge: totals.total != line_level_totals.total,
        }
    }

    /// Next `PREFIX-YYYY-NNN` number for the issue year, one past the highest
    /// sequence already used so gaps left by deletes are never reissued.
    async fn next_invoice_number(&self, issue_date: NaiveDate) -> Result<String, AppError> {
        let year_prefix = format!("{}-{}-", self.defaults.invoice_prefix, issue_date.year());
        let last = self.db.max_invoice_sequence(&year_prefix).await?;
        Ok(format_invoice_number(
            &self.defaults.invoice_prefix,
            issue_date,
            last + 1,
        ))
    }

    async fn ensure_parties(&self, client_id: Uuid, company_id: Uuid) -> Result<(), AppError> {
        if self.db.get_client(client_id).await?.is_none() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Client {} does not exist",
                client_id
            )));
        }
        if self.db.get_company(company_id).await?.is_none() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Company {} does not exist",
                company_id
            )));
        }
        Ok(())
    }

    #[instrument(skip(self, req), fields(client_id = %req.client_id, company_id = %req.company_id))]
    pub async fn create(&self, req: CreateInvoiceRequest) -> Result<InvoiceDetail, AppError> {
        self.ensure_parties(req.client_id, req.company_id).await?;

        let today = today();
        let issue_date = req.issue_date.unwrap_or(today);
        let invoice_number = match &req.invoice_number {
            Some(number) => number.trim().to_string(),
            None => self.next_invoice_number(issue_date).await?,
        };

        let fields = draft_fields(&req, &self.defaults, invoice_number, today);
        check_dates(fields.issue_date, fields.due_date)?;

        let items: Vec<LineItemDraft> = req.line_items.into_iter().map(Into::into).collect();
        let totals = settle_totals(&items, &fields.modifiers, "create")?;

        let invoice = self.db.create_invoice(&fields, &totals, &items).await?;

        INVOICES_TOTAL.with_label_values(&["draft"]).inc();
        record_invoice_amount(&invoice.currency, invoice.total);

        self.load_detail(invoice, today).await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, invoice_id: Uuid) -> Result<InvoiceDetail, AppError> {
        let invoice = self.db.get_invoice(invoice_id).await?.ok_or_else(not_found)?;
        self.load_detail(invoice, today()).await
    }

    async fn load_detail(&self, invoice: Invoice, today: NaiveDate) -> Result<InvoiceDetail, AppError> {
        let client = self.db.get_client(invoice.client_id).await?;
        let company = self
            .db
            .get_companies_by_ids(&[invoice.company_id])
            .await?
            .into_iter()
            .next();
        let line_items = self.db.get_line_items(invoice.id).await?;

        Ok(InvoiceDetail {
            invoice: invoice.with_effective_status(today),
            client,
            company,
            line_items,
        })
    }

    #[instrument(skip(self, query), fields(status = ?query.status))]
    pub async fn list(&self, query: ListInvoicesQuery) -> Result<Vec<InvoiceWithParties>, AppError> {
        let today = today();
        let filter = ListInvoicesFilter {
            status: query.status,
            client_id: query.client_id,
            company_id: query.company_id,
            page_size: query.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            offset: query.offset.unwrap_or(0),
        };

        let invoices = self.db.list_invoices(&filter, today).await?;

        let mut client_ids: Vec<Uuid> = invoices.iter().map(|i| i.client_id).collect();
        client_ids.sort();
        client_ids.dedup();
        let mut company_ids: Vec<Uuid> = invoices.iter().map(|i| i.company_id).collect();
        company_ids.sort();
        company_ids.dedup();

        let clients: HashMap<Uuid, Client> = self
            .db
            .get_clients_by_ids(&client_ids)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        let companies: HashMap<Uuid, Company> = self
            .db
            .get_companies_by_ids(&company_ids)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        Ok(invoices
            .into_iter()
            .map(|invoice| InvoiceWithParties {
                client: clients.get(&invoice.client_id).cloned(),
                company: companies.get(&invoice.company_id).cloned(),
                invoice: invoice.with_effective_status(today),
            })
            .collect())
    }

    /// Edit a draft. Totals are recomputed from the replacement line items,
    /// or from the stored ones when none are supplied.
    #[instrument(skip(self, req))]
    pub async fn update(
        &self,
        invoice_id: Uuid,
        req: UpdateInvoiceRequest,
    ) -> Result<InvoiceDetail, AppError> {
        let existing = self.db.get_invoice(invoice_id).await?.ok_or_else(not_found)?;
        if existing.stored_status() != InvoiceStatus::Draft {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Only draft invoices can be updated"
            )));
        }

        let fields = merge_update(&existing, &req);
        check_dates(fields.issue_date, fields.due_date)?;
        if req.client_id.is_some() || req.company_id.is_some() {
            self.ensure_parties(fields.client_id, fields.company_id).await?;
        }

        let replacement: Option<Vec<LineItemDraft>> = req
            .line_items
            .map(|items| items.into_iter().map(Into::into).collect());
        let items = match &replacement {
            Some(items) => items.clone(),
            None => self
                .db
                .get_line_items(invoice_id)
                .await?
                .iter()
                .map(|item| item.to_draft())
                .collect(),
        };
        let totals = settle_totals(&items, &fields.modifiers, "update")?;

        let invoice = self
            .db
            .update_invoice(invoice_id, &fields, &totals, replacement.as_deref())
            .await?
            .ok_or_else(not_found)?;

        self.load_detail(invoice, today()).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, invoice_id: Uuid) -> Result<(), AppError> {
        if !self.db.delete_invoice(invoice_id).await? {
            return Err(not_found());
        }
        Ok(())
    }

    /// New draft with the same parties, modifiers and line items.
    #[instrument(skip(self))]
    pub async fn duplicate(&self, invoice_id: Uuid) -> Result<InvoiceDetail, AppError> {
        let original = self.db.get_invoice(invoice_id).await?.ok_or_else(not_found)?;
        let items: Vec<LineItemDraft> = self
            .db
            .get_line_items(invoice_id)
            .await?
            .iter()
            .map(|item| item.to_draft())
            .collect();

        let today = today();
        let invoice_number = self.next_invoice_number(today).await?;
        let fields = duplicate_fields(&original, invoice_number, today);
        let totals = settle_totals(&items, &fields.modifiers, "duplicate")?;

        let invoice = self.db.create_invoice(&fields, &totals, &items).await?;

        INVOICES_TOTAL.with_label_values(&["draft"]).inc();
        record_invoice_amount(&invoice.currency, invoice.total);
        info!(
            source_invoice_id = %original.id,
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            "Invoice duplicated"
        );

        self.load_detail(invoice, today).await
    }

    #[instrument(skip(self, req), fields(status = req.status.as_str()))]
    pub async fn change_status(
        &self,
        invoice_id: Uuid,
        req: UpdateStatusRequest,
    ) -> Result<InvoiceDetail, AppError> {
        let today = today();
        let invoice = self
            .db
            .update_invoice_status(invoice_id, req.status, req.payment_date.unwrap_or(today))
            .await?
            .ok_or_else(not_found)?;

        INVOICES_TOTAL.with_label_values(&[req.status.as_str()]).inc();

        self.load_detail(invoice, today).await
    }

    pub async fn summary(&self) -> Result<Vec<StatusSummary>, AppError> {
        let rows = self.db.status_summary(today()).await?;
        Ok(fill_summary(rows))
    }

    async fn view(
        &self,
        invoice_id: Uuid,
        template: Option<TemplateKind>,
    ) -> Result<(InvoiceView, TemplateKind), AppError> {
        let detail = self.get(invoice_id).await?;
        let kind = template.unwrap_or_else(|| TemplateKind::from_string(&detail.invoice.template));
        Ok((InvoiceView::from_detail(&detail)?, kind))
    }

    pub async fn render_html(
        &self,
        invoice_id: Uuid,
        template: Option<TemplateKind>,
    ) -> Result<String, AppError> {
        let (view, kind) = self.view(invoice_id, template).await?;
        Ok(render_invoice(&view, kind)?)
    }

    pub async fn print_html(
        &self,
        invoice_id: Uuid,
        template: Option<TemplateKind>,
    ) -> Result<String, AppError> {
        let (view, kind) = self.view(invoice_id, template).await?;
        Ok(print_document(&view, kind, &self.defaults.print_copies)?)
    }

    #[instrument(skip(self, template))]
    pub async fn pdf(
        &self,
        invoice_id: Uuid,
        template: Option<TemplateKind>,
    ) -> Result<PdfDocument, AppError> {
        if !self.pdf.is_enabled() {
            return Err(PdfError::NotEnabled.into());
        }

        let (view, kind) = self.view(invoice_id, template).await?;
        let html = pdf_document(&view, kind, &self.defaults.print_copies)?;
        let filename = pdf_filename(&view.invoice_number);
        let bytes = self.pdf.render(&html, &filename).await?;

        Ok(PdfDocument { filename, bytes })
    }

    pub async fn email(&self, invoice_id: Uuid) -> Result<EmailDraft, AppError> {
        let detail = self.get(invoice_id).await?;
        let company = detail.company.as_ref().ok_or(RenderError::Missing("company"))?;
        let client = detail.client.as_ref().ok_or(RenderError::Missing("client"))?;

        Ok(compose_email(
            &detail.invoice.invoice_number,
            &company.name,
            &client.name,
            &client.email,
            &self.defaults.email_signature,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::Discount;
    use crate::dtos::invoices::LineItemRequest;
    use crate::models::Currency;
    use crate::render::templates::fixtures;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn create_request() -> CreateInvoiceRequest {
        CreateInvoiceRequest {
            invoice_number: None,
            client_id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            issue_date: None,
            due_date: None,
            currency: None,
            notes: None,
            template: TemplateKind::Minimal,
            discount: Discount::Fixed(dec!(5)),
            tax_rate: None,
            vat_applicable: true,
            withholding_applicable: false,
            line_items: vec![LineItemRequest {
                description: "Consulting".into(),
                quantity: dec!(2),
                rate: dec!(50),
                discount: Discount::None,
                vat_applicable: true,
                withholding_tax_applicable: false,
            }],
        }
    }

    #[test]
    fn draft_fields_fill_in_defaults() {
        let defaults = InvoiceDefaults {
            notes: Some("Thank you for your business".into()),
            ..InvoiceDefaults::default()
        };
        let today = date(2024, 3, 1);

        let fields = draft_fields(&create_request(), &defaults, "INV-2024-001".into(), today);

        assert_eq!(fields.issue_date, today);
        assert_eq!(fields.due_date, date(2024, 3, 31));
        assert_eq!(fields.currency, Currency::Kes);
        assert_eq!(fields.modifiers.tax_rate, dec!(16));
        assert_eq!(fields.modifiers.discount, Discount::Fixed(dec!(5)));
        assert_eq!(fields.notes.as_deref(), Some("Thank you for your business"));
        assert_eq!(fields.template, "minimal");
    }

    #[test]
    fn draft_fields_keep_explicit_values() {
        let mut req = create_request();
        req.issue_date = Some(date(2024, 1, 10));
        req.due_date = Some(date(2024, 1, 20));
        req.currency = Some(Currency::Usd);
        req.tax_rate = Some(dec!(0));
        req.notes = Some("Net 10".into());

        let fields = draft_fields(&req, &InvoiceDefaults::default(), "X-1".into(), date(2024, 6, 1));

        assert_eq!(fields.issue_date, date(2024, 1, 10));
        assert_eq!(fields.due_date, date(2024, 1, 20));
        assert_eq!(fields.currency, Currency::Usd);
        assert_eq!(fields.modifiers.tax_rate, Decimal::ZERO);
        assert_eq!(fields.notes.as_deref(), Some("Net 10"));
    }

    #[test]
    fn merge_update_only_touches_supplied_fields() {
        let existing = fixtures::invoice_detail().invoice;
        let req = UpdateInvoiceRequest {
            notes: Some("Revised".into()),
            tax_rate: Some(dec!(8)),
            ..Default::default()
        };

        let fields = merge_update(&existing, &req);

        assert_eq!(fields.invoice_number, existing.invoice_number);
        assert_eq!(fields.due_date, existing.due_date);
        assert_eq!(fields.notes.as_deref(), Some("Revised"));
        assert_eq!(fields.modifiers.tax_rate, dec!(8));
        assert_eq!(fields.modifiers.discount, existing.discount());
    }

    #[test]
    fn duplicate_keeps_payment_window() {
        let original = fixtures::invoice_detail().invoice;
        let window = original.payment_window_days();
        let today = date(2025, 2, 1);

        let fields = duplicate_fields(&original, "INV-2025-004".into(), today);

        assert_eq!(fields.invoice_number, "INV-2025-004");
        assert_eq!(fields.issue_date, today);
        assert_eq!((fields.due_date - fields.issue_date).num_days(), window);
        assert_eq!(fields.client_id, original.client_id);
    }

    #[test]
    fn settle_totals_persists_line_level_path() {
        let items = vec![LineItemDraft {
            description: "Design".into(),
            quantity: dec!(1),
            rate: dec!(100),
            discount: Discount::Percentage(dec!(10)),
            vat_applicable: true,
            withholding_tax_applicable: false,
        }];
        let modifiers = InvoiceModifiers {
            discount: Discount::Fixed(dec!(20)),
            tax_rate: dec!(16),
            vat_applicable: true,
            withholding_applicable: false,
        };

        let totals = settle_totals(&items, &modifiers, "create").expect("storable totals");

        assert_eq!(totals.subtotal, dec!(100));
        assert_eq!(totals.total, dec!(96.00));
    }

    #[test]
    fn oversized_totals_are_rejected_before_storage() {
        let huge = dec!(1000000000000000);
        let items = vec![LineItemDraft {
            description: "Fleet".into(),
            quantity: huge,
            rate: huge,
            discount: Discount::None,
            vat_applicable: true,
            withholding_tax_applicable: false,
        }];
        let modifiers = InvoiceModifiers {
            tax_rate: dec!(16),
            vat_applicable: true,
            ..Default::default()
        };

        let err = settle_totals(&items, &modifiers, "create").expect_err("should not fit");
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn amounts_at_the_column_limit_are_storable() {
        let items = vec![LineItemDraft {
            description: "Edge".into(),
            quantity: dec!(1),
            rate: dec!(999999999999999.99),
            discount: Discount::None,
            vat_applicable: false,
            withholding_tax_applicable: false,
        }];
        let totals = settle_totals(&items, &InvoiceModifiers::default(), "create");
        assert!(totals.is_ok());
    }

    #[test]
    fn summary_lists_every_status() {
        let rows = vec![
            StatusSummary {
                status: "paid".into(),
                count: 2,
                total: dec!(300),
            },
            StatusSummary {
                status: "draft".into(),
                count: 1,
                total: dec!(50),
            },
        ];

        let summary = fill_summary(rows);
        let statuses: Vec<&str> = summary.iter().map(|s| s.status.as_str()).collect();

        assert_eq!(statuses, ["draft", "sent", "paid", "overdue", "cancelled"]);
        assert_eq!(summary[0].count, 1);
        assert_eq!(summary[2].total, dec!(300));
        assert_eq!(summary[3].count, 0);
    }
}
