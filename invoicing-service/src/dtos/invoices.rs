use super::{non_negative, percentage, positive};
use crate::calculator::{ComputedTotals, Discount, LineItemDraft, LineTotals};
use crate::models::{Currency, InvoiceStatus};
use crate::render::TemplateKind;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Invoice numbers end up in file names and headers: letters, digits, `.`, `_`, `-`.
pub static INVOICE_NUMBER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("invoice number pattern is valid")
});

fn default_true() -> bool {
    true
}

fn valid_discount(discount: &Discount) -> Result<(), ValidationError> {
    match discount {
        Discount::None => Ok(()),
        Discount::Percentage(value) => percentage(value),
        Discount::Fixed(value) => non_negative(value),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LineItemRequest {
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,

    #[validate(custom(function = "positive"))]
    pub quantity: Decimal,

    #[validate(custom(function = "non_negative"))]
    pub rate: Decimal,

    #[serde(default)]
    #[validate(custom(function = "valid_discount"))]
    pub discount: Discount,

    #[serde(default = "default_true")]
    pub vat_applicable: bool,

    #[serde(default)]
    pub withholding_tax_applicable: bool,
}

impl From<LineItemRequest> for LineItemDraft {
    fn from(req: LineItemRequest) -> Self {
        Self {
            description: req.description,
            quantity: req.quantity,
            rate: req.rate,
            discount: req.discount,
            vat_applicable: req.vat_applicable,
            withholding_tax_applicable: req.withholding_tax_applicable,
        }
    }
}

fn check_invoice_header(
    issue_date: Option<NaiveDate>,
    due_date: Option<NaiveDate>,
    tax_rate: Option<Decimal>,
) -> Result<(), ValidationError> {
    if let (Some(issue), Some(due)) = (issue_date, due_date) {
        if due < issue {
            let mut err = ValidationError::new("due_date");
            err.message = Some("Due date cannot be before issue date".into());
            return Err(err);
        }
    }
    if let Some(rate) = tax_rate {
        percentage(&rate)?;
    }
    Ok(())
}

fn validate_create_invoice(req: &CreateInvoiceRequest) -> Result<(), ValidationError> {
    check_invoice_header(req.issue_date, req.due_date, req.tax_rate)
}

fn validate_update_invoice(req: &UpdateInvoiceRequest) -> Result<(), ValidationError> {
    check_invoice_header(req.issue_date, req.due_date, req.tax_rate)
}

/// Draft submitted for persistence. Missing header values take the
/// configured defaults.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_create_invoice"))]
pub struct CreateInvoiceRequest {
    #[validate(
        length(min = 1, max = 64, message = "Invoice number must be 1-64 characters"),
        regex(
            path = *INVOICE_NUMBER_REGEX,
            message = "Invoice number may only contain letters, digits, '.', '_' and '-'"
        )
    )]
    pub invoice_number: Option<String>,

    pub client_id: Uuid,

    pub company_id: Uuid,

    pub issue_date: Option<NaiveDate>,

    pub due_date: Option<NaiveDate>,

    pub currency: Option<Currency>,

    pub notes: Option<String>,

    #[serde(default)]
    pub template: TemplateKind,

    #[serde(default)]
    #[validate(custom(function = "valid_discount"))]
    pub discount: Discount,

    pub tax_rate: Option<Decimal>,

    #[serde(default = "default_true")]
    pub vat_applicable: bool,

    #[serde(default)]
    pub withholding_applicable: bool,

    #[validate(length(min = 1, message = "At least one line item is required"), nested)]
    pub line_items: Vec<LineItemRequest>,
}

/// Changes to a draft invoice. Supplying `line_items` replaces all of them.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[validate(schema(function = "validate_update_invoice"))]
pub struct UpdateInvoiceRequest {
    #[validate(
        length(min = 1, max = 64, message = "Invoice number must be 1-64 characters"),
        regex(
            path = *INVOICE_NUMBER_REGEX,
            message = "Invoice number may only contain letters, digits, '.', '_' and '-'"
        )
    )]
    pub invoice_number: Option<String>,

    pub client_id: Option<Uuid>,

    pub company_id: Option<Uuid>,

    pub issue_date: Option<NaiveDate>,

    pub due_date: Option<NaiveDate>,

    pub currency: Option<Currency>,

    pub notes: Option<String>,

    pub template: Option<TemplateKind>,

    #[validate(custom(function = "valid_discount"))]
    pub discount: Option<Discount>,

    pub tax_rate: Option<Decimal>,

    pub vat_applicable: Option<bool>,

    pub withholding_applicable: Option<bool>,

    #[validate(length(min = 1, message = "At least one line item is required"), nested)]
    pub line_items: Option<Vec<LineItemRequest>>,
}

/// Unvalidated draft for the totals preview.
#[derive(Debug, Clone, Deserialize)]
pub struct PreviewRequest {
    #[serde(default)]
    pub line_items: Vec<LineItemDraft>,

    #[serde(default)]
    pub discount: Discount,

    pub tax_rate: Option<Decimal>,

    #[serde(default = "default_true")]
    pub vat_applicable: bool,

    #[serde(default)]
    pub withholding_applicable: bool,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub lines: Vec<LineTotals>,
    /// Running-total computation shown while editing.
    pub totals: ComputedTotals,
    /// Per-line tax computation used when the invoice is saved.
    pub line_level_totals: ComputedTotals,
    pub totals_diverge: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: InvoiceStatus,
    /// Only used when marking an invoice paid; defaults to today.
    pub payment_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListInvoicesQuery {
    pub status: Option<InvoiceStatus>,
    pub client_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub page_size: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RenderQuery {
    /// Overrides the template stored on the invoice.
    pub template: Option<TemplateKind>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn draft() -> serde_json::Value {
        json!({
            "client_id": Uuid::new_v4(),
            "company_id": Uuid::new_v4(),
            "issue_date": "2024-03-01",
            "due_date": "2024-03-31",
            "discount": {"kind": "fixed", "value": "20"},
            "tax_rate": "16",
            "line_items": [
                {"description": "Design work", "quantity": "1", "rate": "100"}
            ]
        })
    }

    fn parse(value: serde_json::Value) -> CreateInvoiceRequest {
        serde_json::from_value(value).expect("invoice request should parse")
    }

    #[test]
    fn accepts_well_formed_draft_with_defaults() {
        let req = parse(draft());
        assert!(req.validate().is_ok());
        assert!(req.vat_applicable);
        assert!(!req.withholding_applicable);
        assert_eq!(req.template, TemplateKind::Modern);
        assert!(req.line_items[0].vat_applicable);
    }

    #[test]
    fn requires_at_least_one_line_item() {
        let mut value = draft();
        value["line_items"] = json!([]);
        let errors = parse(value).validate().expect_err("empty items");
        assert!(errors.field_errors().contains_key("line_items"));
    }

    #[test]
    fn rejects_zero_quantity_and_negative_rate() {
        let mut value = draft();
        value["line_items"] = json!([
            {"description": "A", "quantity": "0", "rate": "10"},
            {"description": "B", "quantity": "1", "rate": "-1"}
        ]);
        assert!(parse(value).validate().is_err());
    }

    #[test]
    fn rejects_blank_description() {
        let mut value = draft();
        value["line_items"] = json!([{"description": "", "quantity": "1", "rate": "1"}]);
        assert!(parse(value).validate().is_err());
    }

    #[test]
    fn rejects_due_date_before_issue_date() {
        let mut value = draft();
        value["due_date"] = json!("2024-02-01");
        let errors = parse(value).validate().expect_err("dates");
        assert!(errors.errors().contains_key("__all__"));
    }

    #[test]
    fn rejects_out_of_range_percentages() {
        let mut value = draft();
        value["tax_rate"] = json!("120");
        assert!(parse(value).validate().is_err());

        let mut value = draft();
        value["discount"] = json!({"kind": "percentage", "value": "150"});
        assert!(parse(value).validate().is_err());
    }

    #[test]
    fn line_request_becomes_calculator_input() {
        let req = parse(draft());
        let item: LineItemDraft = req.line_items[0].clone().into();
        assert_eq!(item.quantity, dec!(1));
        assert_eq!(item.rate, dec!(100));
        assert_eq!(item.discount, Discount::None);
    }

    #[test]
    fn update_checks_replacement_items() {
        let update: UpdateInvoiceRequest = serde_json::from_value(json!({
            "line_items": [{"description": "X", "quantity": "-2", "rate": "5"}]
        }))
        .expect("update should parse");
        assert!(update.validate().is_err());

        let update: UpdateInvoiceRequest =
            serde_json::from_value(json!({"notes": "Updated"})).expect("update should parse");
        assert!(update.validate().is_ok());
    }

    #[test]
    fn rejects_amounts_beyond_storage_range() {
        let mut value = draft();
        value["line_items"] = json!([
            {"description": "Fleet", "quantity": "1000000000000000", "rate": "1"}
        ]);
        let errors = parse(value).validate().expect_err("quantity too large");
        assert!(errors.errors().contains_key("line_items"));

        let mut value = draft();
        value["discount"] = json!({"kind": "fixed", "value": "1000000000000000"});
        assert!(parse(value).validate().is_err());
    }

    #[test]
    fn invoice_numbers_are_header_safe() {
        for good in ["INV-2024-001", "acme.7", "Q3_2024"] {
            let mut value = draft();
            value["invoice_number"] = json!(good);
            assert!(parse(value).validate().is_ok(), "{} should be accepted", good);
        }

        for bad in ["INV \"1\"", "-leading", "INV/2024", "INV\r\n1", ""] {
            let mut value = draft();
            value["invoice_number"] = json!(bad);
            let errors = parse(value).validate().expect_err(bad);
            assert!(errors.field_errors().contains_key("invoice_number"));
        }
    }

    #[test]
    fn unknown_template_fails_to_parse() {
        let mut value = draft();
        value["template"] = json!("professional");
        assert!(serde_json::from_value::<CreateInvoiceRequest>(value).is_err());
    }

    #[test]
    fn preview_accepts_bare_items() {
        let req: PreviewRequest = serde_json::from_value(json!({
            "line_items": [{"quantity": 2, "rate": 50}]
        }))
        .expect("preview should parse");
        assert_eq!(req.line_items.len(), 1);
        assert!(req.vat_applicable);
        assert_eq!(req.tax_rate, None);
    }
}
