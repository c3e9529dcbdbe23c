//! Invoice total computation.
//!
//! Pure functions over a draft's line items and invoice-level modifiers.
//! Nothing here validates input: a fixed discount larger than its base yields
//! a negative net, and totals are never clamped. Arithmetic saturates at
//! `Decimal::MAX` / `Decimal::MIN` instead of overflowing, so every input
//! produces a result.
//!
//! Two computation paths exist and can disagree for the same draft:
//!
//! - [`compute_totals`] nets every line, then applies the invoice discount,
//!   VAT and withholding to the running total. Used for previews.
//! - [`compute_line_level_totals`] sums gross line amounts, applies the
//!   invoice discount, and adds VAT / subtracts withholding per line according
//!   to each line's flags. Used when an invoice is persisted.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Withholding tax is a fixed 5% policy.
pub const WITHHOLDING_RATE: Decimal = dec!(0.05);

const HUNDRED: Decimal = dec!(100);

/// Discount applied to a line or to the whole invoice.
///
/// Serialized as `{"kind": "percentage", "value": "10"}`; an absent discount
/// deserializes to [`Discount::None`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Discount {
    #[default]
    None,
    /// Percentage of the base, 0-100.
    Percentage(Decimal),
    /// Absolute amount, subtracted as-is.
    Fixed(Decimal),
}

impl Discount {
    /// Amount this discount removes from `base`.
    pub fn amount_on(&self, base: Decimal) -> Decimal {
        match *self {
            Discount::None => Decimal::ZERO,
            Discount::Percentage(value) => base.saturating_mul(value / HUNDRED),
            Discount::Fixed(value) => value,
        }
    }

    /// Storage label, `None` when no discount applies.
    pub fn kind(&self) -> Option<&'static str> {
        match self {
            Discount::None => None,
            Discount::Percentage(_) => Some("percentage"),
            Discount::Fixed(_) => Some("fixed"),
        }
    }

    pub fn value(&self) -> Decimal {
        match *self {
            Discount::None => Decimal::ZERO,
            Discount::Percentage(value) | Discount::Fixed(value) => value,
        }
    }

    /// Rebuild from the stored `(discount_type, discount_value)` pair.
    pub fn from_parts(kind: Option<&str>, value: Decimal) -> Self {
        match kind {
            Some("percentage") => Discount::Percentage(value),
            Some("fixed") => Discount::Fixed(value),
            _ => Discount::None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// One billable row of a draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItemDraft {
    #[serde(default)]
    pub description: String,
    pub quantity: Decimal,
    pub rate: Decimal,
    #[serde(default)]
    pub discount: Discount,
    #[serde(default = "default_true")]
    pub vat_applicable: bool,
    #[serde(default)]
    pub withholding_tax_applicable: bool,
}

/// Invoice-level inputs to [`compute_totals`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InvoiceModifiers {
    #[serde(default)]
    pub discount: Discount,
    /// Percentage, 0-100. Only applied when `vat_applicable` is set.
    #[serde(default)]
    pub tax_rate: Decimal,
    #[serde(default)]
    pub vat_applicable: bool,
    #[serde(default)]
    pub withholding_applicable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineTotals {
    pub amount: Decimal,
    pub discount_amount: Decimal,
    pub net: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ComputedTotals {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub withholding_amount: Decimal,
    pub total: Decimal,
}

impl ComputedTotals {
    pub fn total_before_tax(&self) -> Decimal {
        self.subtotal.saturating_sub(self.discount_amount)
    }
}

/// Round a currency amount to 2 decimal places, halves away from zero.
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn line_totals(item: &LineItemDraft) -> LineTotals {
    let amount = item.quantity.saturating_mul(item.rate);
    let discount_amount = item.discount.amount_on(amount);
    LineTotals {
        amount,
        discount_amount,
        net: amount.saturating_sub(discount_amount),
    }
}

/// Draft path:
/// `total = (Σnet − discount) × (1 + rate/100 if VAT) × (1 − 0.05 if withholding)`,
/// rounded once at the end.
pub fn compute_totals(items: &[LineItemDraft], modifiers: &InvoiceModifiers) -> ComputedTotals {
    let subtotal = items
        .iter()
        .map(|item| line_totals(item).net)
        .fold(Decimal::ZERO, Decimal::saturating_add);
    let discount_amount = modifiers.discount.amount_on(subtotal);
    let pre_tax = subtotal.saturating_sub(discount_amount);

    let tax_amount = if modifiers.vat_applicable {
        pre_tax.saturating_mul(modifiers.tax_rate / HUNDRED)
    } else {
        Decimal::ZERO
    };
    let taxed = pre_tax.saturating_add(tax_amount);

    let withholding_amount = if modifiers.withholding_applicable {
        taxed.saturating_mul(WITHHOLDING_RATE)
    } else {
        Decimal::ZERO
    };

    ComputedTotals {
        subtotal,
        discount_amount,
        tax_amount,
        withholding_amount,
        total: round_currency(taxed.saturating_sub(withholding_amount)),
    }
}

/// Persistence path: VAT and withholding are taken from each line's gross
/// amount according to that line's flags, then summed. Line discounts are
/// recorded per line but do not reduce the subtotal.
pub fn compute_line_level_totals(
    items: &[LineItemDraft],
    invoice_discount: Discount,
    tax_rate: Decimal,
) -> ComputedTotals {
    let mut subtotal = Decimal::ZERO;
    let mut tax_amount = Decimal::ZERO;
    let mut withholding_amount = Decimal::ZERO;

    for item in items {
        let amount = item.quantity.saturating_mul(item.rate);
        subtotal = subtotal.saturating_add(amount);
        if item.vat_applicable {
            tax_amount = tax_amount.saturating_add(amount.saturating_mul(tax_rate / HUNDRED));
        }
        if item.withholding_tax_applicable {
            withholding_amount =
                withholding_amount.saturating_add(amount.saturating_mul(WITHHOLDING_RATE));
        }
    }

    let discount_amount = invoice_discount.amount_on(subtotal);

    ComputedTotals {
        subtotal,
        discount_amount,
        tax_amount,
        withholding_amount,
        total: round_currency(
            subtotal
                .saturating_sub(discount_amount)
                .saturating_add(tax_amount)
                .saturating_sub(withholding_amount),
        ),
    }
}
