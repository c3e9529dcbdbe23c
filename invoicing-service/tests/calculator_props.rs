//! Property tests for invoice total computation.

use invoicing_service::calculator::{
    compute_line_level_totals, compute_totals, round_currency, Discount, InvoiceModifiers,
    LineItemDraft,
};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Amount with two decimal places, 0.00 to 10,000.00.
fn money() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn quantity() -> impl Strategy<Value = Decimal> {
    (1i64..10_000).prop_map(|hundredths| Decimal::new(hundredths, 2))
}

fn percent() -> impl Strategy<Value = Decimal> {
    (0i64..=10_000).prop_map(|basis| Decimal::new(basis, 2))
}

fn discount() -> impl Strategy<Value = Discount> {
    prop_oneof![
        Just(Discount::None),
        percent().prop_map(Discount::Percentage),
        money().prop_map(Discount::Fixed),
    ]
}

/// Invoice discount that leaves at least 5% of the subtotal standing.
fn partial_discount() -> impl Strategy<Value = Discount> {
    prop_oneof![
        Just(Discount::None),
        (0i64..=9_500).prop_map(|basis| Discount::Percentage(Decimal::new(basis, 2))),
        money().prop_map(Discount::Fixed),
    ]
}

fn line_item() -> impl Strategy<Value = LineItemDraft> {
    (quantity(), money(), discount(), any::<bool>(), any::<bool>()).prop_map(
        |(quantity, rate, discount, vat, withholding)| LineItemDraft {
            description: "Item".to_string(),
            quantity,
            rate,
            discount,
            vat_applicable: vat,
            withholding_tax_applicable: withholding,
        },
    )
}

fn modifiers() -> impl Strategy<Value = InvoiceModifiers> {
    (discount(), percent(), any::<bool>(), any::<bool>()).prop_map(
        |(discount, tax_rate, vat_applicable, withholding_applicable)| InvoiceModifiers {
            discount,
            tax_rate,
            vat_applicable,
            withholding_applicable,
        },
    )
}

proptest! {
    #[test]
    fn totals_are_deterministic(
        items in prop::collection::vec(line_item(), 0..8),
        modifiers in modifiers(),
    ) {
        prop_assert_eq!(compute_totals(&items, &modifiers), compute_totals(&items, &modifiers));
        prop_assert_eq!(
            compute_line_level_totals(&items, modifiers.discount, modifiers.tax_rate),
            compute_line_level_totals(&items, modifiers.discount, modifiers.tax_rate)
        );
    }

    #[test]
    fn totals_have_at_most_two_decimal_places(
        items in prop::collection::vec(line_item(), 0..8),
        modifiers in modifiers(),
    ) {
        prop_assert!(compute_totals(&items, &modifiers).total.scale() <= 2);
        prop_assert!(
            compute_line_level_totals(&items, modifiers.discount, modifiers.tax_rate)
                .total
                .scale()
                <= 2
        );
    }

    #[test]
    fn raising_the_tax_rate_never_lowers_the_total(
        items in prop::collection::vec(line_item(), 1..6),
        low in percent(),
        high in percent(),
    ) {
        let (low, high) = if low <= high { (low, high) } else { (high, low) };
        let at = |tax_rate| {
            compute_totals(&items, &InvoiceModifiers {
                discount: Discount::None,
                tax_rate,
                vat_applicable: true,
                withholding_applicable: false,
            })
        };

        let (low_total, high_total) = (at(low), at(high));
        if low_total.subtotal >= Decimal::ZERO {
            prop_assert!(high_total.total >= low_total.total);
        }
    }

    #[test]
    fn appending_an_undiscounted_line_never_lowers_the_subtotal(
        items in prop::collection::vec(line_item(), 0..6),
        quantity in quantity(),
        rate in money(),
        modifiers in modifiers(),
    ) {
        let before = compute_totals(&items, &modifiers);

        let mut extended = items.clone();
        extended.push(LineItemDraft {
            description: "Extra".to_string(),
            quantity,
            rate,
            discount: Discount::None,
            vat_applicable: true,
            withholding_tax_applicable: false,
        });
        let after = compute_totals(&extended, &modifiers);

        prop_assert!(after.subtotal >= before.subtotal);
    }

    #[test]
    fn raising_a_rate_never_lowers_draft_totals(
        items in prop::collection::vec(line_item(), 1..6),
        index in any::<prop::sample::Index>(),
        delta in money(),
        modifiers in modifiers(),
    ) {
        let mut raised = items.clone();
        let i = index.index(raised.len());
        raised[i].rate += delta;

        let before = compute_totals(&items, &modifiers);
        let after = compute_totals(&raised, &modifiers);

        prop_assert!(after.subtotal >= before.subtotal);
        prop_assert!(after.total >= before.total);
    }

    // Withholding comes off gross line amounts, so an invoice discount above
    // 95% with withholding can make this total fall as a line grows.
    #[test]
    fn raising_a_rate_never_lowers_line_level_totals(
        items in prop::collection::vec(line_item(), 1..6),
        index in any::<prop::sample::Index>(),
        delta in money(),
        discount in partial_discount(),
        tax_rate in percent(),
    ) {
        let mut raised = items.clone();
        let i = index.index(raised.len());
        raised[i].rate += delta;

        let before = compute_line_level_totals(&items, discount, tax_rate);
        let after = compute_line_level_totals(&raised, discount, tax_rate);

        prop_assert!(after.subtotal >= before.subtotal);
        prop_assert!(after.total >= before.total);
    }

    #[test]
    fn without_modifiers_total_is_rounded_subtotal(
        items in prop::collection::vec(line_item(), 0..8),
    ) {
        let totals = compute_totals(&items, &InvoiceModifiers::default());
        prop_assert_eq!(totals.total, round_currency(totals.subtotal));
        prop_assert_eq!(totals.tax_amount, Decimal::ZERO);
        prop_assert_eq!(totals.withholding_amount, Decimal::ZERO);
    }
}
