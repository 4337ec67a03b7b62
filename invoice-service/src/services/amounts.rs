//! Tax-exclusive amount calculation.
//!
//! Every total in the service goes through [`line_item_ht`]. Dedup
//! validation, reconciliation, and subtotal recomputation must not
//! diverge on how a line's tax-exclusive contribution is computed.

use rust_decimal::Decimal;

use crate::models::{ExtractedLineItem, TaxBasis};

/// Tax-exclusive (HT) contribution of a single extracted line.
///
/// A tax-inclusive `total_price` is deflated by the line's tax rate;
/// everything else falls back to `unit_price * quantity`. Missing
/// numeric fields count as zero (quantity: one) to tolerate extraction
/// gaps. No rounding happens here; callers round at presentation and
/// comparison boundaries only.
pub fn line_item_ht(item: &ExtractedLineItem) -> Decimal {
    if item.tax_basis == TaxBasis::Inclusive {
        if let Some(total) = item.total_price {
            let rate = item.tax_rate.unwrap_or(Decimal::ZERO);
            let divisor = Decimal::ONE + rate / Decimal::ONE_HUNDRED;
            if !divisor.is_zero() {
                return total / divisor;
            }
        }
    }

    let unit_price = item.unit_price.unwrap_or(Decimal::ZERO);
    let quantity = item.quantity.unwrap_or(Decimal::ONE);
    unit_price * quantity
}

/// Tax-exclusive subtotal of an item array, unrounded.
pub fn items_subtotal(items: &[ExtractedLineItem]) -> Decimal {
    items.iter().map(line_item_ht).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(
        quantity: Option<Decimal>,
        unit_price: Option<Decimal>,
        total_price: Option<Decimal>,
        tax_rate: Option<Decimal>,
        tax_basis: TaxBasis,
    ) -> ExtractedLineItem {
        ExtractedLineItem {
            description: "item".to_string(),
            quantity,
            unit_price,
            total_price,
            tax_rate,
            tax_basis,
            ..Default::default()
        }
    }

    #[test]
    fn inclusive_total_is_deflated_by_tax_rate() {
        let line = item(
            None,
            None,
            Some(dec!(120)),
            Some(dec!(20)),
            TaxBasis::Inclusive,
        );
        assert_eq!(line_item_ht(&line).round_dp(2), dec!(100.00));
    }

    #[test]
    fn exclusive_and_unknown_use_unit_price_times_quantity() {
        let line = item(
            Some(dec!(10)),
            Some(dec!(2)),
            Some(dec!(20)),
            None,
            TaxBasis::Exclusive,
        );
        assert_eq!(line_item_ht(&line), dec!(20));

        let line = item(Some(dec!(3)), Some(dec!(1.50)), None, None, TaxBasis::Unknown);
        assert_eq!(line_item_ht(&line), dec!(4.50));
    }

    #[test]
    fn missing_fields_default_leniently() {
        // No unit price: contributes zero.
        let line = item(Some(dec!(4)), None, None, None, TaxBasis::Unknown);
        assert_eq!(line_item_ht(&line), Decimal::ZERO);

        // No quantity: defaults to one.
        let line = item(None, Some(dec!(7)), None, None, TaxBasis::Unknown);
        assert_eq!(line_item_ht(&line), dec!(7));

        // Inclusive without a total falls back to unit * quantity.
        let line = item(
            Some(dec!(2)),
            Some(dec!(5)),
            None,
            Some(dec!(20)),
            TaxBasis::Inclusive,
        );
        assert_eq!(line_item_ht(&line), dec!(10));
    }

    #[test]
    fn subtotal_sums_without_intermediate_rounding() {
        let lines = vec![
            item(
                None,
                None,
                Some(dec!(1)),
                Some(dec!(3)),
                TaxBasis::Inclusive,
            ),
            item(
                None,
                None,
                Some(dec!(1)),
                Some(dec!(3)),
                TaxBasis::Inclusive,
            ),
            item(
                None,
                None,
                Some(dec!(1)),
                Some(dec!(3)),
                TaxBasis::Inclusive,
            ),
        ];
        // 3 * (1 / 1.03) rounded once at the end, not three times.
        let expected = (dec!(3) / dec!(1.03)).round_dp(2);
        assert_eq!(items_subtotal(&lines).round_dp(2), expected);
    }
}
