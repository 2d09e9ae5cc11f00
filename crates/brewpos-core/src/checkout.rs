//! # Checkout Math
//!
//! Pure arithmetic for a sale: subtotal, discount, tax, total, change.
//!
//! ## Where This Runs
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  POST /sales                                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Load products, check stock          (brewpos-db, inside transaction)  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CheckoutTotals::compute(...)        ← THIS MODULE (pure)              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Persist sale + items, decrement stock, commit                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The rules, in order:
//! 1. subtotal = Σ unit_price × quantity
//! 2. discount clamped to 0 ..= subtotal
//! 3. tax = (subtotal − discount) × rate, half-up to whole cents
//! 4. total = subtotal − discount + tax
//! 5. received defaults to total (exact payment for card/digital)
//! 6. change = max(0, received − total)

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::TaxRate;

// =============================================================================
// Priced Line
// =============================================================================

/// A sale line after price-snapshot resolution: the product's current
/// unit price captured together with the requested quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: String,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: i64,
}

impl PricedLine {
    /// Line subtotal: unit price × quantity.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Checkout Totals
// =============================================================================

/// The complete money breakdown of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub total: Money,
    pub received: Money,
    pub change: Money,
}

impl CheckoutTotals {
    /// Computes the full breakdown for a set of priced lines.
    ///
    /// ## Arguments
    /// * `lines` - resolved lines with price snapshots
    /// * `discount` - requested discount; clamped to 0 ..= subtotal
    /// * `rate` - tax rate applied to the discounted subtotal
    /// * `received` - amount tendered; `None` means exact payment
    pub fn compute(
        lines: &[PricedLine],
        discount: Money,
        rate: TaxRate,
        received: Option<Money>,
    ) -> Self {
        let mut subtotal = Money::zero();
        for line in lines {
            subtotal += line.line_total();
        }

        let discount = if discount.is_negative() {
            Money::zero()
        } else if discount > subtotal {
            subtotal
        } else {
            discount
        };

        let taxable = subtotal - discount;
        let tax = taxable.calculate_tax(rate);
        let total = taxable + tax;

        let received = received.unwrap_or(total);
        let change = (received - total).clamp_non_negative();

        CheckoutTotals {
            subtotal,
            discount,
            tax,
            total,
            received,
            change,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(name: &str, price_cents: i64, qty: i64) -> PricedLine {
        PricedLine {
            product_id: format!("id-{name}"),
            product_name: name.to_string(),
            unit_price: Money::from_cents(price_cents),
            quantity: qty,
        }
    }

    /// Cart [A×2 @ $50.00, B×1 @ $30.00], no discount, cash $200.00:
    /// subtotal $130.00, tax $13.00, total $143.00, change $57.00.
    #[test]
    fn test_reference_cart() {
        let lines = vec![line("A", 5_000, 2), line("B", 3_000, 1)];
        let totals = CheckoutTotals::compute(
            &lines,
            Money::zero(),
            TaxRate::from_bps(1_000),
            Some(Money::from_cents(20_000)),
        );

        assert_eq!(totals.subtotal.cents(), 13_000);
        assert_eq!(totals.tax.cents(), 1_300);
        assert_eq!(totals.total.cents(), 14_300);
        assert_eq!(totals.change.cents(), 5_700);
    }

    #[test]
    fn test_total_invariant() {
        let lines = vec![line("A", 1_234, 3), line("B", 567, 2)];
        let totals = CheckoutTotals::compute(
            &lines,
            Money::from_cents(500),
            TaxRate::from_bps(1_000),
            None,
        );

        assert_eq!(
            totals.total,
            totals.subtotal - totals.discount + totals.tax
        );
    }

    #[test]
    fn test_received_defaults_to_exact_payment() {
        let lines = vec![line("A", 450, 1)];
        let totals =
            CheckoutTotals::compute(&lines, Money::zero(), TaxRate::from_bps(1_000), None);

        assert_eq!(totals.received, totals.total);
        assert_eq!(totals.change.cents(), 0);
    }

    #[test]
    fn test_discount_clamped_to_subtotal() {
        let lines = vec![line("A", 1_000, 1)];
        let totals = CheckoutTotals::compute(
            &lines,
            Money::from_cents(5_000),
            TaxRate::from_bps(1_000),
            None,
        );

        assert_eq!(totals.discount.cents(), 1_000);
        assert_eq!(totals.total.cents(), 0);
    }

    #[test]
    fn test_negative_discount_clamped_to_zero() {
        let lines = vec![line("A", 1_000, 1)];
        let totals = CheckoutTotals::compute(
            &lines,
            Money::from_cents(-100),
            TaxRate::from_bps(1_000),
            None,
        );

        assert_eq!(totals.discount.cents(), 0);
    }

    #[test]
    fn test_underpayment_never_yields_negative_change() {
        let lines = vec![line("A", 10_000, 1)];
        let totals = CheckoutTotals::compute(
            &lines,
            Money::zero(),
            TaxRate::from_bps(1_000),
            Some(Money::from_cents(5_000)),
        );

        assert_eq!(totals.change.cents(), 0);
    }

    #[test]
    fn test_zero_tax_rate() {
        let lines = vec![line("A", 1_000, 2)];
        let totals = CheckoutTotals::compute(&lines, Money::zero(), TaxRate::zero(), None);

        assert_eq!(totals.tax.cents(), 0);
        assert_eq!(totals.total.cents(), 2_000);
    }
}
