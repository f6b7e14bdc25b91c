//! Discounts
//!
//! Per-type discount calculation over the qualifying lines of a cart. The
//! caller checks the promotion is usable and caps the result at the cart
//! subtotal; nothing here does either.

use rust_decimal::Decimal;
use rusty_money::iso::Currency;
use serde::Serialize;
use smallvec::SmallVec;

use crate::{
    cart::CartLine,
    money::round_to_minor,
    products::ProductId,
    promotions::{
        DiscountRule, Promotion, PromotionDefinitionError, PromotionError,
        applicability::{applicable_lines, is_applicable},
    },
};

/// Discount granted on a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineDiscount {
    /// Line's product
    pub product_id: ProductId,

    /// Amount off the line, in minor-unit precision
    pub amount: Decimal,
}

/// Result of a discount calculation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountBreakdown {
    /// Sum of `per_line_discount`
    pub total_discount: Decimal,

    /// One entry per qualifying line, in cart order
    pub per_line_discount: SmallVec<[LineDiscount; 8]>,
}

impl FromIterator<LineDiscount> for DiscountBreakdown {
    fn from_iter<I: IntoIterator<Item = LineDiscount>>(iter: I) -> Self {
        let per_line_discount: SmallVec<[LineDiscount; 8]> = iter.into_iter().collect();
        let total_discount = per_line_discount.iter().map(|line| line.amount).sum();

        Self {
            total_discount,
            per_line_discount,
        }
    }
}

/// What qualified, as measured by the pre-checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eligibility {
    /// Units across qualifying lines
    pub applicable_quantity: u64,

    /// Subtotal across qualifying lines
    pub applicable_subtotal: Decimal,
}

/// Run the pre-checks that gate applying a promotion.
///
/// Checks run in order: any line qualifies, minimum quantity, maximum
/// quantity, then minimum purchase against the full cart subtotal.
///
/// # Errors
///
/// - [`PromotionError::NoEligibleItems`]
/// - [`PromotionError::QuantityBelowMinimum`]
/// - [`PromotionError::QuantityAboveMaximum`]
/// - [`PromotionError::BelowMinimumPurchase`]
pub fn check_eligibility(
    lines: &[CartLine],
    promotion: &Promotion,
) -> Result<Eligibility, PromotionError> {
    let (applicable_quantity, applicable_subtotal, any) = applicable_lines(lines, promotion).fold(
        (0_u64, Decimal::ZERO, false),
        |(quantity, subtotal, _), line| {
            (
                quantity + u64::from(line.quantity),
                subtotal + line.subtotal(),
                true,
            )
        },
    );

    if !any {
        return Err(PromotionError::NoEligibleItems);
    }

    if let Some(minimum) = promotion.min_quantity {
        if applicable_quantity < u64::from(minimum) {
            return Err(PromotionError::QuantityBelowMinimum {
                minimum,
                actual: applicable_quantity,
            });
        }
    }

    if let Some(maximum) = promotion.max_quantity {
        if applicable_quantity > u64::from(maximum) {
            return Err(PromotionError::QuantityAboveMaximum {
                maximum,
                actual: applicable_quantity,
            });
        }
    }

    if let Some(minimum) = promotion.min_purchase {
        let subtotal: Decimal = lines.iter().map(CartLine::subtotal).sum();

        if subtotal < minimum {
            return Err(PromotionError::BelowMinimumPurchase { minimum, subtotal });
        }
    }

    Ok(Eligibility {
        applicable_quantity,
        applicable_subtotal,
    })
}

/// Compute the discount a promotion grants on `lines`.
///
/// # Errors
///
/// Returns a [`PromotionDefinitionError`] if the promotion's value can't be
/// decoded for its type.
pub fn compute_discount(
    lines: &[CartLine],
    promotion: &Promotion,
    currency: &Currency,
) -> Result<DiscountBreakdown, PromotionDefinitionError> {
    let rule = promotion.rule()?;
    let applicable = lines.iter().filter(|line| is_applicable(line, promotion));

    let breakdown = match rule {
        DiscountRule::Percentage(percent) => applicable
            .map(|line| LineDiscount {
                product_id: line.product_id,
                amount: round_to_minor(line.subtotal() * percent / Decimal::ONE_HUNDRED, currency),
            })
            .collect(),
        DiscountRule::Fixed(amount) => {
            let applicable: SmallVec<[&CartLine; 8]> = applicable.collect();

            distribute_fixed(&applicable, amount, currency)
        }
        DiscountRule::BuyXGetY { buy, get } => applicable
            .map(|line| LineDiscount {
                product_id: line.product_id,
                amount: round_to_minor(
                    Decimal::from(free_units(line.quantity, buy, get)) * line.unit_price,
                    currency,
                ),
            })
            .collect(),
    };

    Ok(breakdown)
}

/// Free units for a line: one set per `buy` units, `get` free per set, never
/// more than the line holds.
fn free_units(quantity: u32, buy: u32, get: u32) -> u32 {
    let sets = quantity.checked_div(buy).unwrap_or(0);

    sets.saturating_mul(get).min(quantity)
}

/// Split `amount` across lines by their share of the qualifying subtotal.
///
/// Each line receives the difference between consecutive rounded running
/// totals, so shares never go negative and always sum to the rounded amount.
fn distribute_fixed(lines: &[&CartLine], amount: Decimal, currency: &Currency) -> DiscountBreakdown {
    let applicable_subtotal: Decimal = lines.iter().map(|line| line.subtotal()).sum();

    if applicable_subtotal <= Decimal::ZERO {
        return lines
            .iter()
            .map(|line| LineDiscount {
                product_id: line.product_id,
                amount: Decimal::ZERO,
            })
            .collect();
    }

    let mut running_subtotal = Decimal::ZERO;
    let mut allocated = Decimal::ZERO;

    lines
        .iter()
        .map(|line| {
            running_subtotal += line.subtotal();

            let cumulative =
                round_to_minor(amount * (running_subtotal / applicable_subtotal), currency);
            let share = cumulative - allocated;

            allocated = cumulative;

            LineDiscount {
                product_id: line.product_id,
                amount: share,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use rusty_money::iso::GBP;
    use testresult::TestResult;

    use crate::{
        cart::test_support::line,
        products::{CategoryId, ProductId},
        promotions::{PromotionType, PromotionValue, test_support::promotion},
    };

    use super::*;

    fn amounts(breakdown: &DiscountBreakdown) -> Vec<Decimal> {
        breakdown
            .per_line_discount
            .iter()
            .map(|line| line.amount)
            .collect()
    }

    #[test]
    fn percentage_discounts_each_line() -> TestResult {
        let promo = promotion(
            "P15",
            PromotionType::Percentage,
            PromotionValue::Amount(dec!(15)),
        );
        let lines = [line(1, dec!(100), 2)];

        let breakdown = compute_discount(&lines, &promo, GBP)?;

        assert_eq!(breakdown.total_discount, dec!(30));

        Ok(())
    }

    #[test]
    fn percentage_rounds_per_line() -> TestResult {
        let promo = promotion(
            "P10",
            PromotionType::Percentage,
            PromotionValue::Amount(dec!(10)),
        );
        let lines = [line(1, dec!(0.25), 1), line(2, dec!(0.25), 1)];

        let breakdown = compute_discount(&lines, &promo, GBP)?;

        // 0.025 rounds to 0.03 on each line.
        assert_eq!(amounts(&breakdown), vec![dec!(0.03), dec!(0.03)]);
        assert_eq!(breakdown.total_discount, dec!(0.06));

        Ok(())
    }

    #[test]
    fn fixed_is_distributed_proportionally() -> TestResult {
        let promo = promotion(
            "F40",
            PromotionType::Fixed,
            PromotionValue::Amount(dec!(40)),
        );
        let lines = [line(1, dec!(100), 1), line(2, dec!(150), 2)];

        let breakdown = compute_discount(&lines, &promo, GBP)?;

        assert_eq!(amounts(&breakdown), vec![dec!(10), dec!(30)]);
        assert_eq!(breakdown.total_discount, dec!(40));

        Ok(())
    }

    #[test]
    fn fixed_shares_sum_exactly_despite_rounding() -> TestResult {
        let promo = promotion(
            "F10",
            PromotionType::Fixed,
            PromotionValue::Amount(dec!(10)),
        );
        let lines = [
            line(1, dec!(1), 1),
            line(2, dec!(1), 1),
            line(3, dec!(1), 1),
        ];

        let breakdown = compute_discount(&lines, &promo, GBP)?;

        assert_eq!(amounts(&breakdown), vec![dec!(3.33), dec!(3.34), dec!(3.33)]);
        assert_eq!(breakdown.total_discount, dec!(10));

        Ok(())
    }

    #[test]
    fn fixed_split_handles_largest_prices() -> TestResult {
        let promo = promotion(
            "HUGE",
            PromotionType::Fixed,
            PromotionValue::Amount(dec!(1000000000000000)),
        );
        let lines = [
            line(1, crate::money::MAX_UNIT_PRICE, 1000),
            line(2, crate::money::MAX_UNIT_PRICE, 1000),
        ];

        let breakdown = compute_discount(&lines, &promo, GBP)?;

        assert_eq!(
            amounts(&breakdown),
            vec![dec!(500000000000000), dec!(500000000000000)]
        );
        assert_eq!(breakdown.total_discount, dec!(1000000000000000));

        Ok(())
    }

    #[test]
    fn fixed_ignores_non_qualifying_lines() -> TestResult {
        let mut promo = promotion(
            "F40",
            PromotionType::Fixed,
            PromotionValue::Amount(dec!(40)),
        );
        promo.applicable_categories.insert(CategoryId::new(1));

        let mut other = line(2, dec!(500), 1);
        other.category_id = Some(CategoryId::new(2));

        let lines = [line(1, dec!(100), 1), other];

        let breakdown = compute_discount(&lines, &promo, GBP)?;

        assert_eq!(breakdown.per_line_discount.len(), 1);
        assert_eq!(breakdown.total_discount, dec!(40));

        Ok(())
    }

    #[test]
    fn fixed_with_zero_applicable_subtotal_is_zero() -> TestResult {
        let promo = promotion(
            "F40",
            PromotionType::Fixed,
            PromotionValue::Amount(dec!(40)),
        );
        let lines = [line(1, Decimal::ZERO, 3)];

        let breakdown = compute_discount(&lines, &promo, GBP)?;

        assert_eq!(breakdown.total_discount, Decimal::ZERO);

        Ok(())
    }

    #[test]
    fn buy_two_get_one_on_seven_units() -> TestResult {
        let mut promo = promotion(
            "B2G1",
            PromotionType::BuyXGetY,
            PromotionValue::default(),
        );
        promo.buy_quantity = Some(2);
        promo.get_quantity = Some(1);

        let lines = [line(1, dec!(10), 7)];

        let breakdown = compute_discount(&lines, &promo, GBP)?;

        assert_eq!(breakdown.total_discount, dec!(30));

        Ok(())
    }

    #[test]
    fn free_units_never_exceed_quantity() {
        assert_eq!(free_units(7, 2, 1), 3);
        assert_eq!(free_units(1, 2, 1), 0);
        assert_eq!(free_units(3, 1, 5), 3);
        assert_eq!(free_units(u32::MAX, 1, u32::MAX), u32::MAX);
    }

    #[test]
    fn eligibility_counts_only_applicable_lines() -> TestResult {
        let mut promo = promotion(
            "P10",
            PromotionType::Percentage,
            PromotionValue::Amount(dec!(10)),
        );
        promo.applicable_products.insert(ProductId::new(1));
        promo.min_quantity = Some(2);

        let lines = [line(1, dec!(10), 2), line(2, dec!(10), 5)];

        let eligibility = check_eligibility(&lines, &promo)?;

        assert_eq!(eligibility.applicable_quantity, 2);
        assert_eq!(eligibility.applicable_subtotal, dec!(20));

        Ok(())
    }

    #[test]
    fn eligibility_reports_each_failure() {
        let mut promo = promotion(
            "P10",
            PromotionType::Percentage,
            PromotionValue::Amount(dec!(10)),
        );
        promo.applicable_products.insert(ProductId::new(1));

        assert!(matches!(
            check_eligibility(&[line(2, dec!(10), 1)], &promo),
            Err(PromotionError::NoEligibleItems)
        ));

        promo.min_quantity = Some(3);

        assert!(matches!(
            check_eligibility(&[line(1, dec!(10), 2)], &promo),
            Err(PromotionError::QuantityBelowMinimum {
                minimum: 3,
                actual: 2
            })
        ));

        promo.min_quantity = None;
        promo.max_quantity = Some(1);

        assert!(matches!(
            check_eligibility(&[line(1, dec!(10), 2)], &promo),
            Err(PromotionError::QuantityAboveMaximum {
                maximum: 1,
                actual: 2
            })
        ));
    }

    #[test]
    fn minimum_purchase_uses_full_cart_subtotal() -> TestResult {
        let mut promo = promotion(
            "P10",
            PromotionType::Percentage,
            PromotionValue::Amount(dec!(10)),
        );
        promo.applicable_products.insert(ProductId::new(1));
        promo.min_purchase = Some(dec!(50));

        // Applicable subtotal is 10, but the cart as a whole reaches 50.
        let lines = [line(1, dec!(10), 1), line(2, dec!(40), 1)];

        check_eligibility(&lines, &promo)?;

        assert!(matches!(
            check_eligibility(&[line(1, dec!(10), 1)], &promo),
            Err(PromotionError::BelowMinimumPurchase { .. })
        ));

        Ok(())
    }
}
