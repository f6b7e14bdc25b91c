//! Promotion Application

use jiff::civil::Date;
use rust_decimal::Decimal;
use rusty_money::iso::Currency;
use serde::Serialize;
use smallvec::SmallVec;

use crate::{
    cart::{AppliedPromotion, Cart, CartLine},
    discounts::{DiscountBreakdown, LineDiscount, check_eligibility, compute_discount},
    promotions::{Promotion, PromotionError, repository::PromotionRepository, validity},
};

/// Outcome of applying a promotion to a cart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionApplication {
    /// Code applied
    pub code: String,

    /// Promotion name
    pub name: String,

    /// Discount before capping
    pub computed_discount: Decimal,

    /// Discount recorded on the cart
    pub discount_amount: Decimal,

    /// Whether the computed discount exceeded the subtotal and was reduced
    pub discount_capped: bool,

    /// Uncapped discount per qualifying line
    pub per_line_discount: SmallVec<[LineDiscount; 8]>,
}

/// Check a promotion is usable and eligible for `lines`, then price it.
///
/// # Errors
///
/// - [`PromotionError::InvalidOrExpired`]: inactive or outside its window.
/// - Any pre-check failure from [`check_eligibility`].
/// - [`PromotionError::Definition`]: the value can't be decoded.
pub fn evaluate(
    lines: &[CartLine],
    promotion: &Promotion,
    today: Date,
    currency: &Currency,
) -> Result<DiscountBreakdown, PromotionError> {
    validity::ensure_usable(promotion, today)?;
    check_eligibility(lines, promotion)?;

    Ok(compute_discount(lines, promotion, currency)?)
}

/// Apply an already resolved promotion, replacing any previous one.
///
/// On failure the cart is left as it was, including its previous promotion.
///
/// # Errors
///
/// See [`evaluate`].
pub fn apply_resolved(
    cart: &mut Cart,
    promotion: &Promotion,
    today: Date,
    currency: &Currency,
) -> Result<PromotionApplication, PromotionError> {
    let breakdown = evaluate(cart.lines(), promotion, today, currency)?;

    let discount_capped =
        cart.set_promotion(AppliedPromotion::from(promotion), breakdown.total_discount);

    Ok(PromotionApplication {
        code: promotion.code.clone(),
        name: promotion.name.clone(),
        computed_discount: breakdown.total_discount,
        discount_amount: cart.discount_amount(),
        discount_capped,
        per_line_discount: breakdown.per_line_discount,
    })
}

/// Resolve `code` and apply it to the cart.
///
/// # Errors
///
/// - [`PromotionError::NotFound`]: no promotion has this code.
/// - [`PromotionError::Repository`]: the lookup failed.
/// - Anything [`apply_resolved`] returns.
pub fn apply_promotion(
    cart: &mut Cart,
    code: &str,
    repository: &dyn PromotionRepository,
    today: Date,
    currency: &Currency,
) -> Result<PromotionApplication, PromotionError> {
    let promotion = repository
        .promotion_by_code(code)?
        .ok_or_else(|| PromotionError::NotFound {
            code: code.to_string(),
        })?;

    apply_resolved(cart, &promotion, today, currency)
}
