//! Cart Totals

use rust_decimal::Decimal;
use rusty_money::iso::Currency;
use serde::Serialize;

use crate::{cart::Cart, config::ConfigError, money::round_to_minor};

/// A VAT percentage between 0 and 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VatRate(Decimal);

impl VatRate {
    /// Validate a VAT percentage.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::NegativeVatRate`]: the rate is below zero.
    /// - [`ConfigError::VatRateTooHigh`]: the rate is above 100.
    pub fn new(percent: Decimal) -> Result<Self, ConfigError> {
        if percent < Decimal::ZERO {
            return Err(ConfigError::NegativeVatRate(percent));
        }

        if percent > Decimal::ONE_HUNDRED {
            return Err(ConfigError::VatRateTooHigh(percent));
        }

        Ok(Self(percent))
    }

    /// The rate as a percentage.
    pub const fn percent(self) -> Decimal {
        self.0
    }
}

impl Default for VatRate {
    fn default() -> Self {
        Self(Decimal::ZERO)
    }
}

/// Derived money figures for a cart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    /// Sum of line subtotals
    pub subtotal: Decimal,

    /// Applied discount
    pub discount: Decimal,

    /// `subtotal - discount`
    pub subtotal_after_discount: Decimal,

    /// VAT percentage used
    pub vat_rate: VatRate,

    /// VAT on the discounted subtotal, rounded to minor units
    pub vat_amount: Decimal,

    /// `subtotal_after_discount + vat_amount`
    pub total: Decimal,

    /// Units across all lines
    pub item_count: u64,
}

/// Compute subtotal, discount, VAT and total for a cart.
pub fn recompute_totals(cart: &Cart, vat_rate: VatRate, currency: &Currency) -> CartTotals {
    let subtotal = cart.subtotal();
    let discount = cart.discount_amount();
    let subtotal_after_discount = subtotal - discount;
    let vat_amount = round_to_minor(
        subtotal_after_discount * vat_rate.percent() / Decimal::ONE_HUNDRED,
        currency,
    );

    CartTotals {
        subtotal,
        discount,
        subtotal_after_discount,
        vat_rate,
        vat_amount,
        total: subtotal_after_discount + vat_amount,
        item_count: cart.item_count(),
    }
}
