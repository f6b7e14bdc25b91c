//! Money

use rust_decimal::{Decimal, RoundingStrategy};
use rusty_money::iso::{self, Currency};

/// Largest unit price accepted from the catalog or a stored cart (10^15).
///
/// Quantities are `u32`, so a line subtotal stays below 5 * 10^24 and a
/// percentage of it below 5 * 10^26, inside `Decimal`'s range.
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(0xA4C6_8000, 0x0003_8D7E, 0, false, 0);

/// Whether `price` is a usable unit price: not negative, at most
/// [`MAX_UNIT_PRICE`].
pub fn is_valid_unit_price(price: Decimal) -> bool {
    !price.is_sign_negative() && price <= MAX_UNIT_PRICE
}

/// Round an amount to the currency's minor units, half away from zero.
#[must_use]
pub fn round_to_minor(amount: Decimal, currency: &Currency) -> Decimal {
    amount.round_dp_with_strategy(currency.exponent, RoundingStrategy::MidpointAwayFromZero)
}

/// Resolve an ISO 4217 alpha code to a currency.
pub fn find_currency(code: &str) -> Option<&'static Currency> {
    iso::find(&code.to_ascii_uppercase())
}
