//! Promotions

use std::fmt;

use jiff::civil::Date;
use rust_decimal::Decimal;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::{
    ids::TypedId,
    products::{CategoryId, ProductId},
};

pub mod applicability;
mod errors;
pub mod repository;
pub mod validity;

pub use errors::{PromotionDefinitionError, PromotionError, RepositoryError};

/// Promotion Id
pub type PromotionId = TypedId<Promotion>;

/// How a promotion's `value` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionType {
    /// Percent off each qualifying line.
    Percentage,

    /// Flat amount spread across qualifying lines.
    Fixed,

    /// For every X units bought, Y units free.
    BuyXGetY,
}

impl PromotionType {
    /// Wire name of the type.
    #[must_use]
    pub const fn to_str(self) -> &'static str {
        match self {
            Self::Percentage => "percentage",
            Self::Fixed => "fixed",
            Self::BuyXGetY => "buy_x_get_y",
        }
    }
}

/// Raw promotion value: a number, or a `"buy:get"` ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PromotionValue {
    /// Percent or currency amount.
    Amount(Decimal),

    /// Buy/get ratio such as `"2:1"`.
    Ratio(String),
}

impl Default for PromotionValue {
    fn default() -> Self {
        Self::Amount(Decimal::ZERO)
    }
}

impl fmt::Display for PromotionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Amount(amount) => write!(f, "{amount}"),
            Self::Ratio(ratio) => f.write_str(ratio),
        }
    }
}

/// A promotion's discount, decoded from its type and value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountRule {
    /// Percent off, in (0, 100].
    Percentage(Decimal),

    /// Flat amount off, greater than zero.
    Fixed(Decimal),

    /// Buy `buy` units, get `get` units free.
    BuyXGetY {
        /// Units that must be bought per set
        buy: u32,
        /// Units free per set
        get: u32,
    },
}

/// A promotion record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    /// Identifier
    pub id: PromotionId,

    /// Case-sensitive code customers enter
    pub code: String,

    /// Display name
    pub name: String,

    /// Discount type
    #[serde(rename = "type")]
    pub kind: PromotionType,

    /// Type-dependent value
    #[serde(default)]
    pub value: PromotionValue,

    /// Explicit X for `buy_x_get_y`; takes precedence over `value`
    #[serde(default)]
    pub buy_quantity: Option<u32>,

    /// Explicit Y for `buy_x_get_y`; takes precedence over `value`
    #[serde(default)]
    pub get_quantity: Option<u32>,

    /// First valid day, inclusive
    pub start_date: Date,

    /// Last valid day, inclusive
    pub end_date: Date,

    /// Minimum qualifying units
    #[serde(default)]
    pub min_quantity: Option<u32>,

    /// Maximum qualifying units
    #[serde(default)]
    pub max_quantity: Option<u32>,

    /// Minimum cart subtotal
    #[serde(default)]
    pub min_purchase: Option<Decimal>,

    /// Products the promotion is restricted to; empty means unrestricted
    #[serde(default)]
    pub applicable_products: FxHashSet<ProductId>,

    /// Categories the promotion is restricted to; empty means unrestricted
    #[serde(default)]
    pub applicable_categories: FxHashSet<CategoryId>,

    /// Cleared explicitly or by the expiry sweep
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

const fn active_by_default() -> bool {
    true
}

impl Promotion {
    /// Decode the discount this promotion grants.
    ///
    /// # Errors
    ///
    /// Returns a [`PromotionDefinitionError`] if the value is out of range or
    /// doesn't fit the promotion type.
    pub fn rule(&self) -> Result<DiscountRule, PromotionDefinitionError> {
        match self.kind {
            PromotionType::Percentage => {
                let percent = self.amount()?;

                if percent <= Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
                    return Err(PromotionDefinitionError::InvalidPercentage(percent));
                }

                Ok(DiscountRule::Percentage(percent))
            }
            PromotionType::Fixed => {
                let amount = self.amount()?;

                if amount <= Decimal::ZERO {
                    return Err(PromotionDefinitionError::InvalidAmount(amount));
                }

                Ok(DiscountRule::Fixed(amount))
            }
            PromotionType::BuyXGetY => {
                let (buy, get) = self.buy_get_quantities()?;

                Ok(DiscountRule::BuyXGetY { buy, get })
            }
        }
    }

    /// Check the whole record is coherent.
    ///
    /// # Errors
    ///
    /// Returns the first [`PromotionDefinitionError`] found.
    pub fn validate(&self) -> Result<(), PromotionDefinitionError> {
        if self.code.trim().is_empty() {
            return Err(PromotionDefinitionError::EmptyCode);
        }

        if self.start_date > self.end_date {
            return Err(PromotionDefinitionError::InvalidWindow {
                start: self.start_date,
                end: self.end_date,
            });
        }

        if let (Some(minimum), Some(maximum)) = (self.min_quantity, self.max_quantity) {
            if minimum > maximum {
                return Err(PromotionDefinitionError::InvalidQuantityBounds { minimum, maximum });
            }
        }

        if let Some(minimum) = self.min_purchase {
            if minimum.is_sign_negative() {
                return Err(PromotionDefinitionError::NegativeMinimumPurchase(minimum));
            }
        }

        self.rule().map(|_| ())
    }

    /// Short human-readable summary, e.g. "15% off" or "Buy 2 get 1 free".
    #[must_use]
    pub fn describe(&self) -> String {
        match self.rule() {
            Ok(DiscountRule::Percentage(percent)) => format!("{}% off", percent.normalize()),
            Ok(DiscountRule::Fixed(amount)) => format!("{} off", amount.normalize()),
            Ok(DiscountRule::BuyXGetY { buy, get }) => format!("Buy {buy} get {get} free"),
            Err(_) => format!("{} ({})", self.kind.to_str(), self.value),
        }
    }

    fn amount(&self) -> Result<Decimal, PromotionDefinitionError> {
        match &self.value {
            PromotionValue::Amount(amount) => Ok(*amount),
            PromotionValue::Ratio(ratio) => ratio
                .trim()
                .parse()
                .ok()
                .ok_or_else(|| PromotionDefinitionError::ValueTypeMismatch(ratio.clone())),
        }
    }

    fn buy_get_quantities(&self) -> Result<(u32, u32), PromotionDefinitionError> {
        let (buy, get) = match (self.buy_quantity, self.get_quantity) {
            (Some(buy), Some(get)) => (buy, get),
            _ => parse_ratio(&self.value)?,
        };

        if buy == 0 || get == 0 {
            return Err(PromotionDefinitionError::InvalidBuyXGetY(format!(
                "{buy}:{get}"
            )));
        }

        Ok((buy, get))
    }
}

fn parse_ratio(value: &PromotionValue) -> Result<(u32, u32), PromotionDefinitionError> {
    let PromotionValue::Ratio(ratio) = value else {
        return Err(PromotionDefinitionError::ValueTypeMismatch(value.to_string()));
    };

    let invalid = || PromotionDefinitionError::InvalidBuyXGetY(ratio.clone());

    let (buy, get) = ratio.split_once(':').ok_or_else(invalid)?;
    let buy = buy.trim().parse().ok().ok_or_else(invalid)?;
    let get = get.trim().parse().ok().ok_or_else(invalid)?;

    Ok((buy, get))
}
