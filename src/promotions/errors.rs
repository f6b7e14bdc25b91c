//! Promotion errors.

use jiff::civil::Date;
use rust_decimal::Decimal;
use thiserror::Error;

/// Reasons a promotion can't be applied to a cart.
#[derive(Debug, Error)]
pub enum PromotionError {
    /// No promotion has this code.
    #[error("promotion {code:?} not found")]
    NotFound {
        /// Code that was looked up
        code: String,
    },

    /// The promotion is inactive or outside its validity window.
    #[error("promotion {code:?} is invalid or expired")]
    InvalidOrExpired {
        /// Code of the unusable promotion
        code: String,
    },

    /// No cart line qualifies for the promotion.
    #[error("no items in the cart are eligible for this promotion")]
    NoEligibleItems,

    /// Too few qualifying units.
    #[error("at least {minimum} eligible items are required, cart has {actual}")]
    QuantityBelowMinimum {
        /// Required minimum
        minimum: u32,
        /// Eligible units in the cart
        actual: u64,
    },

    /// Too many qualifying units.
    #[error("at most {maximum} eligible items are allowed, cart has {actual}")]
    QuantityAboveMaximum {
        /// Allowed maximum
        maximum: u32,
        /// Eligible units in the cart
        actual: u64,
    },

    /// Cart subtotal below the promotion's minimum spend.
    #[error("minimum purchase of {minimum} not reached, cart subtotal is {subtotal}")]
    BelowMinimumPurchase {
        /// Required subtotal
        minimum: Decimal,
        /// Cart subtotal
        subtotal: Decimal,
    },

    /// The stored promotion can't be evaluated.
    #[error(transparent)]
    Definition(#[from] PromotionDefinitionError),

    /// The promotion store failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl PromotionError {
    /// Message key for the caller to report.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "PromotionNotFound",
            Self::InvalidOrExpired { .. } => "InvalidOrExpiredPromotion",
            Self::NoEligibleItems => "NoEligibleItems",
            Self::QuantityBelowMinimum { .. } => "QuantityBelowMinimum",
            Self::QuantityAboveMaximum { .. } => "QuantityAboveMaximum",
            Self::BelowMinimumPurchase { .. } => "BelowMinimumPurchase",
            Self::Definition(_) => "InvalidPromotionDefinition",
            Self::Repository(_) => "PromotionRepositoryUnavailable",
        }
    }

    /// Whether this is an expected, user-facing condition rather than a fault.
    pub const fn is_user_facing(&self) -> bool {
        !matches!(self, Self::Repository(RepositoryError::Unavailable(_)))
    }
}

/// A promotion record that doesn't describe a usable discount.
#[derive(Debug, Error, PartialEq)]
pub enum PromotionDefinitionError {
    /// Code is blank.
    #[error("promotion code must not be empty")]
    EmptyCode,

    /// Start date is after end date.
    #[error("promotion starts on {start} but ends on {end}")]
    InvalidWindow {
        /// Start date
        start: Date,
        /// End date
        end: Date,
    },

    /// Percentage outside (0, 100].
    #[error("percentage {0} must be greater than 0 and at most 100")]
    InvalidPercentage(Decimal),

    /// Fixed amount not positive.
    #[error("fixed amount {0} must be greater than 0")]
    InvalidAmount(Decimal),

    /// A buy/get quantity pair couldn't be determined.
    #[error("invalid buy-x-get-y value {0:?}, expected \"buy:get\" with both at least 1")]
    InvalidBuyXGetY(String),

    /// A numeric value was given where a ratio is needed, or vice versa.
    #[error("value {0:?} does not match the promotion type")]
    ValueTypeMismatch(String),

    /// Minimum quantity exceeds maximum.
    #[error("minimum quantity {minimum} exceeds maximum quantity {maximum}")]
    InvalidQuantityBounds {
        /// Minimum
        minimum: u32,
        /// Maximum
        maximum: u32,
    },

    /// Minimum purchase is negative.
    #[error("minimum purchase {0} must not be negative")]
    NegativeMinimumPurchase(Decimal),
}

/// Promotion store failures.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Storage couldn't be reached.
    #[error("promotion storage unavailable: {0}")]
    Unavailable(String),

    /// Another promotion already uses this code.
    #[error("promotion code {0:?} already exists")]
    DuplicateCode(String),

    /// Rejected on write.
    #[error("invalid promotion: {0}")]
    InvalidDefinition(#[from] PromotionDefinitionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_match_message_keys() {
        assert_eq!(
            PromotionError::InvalidOrExpired {
                code: "X".to_string()
            }
            .kind(),
            "InvalidOrExpiredPromotion"
        );
        assert_eq!(
            PromotionError::QuantityAboveMaximum {
                maximum: 2,
                actual: 3
            }
            .kind(),
            "QuantityAboveMaximum"
        );
    }

    #[test]
    fn storage_outage_is_not_user_facing() {
        let outage = PromotionError::Repository(RepositoryError::Unavailable("down".to_string()));

        assert!(!outage.is_user_facing());
        assert!(PromotionError::NoEligibleItems.is_user_facing());
    }
}
