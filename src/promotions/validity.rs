//! Promotion Validity
//!
//! Date comparisons are whole-day and inclusive at both ends.

use jiff::civil::Date;

use crate::promotions::{Promotion, PromotionError};

impl Promotion {
    /// Whether the promotion can be applied on `today`.
    pub fn is_usable_on(&self, today: Date) -> bool {
        self.is_active && self.start_date <= today && today <= self.end_date
    }

    /// Whether the validity window closed before `today`.
    pub fn has_ended_before(&self, today: Date) -> bool {
        self.end_date < today
    }

    /// Deactivate the promotion if its window has closed. Returns whether it
    /// changed.
    pub fn expire(&mut self, today: Date) -> bool {
        if self.is_active && self.has_ended_before(today) {
            self.is_active = false;

            return true;
        }

        false
    }
}

/// Fail unless the promotion is usable on `today`.
///
/// # Errors
///
/// Returns [`PromotionError::InvalidOrExpired`] if inactive or out of window.
pub fn ensure_usable(promotion: &Promotion, today: Date) -> Result<(), PromotionError> {
    if promotion.is_usable_on(today) {
        Ok(())
    } else {
        Err(PromotionError::InvalidOrExpired {
            code: promotion.code.clone(),
        })
    }
}

/// Deactivate every promotion whose window has closed. Returns how many were
/// changed; running it again on the same day changes nothing.
pub fn deactivate_expired<'a>(
    promotions: impl IntoIterator<Item = &'a mut Promotion>,
    today: Date,
) -> usize {
    promotions
        .into_iter()
        .map(|promotion| promotion.expire(today))
        .filter(|changed| *changed)
        .count()
}

#[cfg(test)]
mod tests {
    use jiff::civil::date;
    use rust_decimal_macros::dec;

    use crate::promotions::{PromotionType, PromotionValue, test_support::promotion};

    use super::*;

    fn window(start: Date, end: Date) -> Promotion {
        let mut promo = promotion(
            "WINDOW",
            PromotionType::Fixed,
            PromotionValue::Amount(dec!(5)),
        );
        promo.start_date = start;
        promo.end_date = end;

        promo
    }

    #[test]
    fn window_is_inclusive_at_both_ends() {
        let promo = window(date(2026, 3, 1), date(2026, 3, 31));

        assert!(promo.is_usable_on(date(2026, 3, 1)));
        assert!(promo.is_usable_on(date(2026, 3, 31)));
        assert!(!promo.is_usable_on(date(2026, 2, 28)));
        assert!(!promo.is_usable_on(date(2026, 4, 1)));
    }

    #[test]
    fn inactive_promotion_is_never_usable() {
        let mut promo = window(date(2026, 3, 1), date(2026, 3, 31));
        promo.is_active = false;

        assert!(matches!(
            ensure_usable(&promo, date(2026, 3, 15)),
            Err(PromotionError::InvalidOrExpired { .. })
        ));
    }

    #[test]
    fn sweep_deactivates_once() {
        let today = date(2026, 10, 18);
        let mut promotions = vec![
            window(date(2026, 10, 1), date(2026, 10, 17)),
            window(date(2026, 10, 1), date(2026, 10, 18)),
        ];

        assert_eq!(deactivate_expired(&mut promotions, today), 1);
        assert_eq!(deactivate_expired(&mut promotions, today), 0);

        let active: Vec<bool> = promotions.iter().map(|p| p.is_active).collect();

        assert_eq!(active, vec![false, true]);
    }
}
