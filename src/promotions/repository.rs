//! Promotion Repository

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use jiff::civil::Date;
use mockall::automock;
use rustc_hash::FxHashMap;
use tracing::info;

use crate::promotions::{Promotion, RepositoryError, validity};

/// Promotion lookup and lifecycle.
#[automock]
pub trait PromotionRepository: Send + Sync {
    /// Find a promotion by its exact, case-sensitive code.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Unavailable`] if storage can't be read.
    fn promotion_by_code(&self, code: &str) -> Result<Option<Promotion>, RepositoryError>;

    /// Deactivate promotions whose end date is before `today`, returning how
    /// many changed.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Unavailable`] if storage can't be written.
    fn deactivate_expired(&self, today: Date) -> Result<usize, RepositoryError>;
}

/// Promotion repository backed by an in-process map keyed by code.
#[derive(Debug, Default)]
pub struct InMemoryPromotionRepository {
    promotions: RwLock<FxHashMap<String, Promotion>>,
}

impl InMemoryPromotionRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new promotion.
    ///
    /// # Errors
    ///
    /// - [`RepositoryError::InvalidDefinition`]: the promotion fails validation.
    /// - [`RepositoryError::DuplicateCode`]: the code is taken.
    /// - [`RepositoryError::Unavailable`]: the lock was poisoned.
    pub fn insert(&self, promotion: Promotion) -> Result<(), RepositoryError> {
        promotion.validate()?;

        let mut promotions = self.write()?;

        if promotions.contains_key(&promotion.code) {
            return Err(RepositoryError::DuplicateCode(promotion.code));
        }

        promotions.insert(promotion.code.clone(), promotion);

        Ok(())
    }

    /// Replace the promotion with the same code, or add it.
    ///
    /// # Errors
    ///
    /// - [`RepositoryError::InvalidDefinition`]: the promotion fails validation.
    /// - [`RepositoryError::Unavailable`]: the lock was poisoned.
    pub fn save(&self, promotion: Promotion) -> Result<(), RepositoryError> {
        promotion.validate()?;

        self.write()?.insert(promotion.code.clone(), promotion);

        Ok(())
    }

    /// Delete a promotion. Returns whether one was removed.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Unavailable`] if the lock was poisoned.
    pub fn delete(&self, code: &str) -> Result<bool, RepositoryError> {
        Ok(self.write()?.remove(code).is_some())
    }

    /// All promotions ordered by id, after running the expiry sweep.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Unavailable`] if the lock was poisoned.
    pub fn list(&self, today: Date) -> Result<Vec<Promotion>, RepositoryError> {
        self.deactivate_expired(today)?;

        let mut promotions: Vec<Promotion> = self.read()?.values().cloned().collect();
        promotions.sort_by_key(|promotion| promotion.id);

        Ok(promotions)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, FxHashMap<String, Promotion>>, RepositoryError> {
        self.promotions
            .read()
            .map_err(|err| RepositoryError::Unavailable(err.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, FxHashMap<String, Promotion>>, RepositoryError> {
        self.promotions
            .write()
            .map_err(|err| RepositoryError::Unavailable(err.to_string()))
    }
}

impl PromotionRepository for InMemoryPromotionRepository {
    fn promotion_by_code(&self, code: &str) -> Result<Option<Promotion>, RepositoryError> {
        Ok(self.read()?.get(code).cloned())
    }

    fn deactivate_expired(&self, today: Date) -> Result<usize, RepositoryError> {
        let mut promotions = self.write()?;

        let count = validity::deactivate_expired(promotions.values_mut(), today);

        if count > 0 {
            info!(count, %today, "deactivated expired promotions");
        }

        Ok(count)
    }
}
