//! Cart Storage

use std::{
    fmt,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use mockall::automock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cart::Cart;

/// Cart persistence errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage could not be reached; retryable.
    #[error("cart store unavailable: {0}")]
    Unavailable(String),
}

/// Opaque key a cart is stored under (session id, user id, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerKey(String);

impl OwnerKey {
    /// Wrap a key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Cart persistence. Writes are last-write-wins per owner.
#[automock]
pub trait CartStore: Send + Sync {
    /// Load the owner's cart; an owner with no cart gets an empty one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if storage can't be read.
    fn load_cart(&self, owner: &OwnerKey) -> Result<Cart, StoreError>;

    /// Replace the owner's cart.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if storage can't be written.
    fn save_cart(&self, owner: &OwnerKey, cart: &Cart) -> Result<(), StoreError>;
}

/// Cart store backed by an in-process map.
#[derive(Debug, Default)]
pub struct InMemoryCartStore {
    carts: RwLock<FxHashMap<OwnerKey, Cart>>,
}

impl InMemoryCartStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Owner keys with a stored cart, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the lock was poisoned.
    pub fn owners(&self) -> Result<Vec<OwnerKey>, StoreError> {
        let mut owners: Vec<OwnerKey> = self.read()?.keys().cloned().collect();
        owners.sort();

        Ok(owners)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, FxHashMap<OwnerKey, Cart>>, StoreError> {
        self.carts
            .read()
            .map_err(|err| StoreError::Unavailable(err.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, FxHashMap<OwnerKey, Cart>>, StoreError> {
        self.carts
            .write()
            .map_err(|err| StoreError::Unavailable(err.to_string()))
    }
}

impl FromIterator<(OwnerKey, Cart)> for InMemoryCartStore {
    fn from_iter<I: IntoIterator<Item = (OwnerKey, Cart)>>(iter: I) -> Self {
        Self {
            carts: RwLock::new(iter.into_iter().collect()),
        }
    }
}

impl CartStore for InMemoryCartStore {
    fn load_cart(&self, owner: &OwnerKey) -> Result<Cart, StoreError> {
        Ok(self.read()?.get(owner).cloned().unwrap_or_default())
    }

    fn save_cart(&self, owner: &OwnerKey, cart: &Cart) -> Result<(), StoreError> {
        self.write()?.insert(owner.clone(), cart.clone());

        Ok(())
    }
}
