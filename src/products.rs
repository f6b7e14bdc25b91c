//! Products

use std::sync::RwLock;

use mockall::automock;
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{ids::TypedId, money::is_valid_unit_price};

/// Product Id
pub type ProductId = TypedId<CatalogProduct>;

/// Category marker
#[derive(Debug)]
pub struct Category;

/// Category Id
pub type CategoryId = TypedId<Category>;

/// Supplier marker
#[derive(Debug)]
pub struct Supplier;

/// Supplier Id
pub type SupplierId = TypedId<Supplier>;

/// Catalog lookup errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog could not be reached; retryable.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    /// The catalog returned a negative or out-of-range price.
    #[error("product {product} has invalid price {price}")]
    InvalidPrice {
        /// Offending product
        product: ProductId,
        /// Price as returned
        price: Decimal,
    },
}

impl CatalogError {
    /// Message key for the caller to report.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "CatalogUnavailable",
            Self::InvalidPrice { .. } => "InvalidCatalogPrice",
        }
    }
}

/// Live catalog data for a single product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogProduct {
    /// Product identifier
    pub product_id: ProductId,

    /// Display name
    pub name: String,

    /// Current unit price
    pub price: Decimal,

    /// Units available
    pub stock: u32,

    /// Image path, if any
    #[serde(default)]
    pub image: Option<String>,

    /// Category, if any
    #[serde(default)]
    pub category_id: Option<CategoryId>,

    /// Supplier, if any
    #[serde(default)]
    pub supplier_id: Option<SupplierId>,

    /// Whether the product can be sold
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

const fn active_by_default() -> bool {
    true
}

/// A read-only view of the catalog taken once per operation.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    products: FxHashMap<ProductId, CatalogProduct>,
}

impl CatalogSnapshot {
    /// Look up a product in the snapshot.
    pub fn get(&self, product: ProductId) -> Option<&CatalogProduct> {
        self.products.get(&product)
    }

    /// Number of products captured.
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Whether the snapshot holds no products.
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl FromIterator<CatalogProduct> for CatalogSnapshot {
    fn from_iter<I: IntoIterator<Item = CatalogProduct>>(iter: I) -> Self {
        Self {
            products: iter
                .into_iter()
                .map(|product| (product.product_id, product))
                .collect(),
        }
    }
}

/// Read-only product lookup.
#[automock]
pub trait Catalog: Send + Sync {
    /// Fetch the current state of each requested product. Unknown ids are
    /// simply absent from the result.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Unavailable`] if the catalog can't be read.
    fn products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<CatalogProduct>, CatalogError>;
}

/// Take a snapshot of the given products.
///
/// # Errors
///
/// - [`CatalogError::InvalidPrice`]: a product's price is negative or above
///   [`crate::money::MAX_UNIT_PRICE`].
/// - Any [`CatalogError`] from the catalog itself.
pub fn snapshot(catalog: &dyn Catalog, ids: &[ProductId]) -> Result<CatalogSnapshot, CatalogError> {
    let products = catalog.products_by_ids(ids)?;

    if let Some(product) = products.iter().find(|p| !is_valid_unit_price(p.price)) {
        return Err(CatalogError::InvalidPrice {
            product: product.product_id,
            price: product.price,
        });
    }

    let snapshot: CatalogSnapshot = products.into_iter().collect();

    debug!(
        requested = ids.len(),
        found = snapshot.len(),
        "took catalog snapshot"
    );

    Ok(snapshot)
}

/// Catalog backed by an in-process map.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: RwLock<FxHashMap<ProductId, CatalogProduct>>,
}

impl InMemoryCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a product.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Unavailable`] if the lock was poisoned.
    pub fn upsert(&self, product: CatalogProduct) -> Result<(), CatalogError> {
        let mut products = self
            .products
            .write()
            .map_err(|err| CatalogError::Unavailable(err.to_string()))?;

        products.insert(product.product_id, product);

        Ok(())
    }

    /// Remove a product entirely.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Unavailable`] if the lock was poisoned.
    pub fn remove(&self, product: ProductId) -> Result<Option<CatalogProduct>, CatalogError> {
        let mut products = self
            .products
            .write()
            .map_err(|err| CatalogError::Unavailable(err.to_string()))?;

        Ok(products.remove(&product))
    }
}

impl FromIterator<CatalogProduct> for InMemoryCatalog {
    fn from_iter<I: IntoIterator<Item = CatalogProduct>>(iter: I) -> Self {
        Self {
            products: RwLock::new(
                iter.into_iter()
                    .map(|product| (product.product_id, product))
                    .collect(),
            ),
        }
    }
}

impl Catalog for InMemoryCatalog {
    fn products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<CatalogProduct>, CatalogError> {
        let products = self
            .products
            .read()
            .map_err(|err| CatalogError::Unavailable(err.to_string()))?;

        Ok(ids
            .iter()
            .filter_map(|id| products.get(id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use testresult::TestResult;

    use super::*;

    fn product(id: u64, stock: u32) -> CatalogProduct {
        CatalogProduct {
            product_id: ProductId::new(id),
            name: format!("Product {id}"),
            price: dec!(9.99),
            stock,
            image: None,
            category_id: Some(CategoryId::new(1)),
            supplier_id: None,
            is_active: true,
        }
    }

    #[test]
    fn lookup_skips_unknown_ids() -> TestResult {
        let catalog: InMemoryCatalog = [product(1, 5), product(2, 0)].into_iter().collect();

        let found = catalog.products_by_ids(&[ProductId::new(2), ProductId::new(99)])?;

        assert_eq!(found.len(), 1);
        assert_eq!(found.first().map(|p| p.product_id), Some(ProductId::new(2)));

        Ok(())
    }

    #[test]
    fn snapshot_indexes_by_product_id() -> TestResult {
        let catalog: InMemoryCatalog = [product(1, 5), product(2, 3)].into_iter().collect();

        let snap = snapshot(&catalog, &[ProductId::new(1), ProductId::new(2)])?;

        assert_eq!(snap.len(), 2);
        assert_eq!(snap.get(ProductId::new(2)).map(|p| p.stock), Some(3));
        assert!(snap.get(ProductId::new(3)).is_none());

        Ok(())
    }

    #[test]
    fn snapshot_rejects_out_of_range_prices() {
        let mut huge = product(1, 2);
        huge.price = Decimal::MAX;

        let mut negative = product(2, 2);
        negative.price = dec!(-1);

        for bad in [huge, negative] {
            let id = bad.product_id;
            let catalog: InMemoryCatalog = [bad].into_iter().collect();

            let result = snapshot(&catalog, &[id]);

            assert!(
                matches!(&result, Err(CatalogError::InvalidPrice { product, .. }) if *product == id),
                "expected InvalidPrice for {id}, got {result:?}"
            );
        }
    }

    #[test]
    fn upsert_and_remove_change_lookups() -> TestResult {
        let catalog = InMemoryCatalog::new();

        catalog.upsert(product(4, 1))?;
        assert_eq!(catalog.products_by_ids(&[ProductId::new(4)])?.len(), 1);

        assert!(catalog.remove(ProductId::new(4))?.is_some());
        assert!(catalog.products_by_ids(&[ProductId::new(4)])?.is_empty());

        Ok(())
    }

    #[test]
    fn deserializes_camel_case_with_defaults() -> TestResult {
        let json = r#"{"productId":7,"name":"Mug","price":"12.50","stock":3}"#;

        let parsed: CatalogProduct = serde_json::from_str(json)?;

        assert_eq!(parsed.product_id, ProductId::new(7));
        assert_eq!(parsed.price, dec!(12.50));
        assert!(parsed.is_active);
        assert!(parsed.category_id.is_none());

        Ok(())
    }
}
