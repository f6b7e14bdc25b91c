//! Fixtures
//!
//! YAML fixture sets: `<base>/catalog/<set>.yml`, `<base>/promotions/<set>.yml`
//! and `<base>/carts/<set>.yml`.

use std::{fs, path::PathBuf};

use rustc_hash::FxHashSet;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    cart::Cart,
    products::{CatalogProduct, InMemoryCatalog, ProductId},
    promotions::{
        Promotion, PromotionDefinitionError, RepositoryError,
        repository::InMemoryPromotionRepository,
    },
    store::{InMemoryCartStore, OwnerKey},
};

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Product listed twice
    #[error("Duplicate product: {0}")]
    DuplicateProduct(ProductId),

    /// Promotion code listed twice
    #[error("Duplicate promotion code: {0}")]
    DuplicatePromotion(String),

    /// Promotion fails validation
    #[error("Invalid promotion {code}: {source}")]
    InvalidPromotion {
        /// Offending promotion code
        code: String,
        /// Validation failure
        #[source]
        source: PromotionDefinitionError,
    },

    /// Cart owner not in the fixture
    #[error("Cart not found: {0}")]
    CartNotFound(String),

    /// Repository rejected a promotion
    #[error("Failed to load promotions: {0}")]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Deserialize)]
struct CatalogFixture {
    products: Vec<CatalogProduct>,
}

#[derive(Debug, Deserialize)]
struct PromotionsFixture {
    promotions: Vec<Promotion>,
}

#[derive(Debug, Deserialize)]
struct CartsFixture {
    carts: Vec<CartFixture>,
}

#[derive(Debug, Deserialize)]
struct CartFixture {
    owner: OwnerKey,

    #[serde(flatten)]
    cart: Cart,
}

/// Fixture
#[derive(Debug)]
pub struct Fixture {
    /// Base path for fixture files
    base_path: PathBuf,

    products: Vec<CatalogProduct>,
    promotions: Vec<Promotion>,
    carts: Vec<(OwnerKey, Cart)>,
}

impl Fixture {
    /// Create a new empty fixture with default base path
    pub fn new() -> Self {
        Self::with_base_path("./fixtures")
    }

    /// Create a new empty fixture with custom base path
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            products: Vec::new(),
            promotions: Vec::new(),
            carts: Vec::new(),
        }
    }

    /// Load catalog products from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or lists a
    /// product twice.
    pub fn load_catalog(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let fixture: CatalogFixture = self.read("catalog", name)?;

        let mut seen: FxHashSet<ProductId> =
            self.products.iter().map(|p| p.product_id).collect();

        for product in fixture.products {
            if !seen.insert(product.product_id) {
                return Err(FixtureError::DuplicateProduct(product.product_id));
            }

            self.products.push(product);
        }

        Ok(self)
    }

    /// Load promotions from a YAML fixture file, validating each one
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, a promotion is
    /// invalid, or a code is repeated.
    pub fn load_promotions(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let fixture: PromotionsFixture = self.read("promotions", name)?;

        for promotion in fixture.promotions {
            promotion
                .validate()
                .map_err(|source| FixtureError::InvalidPromotion {
                    code: promotion.code.clone(),
                    source,
                })?;

            if self.promotions.iter().any(|p| p.code == promotion.code) {
                return Err(FixtureError::DuplicatePromotion(promotion.code));
            }

            self.promotions.push(promotion);
        }

        Ok(self)
    }

    /// Load stored carts from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_carts(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let fixture: CartsFixture = self.read("carts", name)?;

        self.carts.extend(
            fixture
                .carts
                .into_iter()
                .map(|entry| (entry.owner, entry.cart)),
        );

        Ok(self)
    }

    /// Load a complete fixture set (catalog, promotions and carts with the same name)
    ///
    /// # Errors
    ///
    /// Returns an error if any of the fixture files cannot be loaded.
    pub fn from_set(name: &str) -> Result<Self, FixtureError> {
        Self::new().into_set(name)
    }

    /// Load a complete fixture set from this fixture's base path
    ///
    /// # Errors
    ///
    /// Returns an error if any of the fixture files cannot be loaded.
    pub fn into_set(mut self, name: &str) -> Result<Self, FixtureError> {
        self.load_catalog(name)?
            .load_promotions(name)?
            .load_carts(name)?;

        Ok(self)
    }

    /// Loaded products
    pub fn products(&self) -> &[CatalogProduct] {
        &self.products
    }

    /// Loaded promotions
    pub fn promotions(&self) -> &[Promotion] {
        &self.promotions
    }

    /// Get a stored cart by owner
    ///
    /// # Errors
    ///
    /// Returns an error if the owner has no cart in the fixture.
    pub fn cart(&self, owner: &str) -> Result<&Cart, FixtureError> {
        self.carts
            .iter()
            .find(|(key, _)| key.as_str() == owner)
            .map(|(_, cart)| cart)
            .ok_or_else(|| FixtureError::CartNotFound(owner.to_string()))
    }

    /// Build an in-memory catalog from the loaded products
    pub fn catalog(&self) -> InMemoryCatalog {
        self.products.iter().cloned().collect()
    }

    /// Build an in-memory promotion repository from the loaded promotions
    ///
    /// # Errors
    ///
    /// Returns an error if the repository rejects a promotion.
    pub fn promotion_repository(&self) -> Result<InMemoryPromotionRepository, FixtureError> {
        let repository = InMemoryPromotionRepository::new();

        for promotion in &self.promotions {
            repository.insert(promotion.clone())?;
        }

        Ok(repository)
    }

    /// Build an in-memory cart store from the loaded carts
    pub fn cart_store(&self) -> InMemoryCartStore {
        self.carts.iter().cloned().collect()
    }

    fn read<T>(&self, category: &str, name: &str) -> Result<T, FixtureError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let file_path = self.base_path.join(category).join(format!("{name}.yml"));
        let contents = fs::read_to_string(&file_path)?;

        Ok(serde_norway::from_str(&contents)?)
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use rust_decimal_macros::dec;
    use testresult::TestResult;

    use crate::products::Catalog;

    use super::*;

    fn write_fixture(base: &Path, category: &str, name: &str, contents: &str) -> TestResult {
        let dir = base.join(category);

        fs::create_dir_all(&dir)?;
        fs::write(dir.join(format!("{name}.yml")), contents)?;

        Ok(())
    }

    #[test]
    fn fixture_from_set_loads_all_fixtures() -> TestResult {
        let fixture = Fixture::from_set("default")?;

        assert_eq!(fixture.products().len(), 5);
        assert_eq!(fixture.promotions().len(), 5);

        let alice = fixture.cart("alice")?;

        assert_eq!(alice.lines().len(), 3);
        assert_eq!(
            alice.applied_promotion().map(|p| p.code.as_str()),
            Some("TENOFF")
        );

        Ok(())
    }

    #[test]
    fn fixture_builds_collaborators() -> TestResult {
        let fixture = Fixture::from_set("default")?;

        let catalog = fixture.catalog();
        let beans = catalog.products_by_ids(&[ProductId::new(1)])?;

        assert_eq!(beans.first().map(|p| p.price), Some(dec!(12.50)));
        assert_eq!(fixture.promotion_repository()?.list(jiff::civil::date(2026, 1, 1))?.len(), 5);
        assert_eq!(fixture.cart_store().owners()?.len(), 3);

        Ok(())
    }

    #[test]
    fn fixture_cart_not_found_returns_error() {
        let fixture = Fixture::new();

        assert!(matches!(
            fixture.cart("nobody"),
            Err(FixtureError::CartNotFound(_))
        ));
    }

    #[test]
    fn fixture_rejects_invalid_promotion() -> TestResult {
        let base_path = tempfile::tempdir()?;

        write_fixture(
            base_path.path(),
            "promotions",
            "broken",
            "promotions:\n  - id: 1\n    code: HALF\n    name: Half\n    type: percentage\n    value: \"150\"\n    startDate: \"2026-01-01\"\n    endDate: \"2026-12-31\"\n",
        )?;

        let mut fixture = Fixture::with_base_path(base_path.path());
        let result = fixture.load_promotions("broken");

        assert!(matches!(
            result,
            Err(FixtureError::InvalidPromotion { ref code, .. }) if code == "HALF"
        ));

        Ok(())
    }

    #[test]
    fn fixture_rejects_duplicate_products() -> TestResult {
        let base_path = tempfile::tempdir()?;

        write_fixture(
            base_path.path(),
            "catalog",
            "twice",
            "products:\n  - productId: 1\n    name: A\n    price: \"1.00\"\n    stock: 1\n  - productId: 1\n    name: B\n    price: \"2.00\"\n    stock: 1\n",
        )?;

        let mut fixture = Fixture::with_base_path(base_path.path());

        assert!(matches!(
            fixture.load_catalog("twice"),
            Err(FixtureError::DuplicateProduct(_))
        ));

        Ok(())
    }

    #[test]
    fn fixture_rejects_malformed_cart_lines() -> TestResult {
        let base_path = tempfile::tempdir()?;

        let line = |quantity: u32| {
            format!("      - productId: 1\n        name: A\n        unitPrice: \"1.00\"\n        quantity: {quantity}\n")
        };

        write_fixture(
            base_path.path(),
            "carts",
            "repeated",
            &format!("carts:\n  - owner: alice\n    lines:\n{}{}", line(3), line(4)),
        )?;
        write_fixture(
            base_path.path(),
            "carts",
            "empty-line",
            &format!("carts:\n  - owner: alice\n    lines:\n{}", line(0)),
        )?;

        let mut fixture = Fixture::with_base_path(base_path.path());

        assert!(matches!(
            fixture.load_carts("repeated"),
            Err(FixtureError::Yaml(err)) if err.to_string().contains("more than one line")
        ));
        assert!(matches!(
            fixture.load_carts("empty-line"),
            Err(FixtureError::Yaml(err)) if err.to_string().contains("must be at least 1")
        ));

        Ok(())
    }

    #[test]
    fn fixture_missing_file_is_io_error() {
        let mut fixture = Fixture::with_base_path("./does-not-exist");

        assert!(matches!(
            fixture.load_carts("default"),
            Err(FixtureError::Io(_))
        ));
    }
}
