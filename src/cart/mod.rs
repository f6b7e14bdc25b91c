//! Cart

use rust_decimal::Decimal;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    money::is_valid_unit_price,
    products::{CatalogProduct, CatalogSnapshot, CategoryId, ProductId, SupplierId},
    promotions::{Promotion, PromotionId},
};

pub mod apply;
pub mod totals;

/// Errors raised while editing cart lines.
#[derive(Debug, Error, PartialEq)]
pub enum CartError {
    /// The product isn't in the catalog.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// The product exists but can't be sold.
    #[error("product {0} is inactive")]
    ProductInactive(ProductId),

    /// Not enough stock for the requested quantity.
    #[error("product {product} has {available} in stock, {requested} requested")]
    InsufficientStock {
        /// Product requested
        product: ProductId,
        /// Total quantity the cart would hold
        requested: u64,
        /// Units in stock
        available: u32,
    },

    /// Quantity of zero when adding.
    #[error("quantity for product {0} must be at least 1")]
    InvalidQuantity(ProductId),

    /// The product has no line in this cart.
    #[error("product {0} is not in the cart")]
    LineNotFound(ProductId),

    /// A stored cart holds more than one line for the product.
    #[error("product {0} appears on more than one line")]
    DuplicateLine(ProductId),

    /// A stored line's unit price is negative or out of range.
    #[error("product {0} has an invalid unit price")]
    InvalidPrice(ProductId),
}

impl CartError {
    /// Message key for the caller to report.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ProductNotFound(_) => "ProductNotFound",
            Self::ProductInactive(_) => "ProductInactive",
            Self::InsufficientStock { .. } => "InsufficientStock",
            Self::InvalidQuantity(_) => "InvalidQuantity",
            Self::LineNotFound(_) => "LineNotFound",
            Self::DuplicateLine(_) => "DuplicateLine",
            Self::InvalidPrice(_) => "InvalidPrice",
        }
    }
}

/// One product's presence in a cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Product key
    pub product_id: ProductId,

    /// Product name when last refreshed
    pub name: String,

    /// Product image when last refreshed
    #[serde(default)]
    pub image: Option<String>,

    /// Product category when last refreshed
    #[serde(default)]
    pub category_id: Option<CategoryId>,

    /// Product supplier when last refreshed
    #[serde(default)]
    pub supplier_id: Option<SupplierId>,

    /// Unit price when last refreshed
    pub unit_price: Decimal,

    /// Units in the cart, never zero
    pub quantity: u32,

    /// Catalog stock when last refreshed
    #[serde(default)]
    pub stock_at_snapshot: u32,
}

impl CartLine {
    /// Build a line from live catalog data.
    pub fn from_product(product: &CatalogProduct, quantity: u32) -> Self {
        Self {
            product_id: product.product_id,
            name: product.name.clone(),
            image: product.image.clone(),
            category_id: product.category_id,
            supplier_id: product.supplier_id,
            unit_price: product.price,
            quantity,
            stock_at_snapshot: product.stock,
        }
    }

    /// `unit_price * quantity`
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// A promotion as recorded on a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedPromotion {
    /// Promotion identifier
    pub id: PromotionId,

    /// Code used to apply it
    pub code: String,

    /// Promotion name at the time it was applied
    pub name: String,
}

impl From<&Promotion> for AppliedPromotion {
    fn from(promotion: &Promotion) -> Self {
        Self {
            id: promotion.id,
            code: promotion.code.clone(),
            name: promotion.name.clone(),
        }
    }
}

/// Cart aggregate: lines, at most one promotion and its discount.
///
/// Deserializing rejects zero quantities, out-of-range unit prices and
/// repeated product ids, so a loaded cart has one line per product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "StoredCart")]
pub struct Cart {
    lines: Vec<CartLine>,
    applied_promotion: Option<AppliedPromotion>,
    discount_amount: Decimal,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cart holding the given lines and no promotion.
    #[must_use]
    pub fn with_lines(lines: impl Into<Vec<CartLine>>) -> Self {
        Self {
            lines: lines.into(),
            ..Self::default()
        }
    }

    /// Lines in insertion order.
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Line for a product, if present.
    pub fn line(&self, product: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.product_id == product)
    }

    /// Product ids of every line.
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.lines.iter().map(|line| line.product_id).collect()
    }

    /// Currently applied promotion.
    pub fn applied_promotion(&self) -> Option<&AppliedPromotion> {
        self.applied_promotion.as_ref()
    }

    /// Discount granted by the applied promotion.
    pub fn discount_amount(&self) -> Decimal {
        self.discount_amount
    }

    /// Whether the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of line subtotals, before any discount.
    pub fn subtotal(&self) -> Decimal {
        self.lines.iter().map(CartLine::subtotal).sum()
    }

    /// Total units across all lines.
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    /// Add units of a product, merging with an existing line.
    ///
    /// Returns the line's resulting quantity. Nothing changes on failure.
    ///
    /// # Errors
    ///
    /// - [`CartError::InvalidQuantity`]: `quantity` is zero.
    /// - [`CartError::ProductNotFound`]: the product isn't in `catalog`.
    /// - [`CartError::ProductInactive`]: the product is inactive.
    /// - [`CartError::InsufficientStock`]: the combined quantity exceeds stock.
    pub fn add_line(
        &mut self,
        product: ProductId,
        quantity: u32,
        catalog: &CatalogSnapshot,
    ) -> Result<u32, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity(product));
        }

        let live = sellable(product, catalog)?;

        let existing = self.lines.iter_mut().find(|line| line.product_id == product);
        let current = existing.as_ref().map_or(0, |line| line.quantity);

        let combined = current
            .checked_add(quantity)
            .filter(|combined| *combined <= live.stock)
            .ok_or(CartError::InsufficientStock {
                product,
                requested: u64::from(current) + u64::from(quantity),
                available: live.stock,
            })?;

        match existing {
            Some(line) => {
                line.quantity = combined;
                line.stock_at_snapshot = live.stock;
            }
            None => self.lines.push(CartLine::from_product(live, combined)),
        }

        self.cap_discount();

        Ok(combined)
    }

    /// Set the quantity of an existing line; zero removes it.
    ///
    /// # Errors
    ///
    /// - [`CartError::LineNotFound`]: the product has no line.
    /// - [`CartError::ProductNotFound`], [`CartError::ProductInactive`],
    ///   [`CartError::InsufficientStock`]: as for [`Cart::add_line`].
    pub fn update_quantity(
        &mut self,
        product: ProductId,
        quantity: u32,
        catalog: &CatalogSnapshot,
    ) -> Result<(), CartError> {
        let index = self
            .lines
            .iter()
            .position(|line| line.product_id == product)
            .ok_or(CartError::LineNotFound(product))?;

        if quantity == 0 {
            self.lines.remove(index);
            self.cap_discount();

            return Ok(());
        }

        let live = sellable(product, catalog)?;

        if quantity > live.stock {
            return Err(CartError::InsufficientStock {
                product,
                requested: u64::from(quantity),
                available: live.stock,
            });
        }

        if let Some(line) = self.lines.get_mut(index) {
            line.quantity = quantity;
            line.stock_at_snapshot = live.stock;
        }

        self.cap_discount();

        Ok(())
    }

    /// Drop a product's line. Returns whether a line was removed.
    pub fn remove_line(&mut self, product: ProductId) -> bool {
        let before = self.lines.len();

        self.lines.retain(|line| line.product_id != product);
        self.cap_discount();

        self.lines.len() != before
    }

    /// Remove every line and the promotion.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.remove_promotion();
    }

    /// Clear the applied promotion and its discount.
    pub fn remove_promotion(&mut self) {
        self.applied_promotion = None;
        self.discount_amount = Decimal::ZERO;
    }

    /// Record a promotion and its discount, clamped to `[0, subtotal]`.
    ///
    /// Returns `true` if the discount had to be reduced to the subtotal.
    pub(crate) fn set_promotion(&mut self, promotion: AppliedPromotion, discount: Decimal) -> bool {
        let subtotal = self.subtotal();
        let discount = discount.max(Decimal::ZERO);

        self.applied_promotion = Some(promotion);
        self.discount_amount = discount.min(subtotal);

        discount > subtotal
    }

    pub(crate) fn replace_lines(&mut self, lines: Vec<CartLine>) {
        self.lines = lines;
        self.cap_discount();
    }

    fn cap_discount(&mut self) {
        if self.lines.is_empty() {
            self.remove_promotion();
        } else {
            self.discount_amount = self.discount_amount.min(self.subtotal());
        }
    }
}

/// Wire shape of [`Cart`] before its lines are checked.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredCart {
    #[serde(default)]
    lines: Vec<CartLine>,

    #[serde(default)]
    applied_promotion: Option<AppliedPromotion>,

    #[serde(default)]
    discount_amount: Decimal,
}

impl TryFrom<StoredCart> for Cart {
    type Error = CartError;

    fn try_from(stored: StoredCart) -> Result<Self, Self::Error> {
        let mut seen = FxHashSet::default();

        for line in &stored.lines {
            if line.quantity == 0 {
                return Err(CartError::InvalidQuantity(line.product_id));
            }

            if !is_valid_unit_price(line.unit_price) {
                return Err(CartError::InvalidPrice(line.product_id));
            }

            if !seen.insert(line.product_id) {
                return Err(CartError::DuplicateLine(line.product_id));
            }
        }

        let mut cart = Self {
            lines: stored.lines,
            applied_promotion: stored.applied_promotion,
            discount_amount: stored.discount_amount.max(Decimal::ZERO),
        };
        cart.cap_discount();

        Ok(cart)
    }
}

fn sellable(product: ProductId, catalog: &CatalogSnapshot) -> Result<&CatalogProduct, CartError> {
    let live = catalog
        .get(product)
        .ok_or(CartError::ProductNotFound(product))?;

    if !live.is_active {
        return Err(CartError::ProductInactive(product));
    }

    Ok(live)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A line in category 1 with plenty of stock.
    pub(crate) fn line(id: u64, unit_price: Decimal, quantity: u32) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            name: format!("Product {id}"),
            image: None,
            category_id: Some(CategoryId::new(1)),
            supplier_id: None,
            unit_price,
            quantity,
            stock_at_snapshot: 100,
        }
    }

    /// Live catalog data for a product in category 1.
    pub(crate) fn product(id: u64, price: Decimal, stock: u32) -> CatalogProduct {
        CatalogProduct {
            product_id: ProductId::new(id),
            name: format!("Product {id}"),
            price,
            stock,
            image: None,
            category_id: Some(CategoryId::new(1)),
            supplier_id: None,
            is_active: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use testresult::TestResult;

    use super::{
        test_support::{line, product},
        *,
    };

    fn catalog() -> CatalogSnapshot {
        let mut inactive = product(3, dec!(5), 10);
        inactive.is_active = false;

        [product(1, dec!(10), 5), product(2, dec!(20), 2), inactive]
            .into_iter()
            .collect()
    }

    #[test]
    fn add_line_creates_line_from_catalog() -> TestResult {
        let mut cart = Cart::new();

        let quantity = cart.add_line(ProductId::new(1), 2, &catalog())?;

        assert_eq!(quantity, 2);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.subtotal(), dec!(20));
        assert_eq!(
            cart.line(ProductId::new(1)).map(|l| l.stock_at_snapshot),
            Some(5)
        );

        Ok(())
    }

    #[test]
    fn add_line_merges_quantities() -> TestResult {
        let mut cart = Cart::new();
        let catalog = catalog();

        cart.add_line(ProductId::new(1), 2, &catalog)?;
        let quantity = cart.add_line(ProductId::new(1), 3, &catalog)?;

        assert_eq!(quantity, 5);
        assert_eq!(cart.lines().len(), 1);

        Ok(())
    }

    #[test]
    fn add_line_rechecks_combined_quantity_without_partial_update() -> TestResult {
        let mut cart = Cart::new();
        let catalog = catalog();

        cart.add_line(ProductId::new(1), 4, &catalog)?;
        let result = cart.add_line(ProductId::new(1), 2, &catalog);

        assert_eq!(
            result,
            Err(CartError::InsufficientStock {
                product: ProductId::new(1),
                requested: 6,
                available: 5,
            })
        );
        assert_eq!(cart.line(ProductId::new(1)).map(|l| l.quantity), Some(4));

        Ok(())
    }

    #[test]
    fn add_line_rejects_unknown_inactive_and_zero() {
        let mut cart = Cart::new();
        let catalog = catalog();

        assert_eq!(
            cart.add_line(ProductId::new(9), 1, &catalog),
            Err(CartError::ProductNotFound(ProductId::new(9)))
        );
        assert_eq!(
            cart.add_line(ProductId::new(3), 1, &catalog),
            Err(CartError::ProductInactive(ProductId::new(3)))
        );
        assert_eq!(
            cart.add_line(ProductId::new(1), 0, &catalog),
            Err(CartError::InvalidQuantity(ProductId::new(1)))
        );
        assert!(cart.is_empty());
    }

    #[test]
    fn update_quantity_to_zero_removes_line() -> TestResult {
        let mut cart = Cart::with_lines(vec![line(1, dec!(10), 2), line(2, dec!(20), 1)]);

        cart.update_quantity(ProductId::new(1), 0, &catalog())?;

        assert!(cart.line(ProductId::new(1)).is_none());
        assert_eq!(cart.lines().len(), 1);

        Ok(())
    }

    #[test]
    fn update_quantity_checks_stock_and_presence() {
        let mut cart = Cart::with_lines(vec![line(2, dec!(20), 1)]);
        let catalog = catalog();

        assert!(matches!(
            cart.update_quantity(ProductId::new(2), 3, &catalog),
            Err(CartError::InsufficientStock { available: 2, .. })
        ));
        assert_eq!(
            cart.update_quantity(ProductId::new(1), 1, &catalog),
            Err(CartError::LineNotFound(ProductId::new(1)))
        );
    }

    #[test]
    fn set_promotion_caps_at_subtotal() {
        let mut cart = Cart::with_lines(vec![line(7, dec!(50), 4)]);
        let applied = AppliedPromotion {
            id: PromotionId::new(1),
            code: "BIG".to_string(),
            name: "Big".to_string(),
        };

        let capped = cart.set_promotion(applied, dec!(500));

        assert!(capped);
        assert_eq!(cart.discount_amount(), dec!(200));
    }

    #[test]
    fn removing_lines_keeps_discount_within_subtotal() {
        let mut cart = Cart::with_lines(vec![line(1, dec!(10), 1), line(2, dec!(20), 1)]);
        let applied = AppliedPromotion {
            id: PromotionId::new(1),
            code: "TWENTY".to_string(),
            name: "Twenty".to_string(),
        };

        cart.set_promotion(applied, dec!(20));
        assert!(cart.remove_line(ProductId::new(2)));

        assert_eq!(cart.discount_amount(), dec!(10));

        cart.clear();

        assert!(cart.applied_promotion().is_none());
        assert_eq!(cart.discount_amount(), Decimal::ZERO);
    }

    fn stored_line(id: u64, unit_price: &str, quantity: u32) -> String {
        format!(
            r#"{{"productId":{id},"name":"Product {id}","unitPrice":"{unit_price}","quantity":{quantity}}}"#
        )
    }

    #[test]
    fn deserialize_accepts_well_formed_cart() -> TestResult {
        let json = format!(
            r#"{{"lines":[{},{}],"discountAmount":"5"}}"#,
            stored_line(1, "10", 2),
            stored_line(2, "20", 1)
        );

        let cart: Cart = serde_json::from_str(&json)?;

        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.subtotal(), dec!(40));
        assert_eq!(cart.discount_amount(), dec!(5));

        Ok(())
    }

    #[test]
    fn deserialize_rejects_zero_quantity_line() {
        let json = format!(r#"{{"lines":[{}]}}"#, stored_line(1, "10", 0));

        let result = serde_json::from_str::<Cart>(&json);

        assert!(
            result.is_err_and(|err| err.to_string().contains("must be at least 1")),
            "zero-quantity line should not load"
        );
    }

    #[test]
    fn deserialize_rejects_repeated_product() {
        let json = format!(
            r#"{{"lines":[{},{}]}}"#,
            stored_line(1, "10", 3),
            stored_line(1, "10", 4)
        );

        let result = serde_json::from_str::<Cart>(&json);

        assert!(
            result.is_err_and(|err| err.to_string().contains("more than one line")),
            "repeated product should not load"
        );
    }

    #[test]
    fn deserialize_rejects_out_of_range_price() {
        for price in ["79228162514264337593543950335", "-1"] {
            let json = format!(r#"{{"lines":[{}]}}"#, stored_line(1, price, 1));

            let result = serde_json::from_str::<Cart>(&json);

            assert!(
                result.is_err_and(|err| err.to_string().contains("invalid unit price")),
                "price {price} should not load"
            );
        }
    }

    #[test]
    fn remove_promotion_always_succeeds() {
        let mut cart = Cart::new();

        cart.remove_promotion();

        assert!(cart.applied_promotion().is_none());
    }
}
