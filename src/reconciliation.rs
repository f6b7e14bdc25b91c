//! Cart Reconciliation
//!
//! Brings stored cart lines in line with a catalog snapshot. Repeated lines
//! for one product are merged first, so stock is checked against the combined
//! quantity. Lines with a zero quantity, or whose product is gone, inactive or
//! out of stock, are dropped and reported; every other line takes the live
//! price, name, image, category, supplier and stock, with each drifted field
//! reported. Running it again against the same snapshot reports nothing.

use std::fmt;

use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::{
    cart::CartLine,
    products::{CatalogProduct, CatalogSnapshot, ProductId},
};

/// Reason attached to quantity clamps.
pub const QUANTITY_REDUCED: &str = "Quantity reduced to available stock";

/// Cart line attribute that can drift from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangedField {
    /// Unit price
    Price,
    /// Product name
    Name,
    /// Product image
    Image,
    /// Product category
    CategoryId,
    /// Product supplier
    SupplierId,
    /// Line quantity
    Quantity,
}

/// Before or after value of a changed field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChangeValue {
    /// A price
    Amount(Decimal),
    /// A name or image path
    Text(String),
    /// A category or supplier id
    Id(u64),
    /// A quantity
    Count(u32),
    /// No value
    Missing,
}

impl From<&Option<String>> for ChangeValue {
    fn from(value: &Option<String>) -> Self {
        value.clone().map_or(Self::Missing, Self::Text)
    }
}

/// One drifted attribute on a surviving line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationChange {
    /// Line's product
    pub product_id: ProductId,

    /// Attribute that changed
    pub field: ChangedField,

    /// Value held by the cart
    pub old_value: ChangeValue,

    /// Value now in the cart
    pub new_value: ChangeValue,

    /// Why the value changed, when it isn't plain catalog drift
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

/// Why a line was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RemovalReason {
    /// Product no longer in the catalog.
    #[serde(rename = "Product deleted")]
    ProductDeleted,

    /// Product can't be sold.
    #[serde(rename = "Product inactive")]
    ProductInactive,

    /// Product has no stock left.
    #[serde(rename = "Out of stock")]
    OutOfStock,

    /// Stored line held zero units.
    #[serde(rename = "Invalid quantity")]
    InvalidQuantity,
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ProductDeleted => "Product deleted",
            Self::ProductInactive => "Product inactive",
            Self::OutOfStock => "Out of stock",
            Self::InvalidQuantity => "Invalid quantity",
        })
    }
}

/// A dropped line and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedItem {
    /// The line as it was stored
    #[serde(flatten)]
    pub line: CartLine,

    /// Removal reason
    pub reason: RemovalReason,
}

/// Outcome of reconciling a cart.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    /// Surviving lines, refreshed, in stored order
    pub validated_lines: Vec<CartLine>,

    /// Field-level drift on surviving lines
    pub changes: Vec<ReconciliationChange>,

    /// Dropped lines
    pub removed_items: Vec<RemovedItem>,
}

impl Reconciliation {
    /// Whether nothing was changed or removed.
    pub fn is_clean(&self) -> bool {
        self.changes.is_empty() && self.removed_items.is_empty()
    }
}

/// Reconcile stored lines against a catalog snapshot.
pub fn reconcile(stored: &[CartLine], catalog: &CatalogSnapshot) -> Reconciliation {
    let mut outcome = Reconciliation::default();

    for line in merge_duplicates(stored) {
        match survivor(&line, catalog.get(line.product_id)) {
            Ok(live) => {
                let refreshed = refresh(&line, live, &mut outcome.changes);
                outcome.validated_lines.push(refreshed);
            }
            Err(reason) => outcome.removed_items.push(RemovedItem { line, reason }),
        }
    }

    outcome
}

/// One line per product, at the position of its first occurrence, with
/// quantities summed.
fn merge_duplicates(stored: &[CartLine]) -> Vec<CartLine> {
    let mut merged: Vec<CartLine> = Vec::with_capacity(stored.len());
    let mut positions: FxHashMap<ProductId, usize> = FxHashMap::default();

    for line in stored {
        match positions.get(&line.product_id).and_then(|&at| merged.get_mut(at)) {
            Some(first) => first.quantity = first.quantity.saturating_add(line.quantity),
            None => {
                positions.insert(line.product_id, merged.len());
                merged.push(line.clone());
            }
        }
    }

    merged
}

fn survivor<'a>(
    line: &CartLine,
    live: Option<&'a CatalogProduct>,
) -> Result<&'a CatalogProduct, RemovalReason> {
    if line.quantity == 0 {
        return Err(RemovalReason::InvalidQuantity);
    }

    let live = live.ok_or(RemovalReason::ProductDeleted)?;

    if !live.is_active {
        return Err(RemovalReason::ProductInactive);
    }

    if live.stock == 0 {
        return Err(RemovalReason::OutOfStock);
    }

    Ok(live)
}

fn refresh(
    stored: &CartLine,
    live: &CatalogProduct,
    changes: &mut Vec<ReconciliationChange>,
) -> CartLine {
    let mut line = stored.clone();
    let product_id = line.product_id;

    let mut record = |field, old_value, new_value, reason| {
        changes.push(ReconciliationChange {
            product_id,
            field,
            old_value,
            new_value,
            reason,
        });
    };

    if line.unit_price != live.price {
        record(
            ChangedField::Price,
            ChangeValue::Amount(line.unit_price),
            ChangeValue::Amount(live.price),
            None,
        );
        line.unit_price = live.price;
    }

    if line.name != live.name {
        record(
            ChangedField::Name,
            ChangeValue::Text(line.name.clone()),
            ChangeValue::Text(live.name.clone()),
            None,
        );
        line.name.clone_from(&live.name);
    }

    if line.image != live.image {
        record(
            ChangedField::Image,
            ChangeValue::from(&line.image),
            ChangeValue::from(&live.image),
            None,
        );
        line.image.clone_from(&live.image);
    }

    if line.category_id != live.category_id {
        record(
            ChangedField::CategoryId,
            line.category_id
                .map_or(ChangeValue::Missing, |id| ChangeValue::Id(id.get())),
            live.category_id
                .map_or(ChangeValue::Missing, |id| ChangeValue::Id(id.get())),
            None,
        );
        line.category_id = live.category_id;
    }

    if line.supplier_id != live.supplier_id {
        record(
            ChangedField::SupplierId,
            line.supplier_id
                .map_or(ChangeValue::Missing, |id| ChangeValue::Id(id.get())),
            live.supplier_id
                .map_or(ChangeValue::Missing, |id| ChangeValue::Id(id.get())),
            None,
        );
        line.supplier_id = live.supplier_id;
    }

    if line.quantity > live.stock {
        record(
            ChangedField::Quantity,
            ChangeValue::Count(line.quantity),
            ChangeValue::Count(live.stock),
            Some(QUANTITY_REDUCED),
        );
        line.quantity = live.stock;
    }

    line.stock_at_snapshot = live.stock;

    line
}
