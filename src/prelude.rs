//! Shopfront prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    cart::{
        AppliedPromotion, Cart, CartError, CartLine,
        apply::{PromotionApplication, apply_promotion, apply_resolved, evaluate},
        totals::{CartTotals, VatRate, recompute_totals},
    },
    config::{ConfigError, PricingSettings, StorefrontConfig},
    discounts::{DiscountBreakdown, LineDiscount, check_eligibility, compute_discount},
    fixtures::{Fixture, FixtureError},
    products::{
        Catalog, CatalogError, CatalogProduct, CatalogSnapshot, CategoryId, InMemoryCatalog,
        ProductId, SupplierId,
    },
    promotions::{
        Promotion, PromotionDefinitionError, PromotionError, PromotionId, PromotionType,
        PromotionValue, RepositoryError,
        applicability::is_applicable,
        repository::{InMemoryPromotionRepository, PromotionRepository},
    },
    reconciliation::{
        ChangeValue, ChangedField, Reconciliation, ReconciliationChange, RemovalReason,
        RemovedItem, reconcile,
    },
    service::{ApplyReport, CartReport, CartService, PromotionRemoval, ServiceError},
    store::{CartStore, InMemoryCartStore, OwnerKey, StoreError},
};
