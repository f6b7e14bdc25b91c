//! Cart Service
//!
//! Request-level cart operations. Each call takes one catalog snapshot,
//! reconciles the stored cart against it, applies the edit, re-evaluates any
//! applied promotion and saves the cart. A failed call saves nothing.

use std::sync::Arc;

use jiff::civil::Date;
use serde::Serialize;
use thiserror::Error;
use tracing::{Span, debug, info, warn};

use crate::{
    cart::{
        AppliedPromotion, Cart, CartError,
        apply::{self, PromotionApplication, apply_resolved},
        totals::{CartTotals, recompute_totals},
    },
    config::PricingSettings,
    products::{Catalog, CatalogError, CatalogSnapshot, ProductId, snapshot},
    promotions::{PromotionError, repository::PromotionRepository},
    reconciliation::{Reconciliation, ReconciliationChange, RemovedItem, reconcile},
    store::{CartStore, OwnerKey, StoreError},
};

/// Errors returned by [`CartService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Cart edit rejected.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// Promotion rejected or unavailable.
    #[error(transparent)]
    Promotion(#[from] PromotionError),

    /// Catalog unreachable.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Cart storage unreachable.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    /// Message key for the caller to report.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Cart(err) => err.kind(),
            Self::Promotion(err) => err.kind(),
            Self::Catalog(err) => err.kind(),
            Self::Store(_) => "CartStoreUnavailable",
        }
    }

    /// Whether the caller caused the error, as opposed to an infrastructure
    /// fault worth retrying.
    pub const fn is_user_facing(&self) -> bool {
        match self {
            Self::Cart(_) => true,
            Self::Promotion(err) => err.is_user_facing(),
            Self::Catalog(_) | Self::Store(_) => false,
        }
    }
}

/// A promotion dropped during validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionRemoval {
    /// Code that was applied
    pub code: String,

    /// Message key of the failure that removed it
    pub reason: &'static str,
}

/// A reconciled cart with its totals and everything that changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartReport {
    /// Cart as saved
    pub cart: Cart,

    /// Totals for the saved cart
    pub totals: CartTotals,

    /// Field drift found by reconciliation
    pub changes: Vec<ReconciliationChange>,

    /// Lines reconciliation dropped
    pub removed_items: Vec<RemovedItem>,

    /// Applied promotion that no longer holds
    pub promotion_removed: Option<PromotionRemoval>,

    /// Whether the recomputed discount was reduced to the subtotal
    pub discount_capped: bool,
}

/// Result of applying a promotion code.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyReport {
    /// The application itself
    pub application: PromotionApplication,

    /// Cart as saved
    pub cart: Cart,

    /// Totals for the saved cart
    pub totals: CartTotals,

    /// Field drift found by reconciliation beforehand
    pub changes: Vec<ReconciliationChange>,

    /// Lines reconciliation dropped beforehand
    pub removed_items: Vec<RemovedItem>,
}

/// Cart operations over the catalog, promotion and cart collaborators.
#[derive(Clone)]
pub struct CartService {
    catalog: Arc<dyn Catalog>,
    promotions: Arc<dyn PromotionRepository>,
    carts: Arc<dyn CartStore>,
    pricing: PricingSettings,
}

impl std::fmt::Debug for CartService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartService")
            .field("pricing", &self.pricing)
            .finish_non_exhaustive()
    }
}

/// A loaded cart after reconciliation, before any edit.
struct Loaded {
    cart: Cart,
    snapshot: CatalogSnapshot,
    previous_promotion: Option<AppliedPromotion>,
    reconciliation: Reconciliation,
}

impl CartService {
    /// Wire the service to its collaborators.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn Catalog>,
        promotions: Arc<dyn PromotionRepository>,
        carts: Arc<dyn CartStore>,
        pricing: PricingSettings,
    ) -> Self {
        Self {
            catalog,
            promotions,
            carts,
            pricing,
        }
    }

    /// Pricing settings in use.
    pub const fn pricing(&self) -> PricingSettings {
        self.pricing
    }

    /// Reconcile the owner's cart, re-evaluate its promotion and save it.
    ///
    /// # Errors
    ///
    /// Returns an infrastructure error if the catalog, promotion repository
    /// or cart store is unreachable. Promotion failures don't error; they
    /// remove the promotion and are reported in [`CartReport::promotion_removed`].
    #[tracing::instrument(
        name = "carts.service.validate_cart",
        skip(self),
        fields(
            owner = %owner,
            removed = tracing::field::Empty,
            changed = tracing::field::Empty
        ),
        err
    )]
    pub fn validate_cart(&self, owner: &OwnerKey, today: Date) -> Result<CartReport, ServiceError> {
        let loaded = self.load_reconciled(owner, None)?;

        self.finish(owner, loaded, today)
    }

    /// Same as [`CartService::validate_cart`]; every read revalidates.
    ///
    /// # Errors
    ///
    /// See [`CartService::validate_cart`].
    pub fn fetch_cart(&self, owner: &OwnerKey, today: Date) -> Result<CartReport, ServiceError> {
        self.validate_cart(owner, today)
    }

    /// Add units of a product to the owner's cart.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::Cart`]: the product can't be added in that quantity.
    /// - Infrastructure errors as for [`CartService::validate_cart`].
    #[tracing::instrument(
        name = "carts.service.add_item",
        skip(self, product),
        fields(owner = %owner, product_id = %product),
        err
    )]
    pub fn add_item(
        &self,
        owner: &OwnerKey,
        product: ProductId,
        quantity: u32,
        today: Date,
    ) -> Result<CartReport, ServiceError> {
        let mut loaded = self.load_reconciled(owner, Some(product))?;

        let total = loaded.cart.add_line(product, quantity, &loaded.snapshot)?;

        info!(product_id = %product, quantity = total, "added item to cart");

        self.finish(owner, loaded, today)
    }

    /// Set the quantity of a line; zero removes it.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::Cart`]: the line is missing or stock is short.
    /// - Infrastructure errors as for [`CartService::validate_cart`].
    #[tracing::instrument(
        name = "carts.service.update_item",
        skip(self, product),
        fields(owner = %owner, product_id = %product),
        err
    )]
    pub fn update_item(
        &self,
        owner: &OwnerKey,
        product: ProductId,
        quantity: u32,
        today: Date,
    ) -> Result<CartReport, ServiceError> {
        let mut loaded = self.load_reconciled(owner, None)?;

        loaded
            .cart
            .update_quantity(product, quantity, &loaded.snapshot)?;

        info!(product_id = %product, quantity, "updated cart item");

        self.finish(owner, loaded, today)
    }

    /// Drop a product's line.
    ///
    /// # Errors
    ///
    /// Infrastructure errors as for [`CartService::validate_cart`].
    #[tracing::instrument(
        name = "carts.service.remove_item",
        skip(self, product),
        fields(owner = %owner, product_id = %product),
        err
    )]
    pub fn remove_item(
        &self,
        owner: &OwnerKey,
        product: ProductId,
        today: Date,
    ) -> Result<CartReport, ServiceError> {
        let mut loaded = self.load_reconciled(owner, None)?;

        if loaded.cart.remove_line(product) {
            info!(product_id = %product, "removed cart item");
        }

        self.finish(owner, loaded, today)
    }

    /// Empty the owner's cart.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Store`] if the cart can't be saved.
    #[tracing::instrument(name = "carts.service.clear_cart", skip(self), fields(owner = %owner), err)]
    pub fn clear_cart(&self, owner: &OwnerKey) -> Result<Cart, ServiceError> {
        let mut cart = self.carts.load_cart(owner)?;

        cart.clear();

        self.carts.save_cart(owner, &cart)?;

        info!("cleared cart");

        Ok(cart)
    }

    /// Apply a promotion code to the owner's cart, replacing any previous one.
    ///
    /// The cart is reconciled first. When the promotion is rejected nothing is
    /// saved, so the previous promotion stays in place.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::Promotion`]: not found, unusable or ineligible.
    /// - Infrastructure errors as for [`CartService::validate_cart`].
    #[tracing::instrument(
        name = "carts.service.apply_promotion",
        skip(self),
        fields(
            owner = %owner,
            code = %code,
            discount = tracing::field::Empty,
            capped = tracing::field::Empty
        ),
        err
    )]
    pub fn apply_promotion(
        &self,
        owner: &OwnerKey,
        code: &str,
        today: Date,
    ) -> Result<ApplyReport, ServiceError> {
        let mut loaded = self.load_reconciled(owner, None)?;

        let application = apply::apply_promotion(
            &mut loaded.cart,
            code,
            self.promotions.as_ref(),
            today,
            self.pricing.currency,
        )?;

        let span = Span::current();

        span.record(
            "discount",
            tracing::field::display(application.discount_amount),
        );
        span.record("capped", application.discount_capped);

        if application.discount_capped {
            warn!(
                computed = %application.computed_discount,
                subtotal = %loaded.cart.subtotal(),
                "discount capped at cart subtotal"
            );
        }

        self.carts.save_cart(owner, &loaded.cart)?;

        info!(discount = %application.discount_amount, "applied promotion");

        let totals = self.totals(&loaded.cart);

        Ok(ApplyReport {
            application,
            cart: loaded.cart,
            totals,
            changes: loaded.reconciliation.changes,
            removed_items: loaded.reconciliation.removed_items,
        })
    }

    /// Remove the applied promotion, if any.
    ///
    /// The cart is reconciled first, so the returned totals and the saved
    /// lines reflect the live catalog.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::Catalog`]: the catalog can't be read.
    /// - [`ServiceError::Store`]: the cart can't be loaded or saved.
    #[tracing::instrument(
        name = "carts.service.remove_promotion",
        skip(self),
        fields(
            owner = %owner,
            removed = tracing::field::Empty,
            changed = tracing::field::Empty
        ),
        err
    )]
    pub fn remove_promotion(&self, owner: &OwnerKey) -> Result<CartTotals, ServiceError> {
        let Loaded { mut cart, .. } = self.load_reconciled(owner, None)?;

        if let Some(applied) = cart.applied_promotion() {
            info!(code = %applied.code, "removed promotion");
        }

        cart.remove_promotion();

        self.carts.save_cart(owner, &cart)?;

        Ok(self.totals(&cart))
    }

    /// Run the promotion expiry sweep.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Promotion`] if the repository is unreachable.
    #[tracing::instrument(name = "carts.service.expire_promotions", skip(self), err)]
    pub fn expire_promotions(&self, today: Date) -> Result<usize, ServiceError> {
        self.promotions
            .deactivate_expired(today)
            .map_err(|err| ServiceError::Promotion(err.into()))
    }

    fn totals(&self, cart: &Cart) -> CartTotals {
        recompute_totals(cart, self.pricing.vat_rate, self.pricing.currency)
    }

    fn load_reconciled(
        &self,
        owner: &OwnerKey,
        extra: Option<ProductId>,
    ) -> Result<Loaded, ServiceError> {
        let mut cart = self.carts.load_cart(owner)?;

        let mut ids = cart.product_ids();

        if let Some(extra) = extra.filter(|extra| !ids.contains(extra)) {
            ids.push(extra);
        }

        let snapshot = snapshot(self.catalog.as_ref(), &ids)?;

        let previous_promotion = cart.applied_promotion().cloned();
        let mut reconciliation = reconcile(cart.lines(), &snapshot);

        for removed in &reconciliation.removed_items {
            warn!(
                product_id = %removed.line.product_id,
                reason = %removed.reason,
                "removed cart line"
            );
        }

        for change in &reconciliation.changes {
            debug!(
                product_id = %change.product_id,
                field = ?change.field,
                "cart line drifted from catalog"
            );
        }

        let span = Span::current();

        span.record("removed", reconciliation.removed_items.len());
        span.record("changed", reconciliation.changes.len());

        cart.replace_lines(std::mem::take(&mut reconciliation.validated_lines));

        Ok(Loaded {
            cart,
            snapshot,
            previous_promotion,
            reconciliation,
        })
    }

    fn finish(&self, owner: &OwnerKey, loaded: Loaded, today: Date) -> Result<CartReport, ServiceError> {
        let Loaded {
            mut cart,
            previous_promotion,
            reconciliation,
            ..
        } = loaded;

        let (promotion_removed, discount_capped) =
            self.revalidate_promotion(&mut cart, previous_promotion, today)?;

        self.carts.save_cart(owner, &cart)?;

        let totals = self.totals(&cart);

        Ok(CartReport {
            cart,
            totals,
            changes: reconciliation.changes,
            removed_items: reconciliation.removed_items,
            promotion_removed,
            discount_capped,
        })
    }

    /// Re-resolve and re-price the promotion that was on the cart when it
    /// was loaded. A promotion that no longer holds is removed.
    fn revalidate_promotion(
        &self,
        cart: &mut Cart,
        previous: Option<AppliedPromotion>,
        today: Date,
    ) -> Result<(Option<PromotionRemoval>, bool), ServiceError> {
        let Some(previous) = previous else {
            return Ok((None, false));
        };

        let outcome = self
            .promotions
            .promotion_by_code(&previous.code)
            .map_err(PromotionError::from)
            .and_then(|found| {
                found.ok_or_else(|| PromotionError::NotFound {
                    code: previous.code.clone(),
                })
            })
            .and_then(|promotion| apply_resolved(cart, &promotion, today, self.pricing.currency));

        match outcome {
            Ok(application) => {
                if application.discount_capped {
                    warn!(
                        code = %previous.code,
                        computed = %application.computed_discount,
                        "discount capped at cart subtotal"
                    );
                }

                Ok((None, application.discount_capped))
            }
            Err(err) if err.is_user_facing() => {
                cart.remove_promotion();

                warn!(code = %previous.code, reason = err.kind(), "removed promotion from cart");

                Ok((
                    Some(PromotionRemoval {
                        code: previous.code,
                        reason: err.kind(),
                    }),
                    false,
                ))
            }
            Err(err) => Err(err.into()),
        }
    }
}
