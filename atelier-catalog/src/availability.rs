use chrono::{DateTime, Utc};
use std::sync::Arc;

use atelier_core::{CoreError, CoreResult};
use crate::line::{CartLine, ItemRef};
use crate::product::{Bundle, Product};
use crate::repository::CatalogRepository;

/// A cart line that passed every availability rule, with the entity it resolved to.
#[derive(Debug, Clone)]
pub enum Purchasable {
    Product { product: Product, quantity: u32 },
    Bundle { bundle: Bundle, quantity: u32 },
}

/// Answers whether a single cart line can be bought right now.
pub struct AvailabilityChecker {
    catalog: Arc<dyn CatalogRepository>,
}

impl AvailabilityChecker {
    pub fn new(catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { catalog }
    }

    /// `line_index` is only used to tag errors with the offending line.
    pub async fn check(
        &self,
        line_index: usize,
        line: &CartLine,
        now: DateTime<Utc>,
    ) -> CoreResult<Purchasable> {
        match line.item {
            ItemRef::Product { product_id } => {
                let product = self
                    .catalog
                    .get_product(product_id)
                    .await?
                    .ok_or_else(|| CoreError::NotFoundError(format!("product {}", product_id)))?;
                check_product(line_index, &product, line.quantity)?;
                Ok(Purchasable::Product {
                    product,
                    quantity: line.quantity,
                })
            }
            ItemRef::Bundle { bundle_id } => {
                let bundle = self
                    .catalog
                    .get_bundle(bundle_id)
                    .await?
                    .ok_or_else(|| CoreError::NotFoundError(format!("bundle {}", bundle_id)))?;
                check_bundle(line_index, &bundle, line.quantity, now)?;
                Ok(Purchasable::Bundle {
                    bundle,
                    quantity: line.quantity,
                })
            }
        }
    }
}

pub fn check_product(line: usize, product: &Product, requested: u32) -> CoreResult<()> {
    if !product.published {
        return Err(CoreError::UnavailableError {
            line,
            item_id: product.id,
            name: product.name.clone(),
            reason: "not published".to_string(),
        });
    }
    if product.stock < requested {
        return Err(CoreError::InsufficientStockError {
            line,
            item_id: product.id,
            name: product.name.clone(),
            requested,
            available: product.stock,
        });
    }
    Ok(())
}

/// Bundles are checked for activity and sale window, then only for being sold out.
pub fn check_bundle(
    line: usize,
    bundle: &Bundle,
    requested: u32,
    now: DateTime<Utc>,
) -> CoreResult<()> {
    let unavailable = |reason: &str| CoreError::UnavailableError {
        line,
        item_id: bundle.id,
        name: bundle.name.clone(),
        reason: reason.to_string(),
    };

    if !bundle.active {
        return Err(unavailable("inactive"));
    }
    if !bundle.within_window(now) {
        return Err(unavailable("outside sale window"));
    }
    if let Some(stock) = bundle.stock {
        if stock == 0 {
            return Err(CoreError::InsufficientStockError {
                line,
                item_id: bundle.id,
                name: bundle.name.clone(),
                requested,
                available: 0,
            });
        }
    }
    Ok(())
}
