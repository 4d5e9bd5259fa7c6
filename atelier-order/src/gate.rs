use chrono::{DateTime, Utc};
use std::sync::Arc;

use atelier_catalog::{AvailabilityChecker, CartLine, CatalogRepository, Purchasable};
use atelier_core::{CoreError, CoreResult};

use crate::models::OrderLine;

/// A cart line that passed the gate, priced at the moment it was checked.
///
/// Only the gate can build one, so an order can never be created from unchecked lines.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedLine {
    line: OrderLine,
}

impl ValidatedLine {
    pub fn line(&self) -> &OrderLine {
        &self.line
    }

    pub fn into_line(self) -> OrderLine {
        self.line
    }
}

impl From<Purchasable> for ValidatedLine {
    fn from(purchasable: Purchasable) -> Self {
        let line = match purchasable {
            Purchasable::Product { product, quantity } => OrderLine::Product {
                product_id: product.id,
                unit_price: product.effective_price(),
                name: product.name,
                quantity,
            },
            Purchasable::Bundle { bundle, quantity } => OrderLine::Bundle {
                bundle_id: bundle.id,
                bundle_price: bundle.bundle_price,
                name: bundle.name,
                quantity,
            },
        };
        Self { line }
    }
}

/// All-or-nothing availability check run right before an order is created.
pub struct CartValidationGate {
    checker: AvailabilityChecker,
}

impl CartValidationGate {
    pub fn new(catalog: Arc<dyn CatalogRepository>) -> Self {
        Self {
            checker: AvailabilityChecker::new(catalog),
        }
    }

    /// Checks lines in order and stops at the first failure, which names the line.
    ///
    /// Repeated items are folded into their first line before checking, so stock is
    /// compared against the combined quantity.
    pub async fn validate(
        &self,
        lines: &[CartLine],
        now: DateTime<Utc>,
    ) -> CoreResult<Vec<ValidatedLine>> {
        let merged = merge_lines(lines)?;
        let mut validated = Vec::with_capacity(merged.len());
        for (index, line) in &merged {
            match self.checker.check(*index, line, now).await {
                Ok(purchasable) => validated.push(ValidatedLine::from(purchasable)),
                Err(e) => {
                    tracing::warn!(line = *index, item_id = %line.item.id(), "Cart line rejected: {}", e);
                    return Err(e);
                }
            }
        }
        Ok(validated)
    }
}

/// One line per item, tagged with the index where the item first appeared.
fn merge_lines(lines: &[CartLine]) -> CoreResult<Vec<(usize, CartLine)>> {
    let mut merged: Vec<(usize, CartLine)> = Vec::with_capacity(lines.len());
    for (index, line) in lines.iter().enumerate() {
        match merged.iter_mut().find(|(_, seen)| seen.item == line.item) {
            Some((_, seen)) => {
                seen.quantity = seen.quantity.checked_add(line.quantity).ok_or_else(|| {
                    CoreError::ValidationError(format!("line {}: quantity is too large", index))
                })?;
            }
            None => merged.push((index, line.clone())),
        }
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use chrono::Duration;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_snapshots_current_prices() {
        let catalog = fixtures::catalog();
        let mut shirt = fixtures::product("Linen Shirt", 3_000, 5);
        shirt.discount_price = Some(2_400);
        catalog.insert_product(shirt.clone());

        let gate = CartValidationGate::new(catalog.clone());
        let validated = gate
            .validate(&[CartLine::product(shirt.id, 2)], Utc::now())
            .await
            .unwrap();

        assert_eq!(validated.len(), 1);
        assert_eq!(validated[0].line().line_total().unwrap(), 4_800);
    }

    #[tokio::test]
    async fn test_first_failing_line_is_reported() {
        let catalog = fixtures::catalog();
        let now = Utc::now();
        let shirt = fixtures::product("Linen Shirt", 3_000, 5);
        let expired = fixtures::bundle("Spring Set", 8_000, now - Duration::days(10), now - Duration::days(1));
        catalog.insert_product(shirt.clone());
        catalog.insert_bundle(expired.clone());

        let gate = CartValidationGate::new(catalog.clone());
        let result = gate
            .validate(
                &[
                    CartLine::product(shirt.id, 2),
                    CartLine::bundle(expired.id, 1),
                    CartLine::product(Uuid::new_v4(), 1),
                ],
                now,
            )
            .await;

        match result {
            Err(CoreError::UnavailableError { line, item_id, .. }) => {
                assert_eq!(line, 1);
                assert_eq!(item_id, expired.id);
            }
            other => panic!("expected unavailable bundle, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_entity_is_not_found() {
        let gate = CartValidationGate::new(fixtures::catalog());
        let result = gate
            .validate(&[CartLine::bundle(Uuid::new_v4(), 1)], Utc::now())
            .await;
        assert!(matches!(result, Err(CoreError::NotFoundError(_))));
    }

    #[tokio::test]
    async fn test_quantity_exceeding_stock() {
        let catalog = fixtures::catalog();
        let shirt = fixtures::product("Linen Shirt", 3_000, 5);
        catalog.insert_product(shirt.clone());
        let gate = CartValidationGate::new(catalog.clone());

        assert!(gate.validate(&[CartLine::product(shirt.id, 5)], Utc::now()).await.is_ok());
        assert!(matches!(
            gate.validate(&[CartLine::product(shirt.id, 6)], Utc::now()).await,
            Err(CoreError::InsufficientStockError { available: 5, .. })
        ));
    }

    #[tokio::test]
    async fn test_repeated_lines_share_stock() {
        let catalog = fixtures::catalog();
        let shirt = fixtures::product("Linen Shirt", 3_000, 5);
        let scarf = fixtures::product("Silk Scarf", 1_500, 10);
        catalog.insert_product(shirt.clone());
        catalog.insert_product(scarf.clone());
        let gate = CartValidationGate::new(catalog.clone());

        let oversold = gate
            .validate(
                &[
                    CartLine::product(scarf.id, 1),
                    CartLine::product(shirt.id, 5),
                    CartLine::product(shirt.id, 5),
                ],
                Utc::now(),
            )
            .await;
        match oversold {
            Err(CoreError::InsufficientStockError {
                line,
                requested,
                available,
                ..
            }) => {
                assert_eq!(line, 1);
                assert_eq!(requested, 10);
                assert_eq!(available, 5);
            }
            other => panic!("expected insufficient stock, got {:?}", other),
        }

        let validated = gate
            .validate(
                &[CartLine::product(shirt.id, 2), CartLine::product(shirt.id, 3)],
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(validated.len(), 1);
        assert_eq!(validated[0].line().quantity(), 5);
    }

    #[tokio::test]
    async fn test_repeated_lines_cannot_overflow_quantity() {
        let catalog = fixtures::catalog();
        let now = Utc::now();
        let capsule = fixtures::bundle("Weekend Capsule", 9_000, now - Duration::days(1), now + Duration::days(1));
        catalog.insert_bundle(capsule.clone());
        let gate = CartValidationGate::new(catalog.clone());

        let result = gate
            .validate(
                &[CartLine::bundle(capsule.id, u32::MAX), CartLine::bundle(capsule.id, 1)],
                now,
            )
            .await;
        assert!(matches!(result, Err(CoreError::ValidationError(_))));
    }
}
