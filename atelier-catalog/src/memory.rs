use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use atelier_core::{CoreError, CoreResult};
use crate::product::{Bundle, Product};
use crate::repository::CatalogRepository;

/// In-memory catalog for local runs and tests.
#[derive(Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<Uuid, Product>>,
    bundles: RwLock<HashMap<Uuid, Bundle>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_product(&self, product: Product) {
        if let Ok(mut products) = self.products.write() {
            products.insert(product.id, product);
        }
    }

    pub fn insert_bundle(&self, bundle: Bundle) {
        if let Ok(mut bundles) = self.bundles.write() {
            bundles.insert(bundle.id, bundle);
        }
    }

    /// A small fixed assortment with stable ids, for running without a database.
    pub fn with_samples() -> Self {
        let catalog = Self::new();
        let shirt = Uuid::from_u128(0x0001);
        let trousers = Uuid::from_u128(0x0002);
        let scarf = Uuid::from_u128(0x0003);
        for (id, name, price, discount_price, stock) in [
            (shirt, "Linen Shirt", 3_000, Some(2_400), 25),
            (trousers, "Pleated Trousers", 5_500, None, 10),
            (scarf, "Silk Scarf", 1_800, None, 40),
        ] {
            catalog.insert_product(Product {
                id,
                name: name.to_string(),
                price,
                discount_price,
                published: true,
                stock,
            });
        }
        catalog.insert_bundle(Bundle {
            id: Uuid::from_u128(0x0101),
            name: "Summer Capsule".to_string(),
            bundle_price: 9_000,
            product_ids: vec![shirt, trousers, scarf],
            active: true,
            time_limited: false,
            start_date: None,
            end_date: None,
            stock: Some(5),
        });
        catalog
    }

    pub fn products(&self) -> Vec<Product> {
        self.products
            .read()
            .map(|products| products.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn bundles(&self) -> Vec<Bundle> {
        self.bundles
            .read()
            .map(|bundles| bundles.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalog {
    async fn get_product(&self, id: Uuid) -> CoreResult<Option<Product>> {
        let products = self.products.read().map_err(CoreError::internal)?;
        Ok(products.get(&id).cloned())
    }

    async fn get_bundle(&self, id: Uuid) -> CoreResult<Option<Bundle>> {
        let bundles = self.bundles.read().map_err(CoreError::internal)?;
        Ok(bundles.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::AvailabilityChecker;
    use crate::line::CartLine;
    use chrono::Utc;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_samples_are_purchasable() {
        let catalog = Arc::new(InMemoryCatalog::with_samples());
        assert_eq!(catalog.products().len(), 3);
        assert_eq!(catalog.bundles().len(), 1);

        let checker = AvailabilityChecker::new(catalog.clone());
        for product in catalog.products() {
            let line = CartLine::product(product.id, 1);
            assert!(checker.check(0, &line, Utc::now()).await.is_ok());
        }
        for bundle in catalog.bundles() {
            let line = CartLine::bundle(bundle.id, 1);
            assert!(checker.check(0, &line, Utc::now()).await.is_ok());
        }
    }
}
