use async_trait::async_trait;
use uuid::Uuid;

use atelier_core::CoreResult;
use crate::product::{Bundle, Product};

/// Read access to catalog entities owned by the catalog service.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn get_product(&self, id: Uuid) -> CoreResult<Option<Product>>;

    async fn get_bundle(&self, id: Uuid) -> CoreResult<Option<Bundle>>;
}
