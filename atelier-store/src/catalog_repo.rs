use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use atelier_catalog::{Bundle, CatalogRepository, Product};
use atelier_core::CoreResult;

use crate::database::map_db_error;

/// Read-only view of the catalog tables owned by catalog management.
pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    price: i64,
    discount_price: Option<i64>,
    published: bool,
    stock: i32,
}

#[derive(sqlx::FromRow)]
struct BundleRow {
    id: Uuid,
    name: String,
    bundle_price: i64,
    product_ids: Vec<Uuid>,
    active: bool,
    time_limited: bool,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    stock: Option<i32>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            price: row.price,
            discount_price: row.discount_price,
            published: row.published,
            // Negative counters read as sold out.
            stock: row.stock.max(0) as u32,
        }
    }
}

impl From<BundleRow> for Bundle {
    fn from(row: BundleRow) -> Self {
        Bundle {
            id: row.id,
            name: row.name,
            bundle_price: row.bundle_price,
            product_ids: row.product_ids,
            active: row.active,
            time_limited: row.time_limited,
            start_date: row.start_date,
            end_date: row.end_date,
            stock: row.stock.map(|s| s.max(0) as u32),
        }
    }
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn get_product(&self, id: Uuid) -> CoreResult<Option<Product>> {
        let row: Option<ProductRow> = sqlx::query_as(
            "SELECT id, name, price, discount_price, published, stock FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(row.map(Product::from))
    }

    async fn get_bundle(&self, id: Uuid) -> CoreResult<Option<Bundle>> {
        let row: Option<BundleRow> = sqlx::query_as(
            "SELECT id, name, bundle_price, product_ids, active, time_limited, start_date, end_date, stock \
             FROM bundles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(row.map(Bundle::from))
    }
}
