use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use atelier_catalog::CartLine;
use atelier_core::{CoreResult, OrderStatus, PageRequest, PaymentStatus};

use crate::cancellation::{CancellationRequest, CancellationStatus};
use crate::models::Order;

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Stores a new order and empties its owner's cart in one unit.
    async fn insert_and_clear_cart(&self, order: &Order) -> CoreResult<()>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<Order>>;

    /// Newest first.
    async fn list_for_owner(&self, owner_id: &str) -> CoreResult<Vec<Order>>;

    /// Newest first.
    async fn list_all(&self) -> CoreResult<Vec<Order>>;

    /// Moves the order to `to` only if it is still in `from`. `None` when it was not.
    async fn update_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        payment_status: PaymentStatus,
        at: DateTime<Utc>,
    ) -> CoreResult<Option<Order>>;
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn get_cart(&self, owner_id: &str) -> CoreResult<Vec<CartLine>>;

    /// Adds a line, merging quantities with an existing line for the same item.
    async fn add_line(&self, owner_id: &str, line: &CartLine) -> CoreResult<Vec<CartLine>>;
}

#[async_trait]
pub trait CancellationRepository: Send + Sync {
    /// Stores a new request. Fails with `ConflictError` when the order already has an
    /// active one; the check and the write happen as one step.
    async fn insert_active(&self, request: &CancellationRequest) -> CoreResult<()>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<CancellationRequest>>;

    /// Overwrites the stored request only if its status is still `expected`.
    async fn replace_if_status(
        &self,
        request: &CancellationRequest,
        expected: CancellationStatus,
    ) -> CoreResult<bool>;

    /// Newest first.
    async fn list_for_owner(&self, owner_id: &str) -> CoreResult<Vec<CancellationRequest>>;

    /// Newest first, with the total count matching `status`.
    async fn list(
        &self,
        status: Option<CancellationStatus>,
        page: PageRequest,
    ) -> CoreResult<(Vec<CancellationRequest>, u64)>;
}
