use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use atelier_catalog::CartLine;
use atelier_core::{CoreError, CoreResult, OrderStatus, PageRequest, PaymentStatus};

use crate::cancellation::{CancellationRequest, CancellationStatus};
use crate::models::Order;
use crate::repository::{CancellationRepository, CartRepository, OrderRepository};

#[derive(Default)]
struct State {
    orders: HashMap<Uuid, Order>,
    carts: HashMap<String, Vec<CartLine>>,
    requests: HashMap<Uuid, CancellationRequest>,
}

/// Orders, carts and cancellation requests behind a single lock, so every multi-entity
/// write is atomic. Used for local runs and tests.
#[derive(Default)]
pub struct InMemoryOrderStore {
    state: Mutex<State>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first_orders(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| b.order_date.cmp(&a.order_date));
    orders
}

fn newest_first_requests(mut requests: Vec<CancellationRequest>) -> Vec<CancellationRequest> {
    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    requests
}

#[async_trait]
impl OrderRepository for InMemoryOrderStore {
    async fn insert_and_clear_cart(&self, order: &Order) -> CoreResult<()> {
        let mut state = self.state.lock().await;
        if state.orders.contains_key(&order.id) {
            return Err(CoreError::ConflictError(format!("order {} already exists", order.id)));
        }
        state.orders.insert(order.id, order.clone());
        state.carts.remove(&order.owner_id);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Order>> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn list_for_owner(&self, owner_id: &str) -> CoreResult<Vec<Order>> {
        let state = self.state.lock().await;
        let orders = state
            .orders
            .values()
            .filter(|o| o.owner_id == owner_id)
            .cloned()
            .collect();
        Ok(newest_first_orders(orders))
    }

    async fn list_all(&self) -> CoreResult<Vec<Order>> {
        let state = self.state.lock().await;
        Ok(newest_first_orders(state.orders.values().cloned().collect()))
    }

    async fn update_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        payment_status: PaymentStatus,
        at: DateTime<Utc>,
    ) -> CoreResult<Option<Order>> {
        let mut state = self.state.lock().await;
        match state.orders.get_mut(&id) {
            Some(order) if order.order_status == from => {
                order.order_status = to;
                order.payment_status = payment_status;
                order.updated_at = at;
                Ok(Some(order.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl CartRepository for InMemoryOrderStore {
    async fn get_cart(&self, owner_id: &str) -> CoreResult<Vec<CartLine>> {
        Ok(self
            .state
            .lock()
            .await
            .carts
            .get(owner_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_line(&self, owner_id: &str, line: &CartLine) -> CoreResult<Vec<CartLine>> {
        let mut state = self.state.lock().await;
        let cart = state.carts.entry(owner_id.to_string()).or_default();
        match cart.iter_mut().find(|existing| existing.item == line.item) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
            None => cart.push(line.clone()),
        }
        Ok(cart.clone())
    }
}

#[async_trait]
impl CancellationRepository for InMemoryOrderStore {
    async fn insert_active(&self, request: &CancellationRequest) -> CoreResult<()> {
        let mut state = self.state.lock().await;
        let duplicate = state
            .requests
            .values()
            .any(|r| r.order_id == request.order_id && r.status.is_active());
        if duplicate {
            return Err(CoreError::ConflictError(format!(
                "order {} already has an active cancellation request",
                request.order_id
            )));
        }
        state.requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<CancellationRequest>> {
        Ok(self.state.lock().await.requests.get(&id).cloned())
    }

    async fn replace_if_status(
        &self,
        request: &CancellationRequest,
        expected: CancellationStatus,
    ) -> CoreResult<bool> {
        let mut state = self.state.lock().await;
        match state.requests.get_mut(&request.id) {
            Some(stored) if stored.status == expected => {
                *stored = request.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_for_owner(&self, owner_id: &str) -> CoreResult<Vec<CancellationRequest>> {
        let state = self.state.lock().await;
        let requests = state
            .requests
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        Ok(newest_first_requests(requests))
    }

    async fn list(
        &self,
        status: Option<CancellationStatus>,
        page: PageRequest,
    ) -> CoreResult<(Vec<CancellationRequest>, u64)> {
        let page = page.normalized();
        let state = self.state.lock().await;
        let matching = newest_first_requests(
            state
                .requests
                .values()
                .filter(|r| status.map_or(true, |s| r.status == s))
                .cloned()
                .collect(),
        );
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .collect();
        Ok((items, total))
    }
}
