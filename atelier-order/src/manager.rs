use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use atelier_catalog::{CartLine, CatalogRepository};
use atelier_core::{CoreError, CoreResult, NotificationDispatcher, OrderStatus, PaymentMethod};
use atelier_shared::{BuyerNotification, NotificationKind};

use crate::gate::{CartValidationGate, ValidatedLine};
use crate::models::Order;
use crate::repository::{CartRepository, OrderRepository};

/// Who is asking for a status change. Only these two paths may move an order.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusActor {
    /// Admin fulfillment progress. Never cancels.
    Fulfillment { admin_id: String },
    /// An approved cancellation request. Only cancels.
    CancellationApproval { request_id: Uuid },
}

/// Checkout input. When `lines` is absent the buyer's stored cart is used.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub lines: Option<Vec<CartLine>>,
    pub delivery_address_id: Uuid,
    pub payment_method: PaymentMethod,
}

/// Owns orders and their status state machine.
pub struct OrderLifecycle {
    orders: Arc<dyn OrderRepository>,
    carts: Arc<dyn CartRepository>,
    gate: CartValidationGate,
    notifier: NotificationDispatcher,
}

impl OrderLifecycle {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        carts: Arc<dyn CartRepository>,
        catalog: Arc<dyn CatalogRepository>,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self {
            orders,
            carts,
            gate: CartValidationGate::new(catalog),
            notifier,
        }
    }

    /// Validates the lines through the gate, then creates the order.
    pub async fn checkout(&self, owner_id: &str, request: PlaceOrder) -> CoreResult<Order> {
        let lines = match request.lines {
            Some(lines) => lines,
            None => self.carts.get_cart(owner_id).await?,
        };
        if lines.is_empty() {
            return Err(CoreError::ValidationError("order has no items".to_string()));
        }

        let validated = self.gate.validate(&lines, Utc::now()).await?;
        self.create_order(owner_id, validated, request.delivery_address_id, request.payment_method)
            .await
    }

    /// Creates an order in `ORDER_PLACED` with prices frozen from the validated lines and
    /// clears the buyer's cart in the same write.
    pub async fn create_order(
        &self,
        owner_id: &str,
        lines: Vec<ValidatedLine>,
        delivery_address_id: Uuid,
        payment_method: PaymentMethod,
    ) -> CoreResult<Order> {
        if lines.is_empty() {
            return Err(CoreError::ValidationError("order has no items".to_string()));
        }

        let items = lines.into_iter().map(ValidatedLine::into_line).collect();
        let order = Order::new(owner_id, items, delivery_address_id, payment_method, Utc::now())?;
        self.orders.insert_and_clear_cart(&order).await?;

        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total_amt = order.total_amt,
            "Order placed"
        );

        self.notifier
            .dispatch(BuyerNotification::new(
                order.owner_id.clone(),
                order.id,
                NotificationKind::OrderPlaced {
                    order_number: order.order_number.clone(),
                    total_amt: order.total_amt,
                    total_qty: order.total_qty,
                },
            ))
            .await;

        Ok(order)
    }

    /// Moves an order along one edge of the status table.
    ///
    /// The write is conditional on the status read here, so a racing writer makes this
    /// call fail with `StateError` instead of overwriting a terminal state.
    pub async fn advance_status(
        &self,
        order_id: Uuid,
        target: OrderStatus,
        actor: StatusActor,
    ) -> CoreResult<Order> {
        match (&actor, target) {
            (StatusActor::Fulfillment { .. }, OrderStatus::Cancelled) => {
                return Err(CoreError::StateError(
                    "orders are cancelled through a cancellation request".to_string(),
                ));
            }
            (StatusActor::CancellationApproval { .. }, t) if t != OrderStatus::Cancelled => {
                return Err(CoreError::StateError(format!(
                    "a cancellation approval cannot move an order to {}",
                    t
                )));
            }
            _ => {}
        }

        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or_else(|| CoreError::NotFoundError(format!("order {}", order_id)))?;
        let from = order.order_status;
        from.ensure_transition(target)?;

        let payment_status = order
            .payment_status
            .after_order_transition(order.payment_method, target);
        let updated = self
            .orders
            .update_status(order_id, from, target, payment_status, Utc::now())
            .await?
            .ok_or_else(|| {
                CoreError::StateError(format!(
                    "order {} is no longer {}, status changed concurrently",
                    order_id, from
                ))
            })?;

        tracing::info!(
            order_id = %order_id,
            from = %from,
            to = %target,
            actor = ?actor,
            "Order status advanced"
        );

        self.notifier
            .dispatch(BuyerNotification::new(
                updated.owner_id.clone(),
                updated.id,
                NotificationKind::OrderStatusChanged {
                    order_number: updated.order_number.clone(),
                    from: from.as_str().to_string(),
                    to: target.as_str().to_string(),
                },
            ))
            .await;

        Ok(updated)
    }

    /// An order as seen by its owner. Someone else's order is reported as missing.
    pub async fn get_for_owner(&self, owner_id: &str, order_id: Uuid) -> CoreResult<Order> {
        match self.orders.get(order_id).await? {
            Some(order) if order.owner_id == owner_id => Ok(order),
            _ => Err(CoreError::NotFoundError(format!("order {}", order_id))),
        }
    }

    pub async fn list_for_owner(&self, owner_id: &str) -> CoreResult<Vec<Order>> {
        self.orders.list_for_owner(owner_id).await
    }

    pub async fn list_all(&self) -> CoreResult<Vec<Order>> {
        self.orders.list_all().await
    }

    pub async fn cart(&self, owner_id: &str) -> CoreResult<Vec<CartLine>> {
        self.carts.get_cart(owner_id).await
    }

    /// Availability is not checked here; catalog state is only trusted at checkout.
    pub async fn add_to_cart(&self, owner_id: &str, line: CartLine) -> CoreResult<Vec<CartLine>> {
        if line.quantity == 0 {
            return Err(CoreError::ValidationError(
                "quantity must be at least 1".to_string(),
            ));
        }
        self.carts.add_line(owner_id, &line).await
    }
}
