use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use atelier_catalog::{CartLine, CartLineInput};
use atelier_core::{CoreResult, OrderStatus, PaymentMethod};
use atelier_order::{Order, PlaceOrder, StatusActor};

use crate::error::{AppError, AppJson};
use crate::middleware::AccountClaims;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    /// Omit to check out the stored cart.
    pub lines: Option<Vec<CartLineInput>>,
    pub delivery_address_id: Uuid,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Deserialize)]
pub struct AdvanceStatusRequest {
    pub status: OrderStatus,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/orders
/// Validate the cart lines and place an order
pub async fn create_order(
    State(state): State<AppState>,
    Extension(claims): Extension<AccountClaims>,
    AppJson(req): AppJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let lines = req
        .lines
        .map(|lines| lines.into_iter().map(CartLine::try_from).collect::<CoreResult<Vec<_>>>())
        .transpose()?;

    let placed = state
        .orders
        .checkout(
            &claims.sub,
            PlaceOrder {
                lines,
                delivery_address_id: req.delivery_address_id,
                payment_method: req.payment_method,
            },
        )
        .await;

    match placed {
        Ok(order) => {
            state.metrics.orders_created.inc();
            Ok((StatusCode::CREATED, Json(order)))
        }
        Err(e) => {
            state.metrics.checkout_rejections.with_label_values(&[e.kind()]).inc();
            Err(e.into())
        }
    }
}

/// GET /v1/orders
/// The caller's orders, newest first
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(claims): Extension<AccountClaims>,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.orders.list_for_owner(&claims.sub).await?))
}

/// GET /v1/orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    Extension(claims): Extension<AccountClaims>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.orders.get_for_owner(&claims.sub, order_id).await?))
}

/// GET /v1/admin/orders
/// Every order, newest first
pub async fn list_all_orders(State(state): State<AppState>) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.orders.list_all().await?))
}

/// POST /v1/admin/orders/{id}/status
/// Record fulfillment progress. Cancellation goes through a cancellation request.
pub async fn advance_order_status(
    State(state): State<AppState>,
    Extension(claims): Extension<AccountClaims>,
    Path(order_id): Path<Uuid>,
    AppJson(req): AppJson<AdvanceStatusRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .orders
        .advance_status(
            order_id,
            req.status,
            StatusActor::Fulfillment {
                admin_id: claims.sub,
            },
        )
        .await?;
    Ok(Json(order))
}
