use axum::{extract::State, Extension, Json};

use atelier_catalog::{CartLine, CartLineInput};

use crate::error::{AppError, AppJson};
use crate::middleware::AccountClaims;
use crate::state::AppState;

/// GET /v1/cart
pub async fn get_cart(
    State(state): State<AppState>,
    Extension(claims): Extension<AccountClaims>,
) -> Result<Json<Vec<CartLine>>, AppError> {
    Ok(Json(state.orders.cart(&claims.sub).await?))
}

/// POST /v1/cart
/// Add a line; quantities for the same item are merged
pub async fn add_to_cart(
    State(state): State<AppState>,
    Extension(claims): Extension<AccountClaims>,
    AppJson(input): AppJson<CartLineInput>,
) -> Result<Json<Vec<CartLine>>, AppError> {
    let line = CartLine::try_from(input)?;
    Ok(Json(state.orders.add_to_cart(&claims.sub, line).await?))
}
