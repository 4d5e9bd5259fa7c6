use axum::{extract::State, Extension, Json};

use atelier_policy::{CancellationPolicy, PolicyUpdate};

use crate::error::{AppError, AppJson};
use crate::middleware::AccountClaims;
use crate::state::AppState;

/// GET /v1/cancellation-policy
/// The active policy, seeded with defaults on first read
pub async fn get_policy(State(state): State<AppState>) -> Result<Json<CancellationPolicy>, AppError> {
    Ok(Json(state.policies.get_active().await?))
}

/// PUT /v1/admin/cancellation-policy
/// Partial update; omitted fields keep their values
pub async fn update_policy(
    State(state): State<AppState>,
    Extension(claims): Extension<AccountClaims>,
    AppJson(update): AppJson<PolicyUpdate>,
) -> Result<Json<CancellationPolicy>, AppError> {
    Ok(Json(state.policies.update(update, &claims.sub).await?))
}
