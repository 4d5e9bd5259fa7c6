use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use atelier_core::{Page, PageRequest};
use atelier_order::{
    Adjudication, CancellationRequest, CancellationStatus, CancellationView, SubmissionReceipt,
    SubmitCancellation,
};

use crate::error::{AppError, AppJson, AppQuery};
use crate::middleware::AccountClaims;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListCancellationsQuery {
    pub status: Option<CancellationStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ListCancellationsQuery {
    fn page_request(&self) -> PageRequest {
        let defaults = PageRequest::default();
        PageRequest::new(
            self.page.unwrap_or(defaults.page),
            self.limit.unwrap_or(defaults.limit),
        )
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/orders/{id}/cancellation
/// Ask for an order to be cancelled; returns the proposed refund
pub async fn submit_cancellation(
    State(state): State<AppState>,
    Extension(claims): Extension<AccountClaims>,
    Path(order_id): Path<Uuid>,
    AppJson(req): AppJson<SubmitCancellation>,
) -> Result<(StatusCode, Json<SubmissionReceipt>), AppError> {
    let receipt = state.cancellations.submit(&claims.sub, order_id, req).await?;
    state.metrics.cancellation_requests.inc();
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// GET /v1/cancellations
/// The caller's requests with their order summaries
pub async fn list_own_cancellations(
    State(state): State<AppState>,
    Extension(claims): Extension<AccountClaims>,
) -> Result<Json<Vec<CancellationView>>, AppError> {
    Ok(Json(state.cancellations.list_own(&claims.sub).await?))
}

/// GET /v1/admin/cancellations?status=PENDING&page=1&limit=20
pub async fn list_cancellations(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListCancellationsQuery>,
) -> Result<Json<Page<CancellationRequest>>, AppError> {
    Ok(Json(state.cancellations.list_all(query.status, query.page_request()).await?))
}

/// POST /v1/admin/cancellations/{id}/decision
/// Approve or reject a pending request
pub async fn adjudicate_cancellation(
    State(state): State<AppState>,
    Extension(claims): Extension<AccountClaims>,
    Path(request_id): Path<Uuid>,
    AppJson(req): AppJson<Adjudication>,
) -> Result<Json<CancellationRequest>, AppError> {
    let decision = req.decision;
    let resolved = state
        .cancellations
        .adjudicate(request_id, &claims.sub, req)
        .await?;
    state
        .metrics
        .adjudications
        .with_label_values(&[decision.status().as_str()])
        .inc();
    Ok(Json(resolved))
}

/// POST /v1/admin/cancellations/{id}/refund-complete
/// Close an approved request once the refund went out
pub async fn complete_refund(
    State(state): State<AppState>,
    Extension(claims): Extension<AccountClaims>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<CancellationRequest>, AppError> {
    Ok(Json(state.cancellations.complete_refund(request_id, &claims.sub).await?))
}
