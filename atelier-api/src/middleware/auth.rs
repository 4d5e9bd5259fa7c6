use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

pub const ROLE_CUSTOMER: &str = "CUSTOMER";
pub const ROLE_ADMIN: &str = "ADMIN";

// ============================================================================
// JWT Claims
// ============================================================================

/// Resolved account, injected into request extensions by the middleware below.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccountClaims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

fn decode_claims(state: &AppState, bearer: Option<TypedHeader<Authorization<Bearer>>>) -> Result<AccountClaims, AppError> {
    let TypedHeader(Authorization(bearer)) = bearer
        .ok_or_else(|| AppError::AuthenticationError("missing bearer token".to_string()))?;

    decode::<AccountClaims>(
        bearer.token(),
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::AuthenticationError(format!("invalid token: {}", e)))
}

// ============================================================================
// Customer Authentication Middleware
// ============================================================================

pub async fn customer_auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = decode_claims(&state, bearer)?;
    if claims.role != ROLE_CUSTOMER {
        return Err(AppError::AuthorizationError("customer account required".to_string()));
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

// ============================================================================
// Admin Authentication Middleware
// ============================================================================

pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = decode_claims(&state, bearer)?;
    if claims.role != ROLE_ADMIN {
        return Err(AppError::AuthorizationError("admin account required".to_string()));
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
