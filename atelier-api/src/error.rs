use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use atelier_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    AuthenticationError(String),
    #[error("{0}")]
    AuthorizationError(String),
    #[error("{0}")]
    ValidationError(String),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    /// Stable kind reported to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::AuthenticationError(_) => "UNAUTHORIZED",
            AppError::AuthorizationError(_) => "FORBIDDEN",
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::Core(e) => e.kind(),
            AppError::Anyhow(_) => "INTERNAL_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            AppError::AuthorizationError(_) => StatusCode::FORBIDDEN,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::Core(e) => match e {
                CoreError::ValidationError(_) => StatusCode::BAD_REQUEST,
                CoreError::NotFoundError(_) => StatusCode::NOT_FOUND,
                CoreError::UnavailableError { .. }
                | CoreError::InsufficientStockError { .. }
                | CoreError::ConflictError(_) => StatusCode::CONFLICT,
                CoreError::StateError(_) => StatusCode::UNPROCESSABLE_ENTITY,
                CoreError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Structured detail so the client can point at the offending cart line.
    fn details(&self) -> Value {
        match self {
            AppError::Core(CoreError::UnavailableError {
                line,
                item_id,
                name,
                reason,
            }) => json!({ "line": line, "item_id": item_id, "name": name, "reason": reason }),
            AppError::Core(CoreError::InsufficientStockError {
                line,
                item_id,
                name,
                requested,
                available,
            }) => json!({
                "line": line,
                "item_id": item_id,
                "name": name,
                "requested": requested,
                "available": available,
            }),
            _ => Value::Null,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Internal Server Error: {}", self);
            "Internal Server Error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": {
                "kind": self.kind(),
                "message": message,
                "details": self.details(),
            }
        }));

        (status, body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

/// `Json` whose rejections come back in the API's error shape.
#[derive(axum::extract::FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// `Query` whose rejections come back in the API's error shape.
#[derive(axum::extract::FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);
