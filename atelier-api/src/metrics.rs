use axum::{extract::State, http::header, response::IntoResponse, Json};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use serde_json::json;

use crate::error::AppError;
use crate::state::AppState;

/// Business counters scraped from `/metrics`. Each instance owns its registry.
pub struct Metrics {
    registry: Registry,
    pub orders_created: IntCounter,
    pub checkout_rejections: IntCounterVec,
    pub cancellation_requests: IntCounter,
    pub adjudications: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_created = IntCounter::new("atelier_orders_created_total", "Orders created at checkout")?;
        registry.register(Box::new(orders_created.clone()))?;

        let checkout_rejections = IntCounterVec::new(
            Opts::new("atelier_checkout_rejections_total", "Checkouts rejected, by error kind"),
            &["kind"],
        )?;
        registry.register(Box::new(checkout_rejections.clone()))?;

        let cancellation_requests = IntCounter::new(
            "atelier_cancellation_requests_total",
            "Cancellation requests submitted",
        )?;
        registry.register(Box::new(cancellation_requests.clone()))?;

        let adjudications = IntCounterVec::new(
            Opts::new("atelier_cancellation_adjudications_total", "Cancellation requests resolved, by decision"),
            &["decision"],
        )?;
        registry.register(Box::new(adjudications.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            checkout_rejections,
            cancellation_requests,
            adjudications,
        })
    }

    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state.metrics.render()?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}

/// GET /health
pub async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "atelier-api"
    }))
}
