use axum::{
    http::Method,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod cancellations;
pub mod cart;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod orders;
pub mod policy;
pub mod state;

pub use state::AppState;

use crate::middleware::{admin_auth_middleware, customer_auth_middleware, rate_limit_middleware};

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let public = Router::new()
        .route("/health", get(metrics::health_handler))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/v1/cancellation-policy", get(policy::get_policy));

    let customer = Router::new()
        .route("/v1/orders", post(orders::create_order).get(orders::list_orders))
        .route("/v1/orders/{id}", get(orders::get_order))
        .route("/v1/orders/{id}/cancellation", post(cancellations::submit_cancellation))
        .route("/v1/cancellations", get(cancellations::list_own_cancellations))
        .route("/v1/cart", get(cart::get_cart).post(cart::add_to_cart))
        .route_layer(from_fn_with_state(state.clone(), customer_auth_middleware));

    let admin = Router::new()
        .route("/v1/admin/orders", get(orders::list_all_orders))
        .route("/v1/admin/orders/{id}/status", post(orders::advance_order_status))
        .route("/v1/admin/cancellations", get(cancellations::list_cancellations))
        .route(
            "/v1/admin/cancellations/{id}/decision",
            post(cancellations::adjudicate_cancellation),
        )
        .route(
            "/v1/admin/cancellations/{id}/refund-complete",
            post(cancellations::complete_refund),
        )
        .route("/v1/admin/cancellation-policy", put(policy::update_policy))
        .route_layer(from_fn_with_state(state.clone(), admin_auth_middleware));

    Router::new()
        .merge(public)
        .merge(customer)
        .merge(admin)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .with_state(state)
}
