use std::sync::Arc;

use atelier_catalog::{CatalogRepository, InMemoryCatalog};
use atelier_core::NotificationDispatcher;
use atelier_order::{
    CancellationRepository, CancellationWorkflow, CartRepository, InMemoryOrderStore,
    OrderLifecycle, OrderRepository,
};
use atelier_policy::{InMemoryPolicyRepository, PolicyRepository, PolicyStore};
use atelier_store::RedisClient;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct RateLimitConfig {
    pub redis: Arc<RedisClient>,
    pub requests_per_window: i64,
    pub window_seconds: i64,
}

/// Storage the services run on: PostgreSQL in production, memory otherwise.
pub struct Backends {
    pub orders: Arc<dyn OrderRepository>,
    pub carts: Arc<dyn CartRepository>,
    pub cancellations: Arc<dyn CancellationRepository>,
    pub catalog: Arc<dyn CatalogRepository>,
    pub policies: Arc<dyn PolicyRepository>,
}

impl Backends {
    pub fn in_memory(catalog: Arc<InMemoryCatalog>) -> Self {
        let store = Arc::new(InMemoryOrderStore::new());
        Self {
            orders: store.clone(),
            carts: store.clone(),
            cancellations: store,
            catalog,
            policies: Arc::new(InMemoryPolicyRepository::new()),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderLifecycle>,
    pub cancellations: Arc<CancellationWorkflow>,
    pub policies: Arc<PolicyStore>,
    pub metrics: Arc<Metrics>,
    pub auth: AuthConfig,
    pub rate_limit: Option<RateLimitConfig>,
}

impl AppState {
    pub fn new(
        backends: Backends,
        notifier: NotificationDispatcher,
        auth: AuthConfig,
        rate_limit: Option<RateLimitConfig>,
    ) -> anyhow::Result<Self> {
        let policies = Arc::new(PolicyStore::new(backends.policies));
        let orders = Arc::new(OrderLifecycle::new(
            backends.orders.clone(),
            backends.carts,
            backends.catalog,
            notifier.clone(),
        ));
        let cancellations = Arc::new(CancellationWorkflow::new(
            backends.orders,
            backends.cancellations,
            policies.clone(),
            orders.clone(),
            notifier,
        ));

        Ok(Self {
            orders,
            cancellations,
            policies,
            metrics: Arc::new(Metrics::new()?),
            auth,
            rate_limit,
        })
    }
}
