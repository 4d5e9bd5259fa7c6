//! Shared builders for the crate's tests.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use atelier_catalog::{Bundle, InMemoryCatalog, Product};
use atelier_core::{NotificationDispatcher, PaymentMethod};
use atelier_core::notify::RecordingNotifier;
use atelier_policy::{CancellationPolicy, InMemoryPolicyRepository, PolicyStore};

use crate::manager::OrderLifecycle;
use crate::memory::InMemoryOrderStore;
use crate::models::{Order, OrderLine};
use crate::repository::OrderRepository;
use crate::workflow::CancellationWorkflow;

pub fn catalog() -> Arc<InMemoryCatalog> {
    Arc::new(InMemoryCatalog::new())
}

pub fn product(name: &str, price: i64, stock: u32) -> Product {
    Product {
        id: Uuid::new_v4(),
        name: name.to_string(),
        price,
        discount_price: None,
        published: true,
        stock,
    }
}

pub fn bundle(name: &str, price: i64, start: DateTime<Utc>, end: DateTime<Utc>) -> Bundle {
    Bundle {
        id: Uuid::new_v4(),
        name: name.to_string(),
        bundle_price: price,
        product_ids: vec![],
        active: true,
        time_limited: true,
        start_date: Some(start),
        end_date: Some(end),
        stock: None,
    }
}

pub struct Harness {
    pub catalog: Arc<InMemoryCatalog>,
    pub store: Arc<InMemoryOrderStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub policies: Arc<PolicyStore>,
    pub lifecycle: Arc<OrderLifecycle>,
    pub workflow: Arc<CancellationWorkflow>,
}

pub fn harness() -> Harness {
    harness_with(CancellationPolicy::with_defaults(), Arc::new(RecordingNotifier::new()))
}

pub fn harness_with(policy: CancellationPolicy, notifier: Arc<RecordingNotifier>) -> Harness {
    let catalog = catalog();
    let store = Arc::new(InMemoryOrderStore::new());
    let dispatcher = NotificationDispatcher::new(notifier.clone());
    let policies = Arc::new(PolicyStore::new(Arc::new(InMemoryPolicyRepository::with_policy(policy))));
    let lifecycle = Arc::new(OrderLifecycle::new(
        store.clone(),
        store.clone(),
        catalog.clone(),
        dispatcher.clone(),
    ));
    let workflow = Arc::new(CancellationWorkflow::new(
        store.clone(),
        store.clone(),
        policies.clone(),
        lifecycle.clone(),
        dispatcher,
    ));
    Harness {
        catalog,
        store,
        notifier,
        policies,
        lifecycle,
        workflow,
    }
}

/// Stores an order for `owner_id` placed at `placed_at`, bypassing checkout.
pub async fn placed_order(store: &InMemoryOrderStore, owner_id: &str, total: i64, placed_at: DateTime<Utc>) -> Order {
    let items = vec![OrderLine::Product {
        product_id: Uuid::new_v4(),
        name: "Linen Shirt".to_string(),
        quantity: 1,
        unit_price: total,
    }];
    let order = Order::new(owner_id, items, Uuid::new_v4(), PaymentMethod::CashOnDelivery, placed_at).unwrap();
    store.insert_and_clear_cart(&order).await.unwrap();
    order
}
