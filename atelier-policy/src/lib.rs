pub mod memory;
pub mod models;
pub mod rules;
pub mod store;

pub use memory::InMemoryPolicyRepository;
pub use models::{CancellationPolicy, CancellationReason, PolicyUpdate, StatusRule, TimeRule};
pub use rules::{refund_amount, resolve_refund, RefundResolution, RuleSource};
pub use store::{PolicyRepository, PolicyStore};
