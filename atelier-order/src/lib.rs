pub mod cancellation;
pub mod gate;
pub mod manager;
pub mod memory;
pub mod models;
pub mod repository;
pub mod workflow;

#[cfg(test)]
mod fixtures;

pub use cancellation::{
    AdminResponse, CancellationRequest, CancellationStatus, CancellationView, Decision,
    RefundDetails, RefundStatus,
};
pub use gate::{CartValidationGate, ValidatedLine};
pub use manager::{OrderLifecycle, PlaceOrder, StatusActor};
pub use memory::InMemoryOrderStore;
pub use models::{Order, OrderLine, OrderSummary};
pub use repository::{CancellationRepository, CartRepository, OrderRepository};
pub use workflow::{Adjudication, CancellationWorkflow, SubmissionReceipt, SubmitCancellation};
