use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use atelier_core::{CoreError, CoreResult};
use atelier_policy::{CancellationReason, RuleSource};

use crate::models::OrderSummary;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancellationStatus {
    Pending,
    Approved,
    Rejected,
    Processed,
}

impl CancellationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancellationStatus::Pending => "PENDING",
            CancellationStatus::Approved => "APPROVED",
            CancellationStatus::Rejected => "REJECTED",
            CancellationStatus::Processed => "PROCESSED",
        }
    }

    /// At most one request per order may be in an active status.
    pub fn is_active(&self) -> bool {
        matches!(self, CancellationStatus::Pending | CancellationStatus::Approved)
    }

    pub fn can_transition_to(&self, next: CancellationStatus) -> bool {
        use CancellationStatus::*;
        matches!(
            (self, next),
            (Pending, Approved) | (Pending, Rejected) | (Approved, Processed)
        )
    }
}

impl fmt::Display for CancellationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CancellationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(CancellationStatus::Pending),
            "APPROVED" => Ok(CancellationStatus::Approved),
            "REJECTED" => Ok(CancellationStatus::Rejected),
            "PROCESSED" => Ok(CancellationStatus::Processed),
            other => Err(CoreError::ValidationError(format!(
                "unknown cancellation status: {}",
                other
            ))),
        }
    }
}

/// Admin verdict on a pending request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn status(&self) -> CancellationStatus {
        match self {
            Decision::Approved => CancellationStatus::Approved,
            Decision::Rejected => CancellationStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdminResponse {
    pub admin_id: String,
    pub decided_at: DateTime<Utc>,
    pub comment: Option<String>,
    pub refund_amt: i64,
    pub refund_percentage: u8,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundStatus {
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefundDetails {
    pub refund_status: RefundStatus,
    pub refund_amt: i64,
    pub failure_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// A buyer's request to cancel an order. Never deleted, only advanced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CancellationRequest {
    pub id: Uuid,
    pub order_id: Uuid,
    pub owner_id: String,
    pub reason: CancellationReason,
    pub details: Option<String>,
    pub status: CancellationStatus,
    /// Percentage resolved from the policy when the buyer submitted.
    pub proposed_refund_percentage: u8,
    pub rule_source: RuleSource,
    pub expected_refund_amt: i64,
    pub admin_response: Option<AdminResponse>,
    pub refund_details: Option<RefundDetails>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CancellationRequest {
    /// Copy of this request moved to `next`. Fails on edges outside the table.
    pub fn advanced(&self, next: CancellationStatus, now: DateTime<Utc>) -> CoreResult<Self> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::StateError(format!(
                "cancellation request {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        let mut advanced = self.clone();
        advanced.status = next;
        advanced.updated_at = now;
        Ok(advanced)
    }
}

/// A request as listed to its owner, with the order it refers to.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CancellationView {
    #[serde(flatten)]
    pub request: CancellationRequest,
    pub order: Option<OrderSummary>,
}
