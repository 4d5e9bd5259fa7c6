use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What happened, from the buyer's point of view. Rendering is the dispatcher's job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    OrderPlaced {
        order_number: String,
        total_amt: i64,
        total_qty: u32,
    },
    OrderStatusChanged {
        order_number: String,
        from: String,
        to: String,
    },
    CancellationRequested {
        order_number: String,
        request_id: Uuid,
        expected_refund_amt: i64,
        refund_percentage: u8,
        response_time_hours: u32,
    },
    CancellationApproved {
        order_number: String,
        request_id: Uuid,
        refund_amt: i64,
        refund_percentage: u8,
        comment: Option<String>,
    },
    CancellationRejected {
        order_number: String,
        request_id: Uuid,
        comment: Option<String>,
    },
}

/// A fire-and-forget instruction for the notification sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyerNotification {
    pub id: Uuid,
    pub account_id: String,
    pub order_id: Uuid,
    #[serde(flatten)]
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
}

impl BuyerNotification {
    pub fn new(account_id: impl Into<String>, order_id: Uuid, kind: NotificationKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id: account_id.into(),
            order_id,
            kind,
            created_at: Utc::now(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            NotificationKind::OrderPlaced { .. } => "ORDER_PLACED",
            NotificationKind::OrderStatusChanged { .. } => "ORDER_STATUS_CHANGED",
            NotificationKind::CancellationRequested { .. } => "CANCELLATION_REQUESTED",
            NotificationKind::CancellationApproved { .. } => "CANCELLATION_APPROVED",
            NotificationKind::CancellationRejected { .. } => "CANCELLATION_REJECTED",
        }
    }
}
