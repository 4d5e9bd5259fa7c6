use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use atelier_core::{CoreError, CoreResult, OrderStatus};

/// Why the buyer wants to cancel. Closed set; free text goes in the request's details.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancellationReason {
    ChangedMind,
    FoundBetterPrice,
    OrderedWrongItem,
    DeliveryDelay,
    ExpectedDefect,
    FinancialConstraint,
    DuplicateOrder,
    Other,
}

impl CancellationReason {
    pub const ALL: [CancellationReason; 8] = [
        CancellationReason::ChangedMind,
        CancellationReason::FoundBetterPrice,
        CancellationReason::OrderedWrongItem,
        CancellationReason::DeliveryDelay,
        CancellationReason::ExpectedDefect,
        CancellationReason::FinancialConstraint,
        CancellationReason::DuplicateOrder,
        CancellationReason::Other,
    ];
}

/// Refund tier for requests made within `time_frame_hours` of placement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeRule {
    pub time_frame_hours: u32,
    pub refund_percentage: u8,
}

/// Cancellability and refund tier keyed on the order's fulfillment status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusRule {
    pub order_status: OrderStatus,
    pub can_cancel: bool,
    pub refund_percentage: u8,
}

/// The single active cancellation policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CancellationPolicy {
    pub id: Uuid,
    pub is_active: bool,
    /// Bumped by the store on every update.
    pub version: i64,
    /// Used when no time or status rule applies.
    pub refund_percentage: u8,
    pub response_time_hours: u32,
    pub allowed_reasons: Vec<CancellationReason>,
    /// Kept sorted by `time_frame_hours`, ascending.
    pub time_based_rules: Vec<TimeRule>,
    pub status_based_rules: Vec<StatusRule>,
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CancellationPolicy {
    /// Policy materialized the first time anyone asks for one.
    pub fn with_defaults() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            is_active: true,
            version: 1,
            refund_percentage: 25,
            response_time_hours: 48,
            allowed_reasons: CancellationReason::ALL.to_vec(),
            time_based_rules: vec![
                TimeRule { time_frame_hours: 1, refund_percentage: 100 },
                TimeRule { time_frame_hours: 24, refund_percentage: 80 },
                TimeRule { time_frame_hours: 72, refund_percentage: 50 },
            ],
            status_based_rules: vec![
                StatusRule {
                    order_status: OrderStatus::Processing,
                    can_cancel: true,
                    refund_percentage: 50,
                },
                StatusRule {
                    order_status: OrderStatus::OutForDelivery,
                    can_cancel: false,
                    refund_percentage: 0,
                },
                StatusRule {
                    order_status: OrderStatus::Delivered,
                    can_cancel: false,
                    refund_percentage: 0,
                },
                StatusRule {
                    order_status: OrderStatus::Cancelled,
                    can_cancel: false,
                    refund_percentage: 0,
                },
            ],
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn allows_reason(&self, reason: CancellationReason) -> bool {
        self.allowed_reasons.contains(&reason)
    }

    pub fn status_rule(&self, status: OrderStatus) -> Option<&StatusRule> {
        self.status_based_rules.iter().find(|r| r.order_status == status)
    }

    pub fn validate(&self) -> CoreResult<()> {
        ensure_percentage("refund_percentage", self.refund_percentage)?;
        if self.response_time_hours == 0 {
            return Err(CoreError::ValidationError(
                "response_time_hours must be positive".to_string(),
            ));
        }
        if self.allowed_reasons.is_empty() {
            return Err(CoreError::ValidationError(
                "allowed_reasons must not be empty".to_string(),
            ));
        }

        let mut frames = HashSet::new();
        for rule in &self.time_based_rules {
            if rule.time_frame_hours == 0 {
                return Err(CoreError::ValidationError(
                    "time_frame_hours must be positive".to_string(),
                ));
            }
            if !frames.insert(rule.time_frame_hours) {
                return Err(CoreError::ValidationError(format!(
                    "duplicate time rule for {} hours",
                    rule.time_frame_hours
                )));
            }
            ensure_percentage("time rule refund_percentage", rule.refund_percentage)?;
        }

        let mut statuses = HashSet::new();
        for rule in &self.status_based_rules {
            if !statuses.insert(rule.order_status) {
                return Err(CoreError::ValidationError(format!(
                    "duplicate status rule for {}",
                    rule.order_status
                )));
            }
            ensure_percentage("status rule refund_percentage", rule.refund_percentage)?;
        }
        Ok(())
    }

    /// Applies a partial update in place. Nothing changes if validation fails.
    pub fn apply(&mut self, update: PolicyUpdate, admin_id: &str) -> CoreResult<()> {
        let mut next = self.clone();
        if let Some(pct) = update.refund_percentage {
            next.refund_percentage = pct;
        }
        if let Some(hours) = update.response_time_hours {
            next.response_time_hours = hours;
        }
        if let Some(mut reasons) = update.allowed_reasons {
            let mut seen = HashSet::new();
            reasons.retain(|r| seen.insert(*r));
            next.allowed_reasons = reasons;
        }
        if let Some(mut rules) = update.time_based_rules {
            rules.sort_by_key(|r| r.time_frame_hours);
            next.time_based_rules = rules;
        }
        if let Some(rules) = update.status_based_rules {
            next.status_based_rules = rules;
        }
        next.validate()?;

        next.updated_by = Some(admin_id.to_string());
        next.updated_at = Utc::now();
        *self = next;
        Ok(())
    }
}

fn ensure_percentage(field: &str, value: u8) -> CoreResult<()> {
    if value > 100 {
        return Err(CoreError::ValidationError(format!(
            "{} must be between 0 and 100, got {}",
            field, value
        )));
    }
    Ok(())
}

/// Admin-supplied partial update. Absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyUpdate {
    pub refund_percentage: Option<u8>,
    pub response_time_hours: Option<u32>,
    pub allowed_reasons: Option<Vec<CancellationReason>>,
    pub time_based_rules: Option<Vec<TimeRule>>,
    pub status_based_rules: Option<Vec<StatusRule>>,
}
