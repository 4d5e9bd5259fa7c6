use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use atelier_core::{CoreError, CoreResult, OrderStatus};
use crate::models::CancellationPolicy;

/// Which part of the policy produced a refund percentage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleSource {
    StatusRule,
    TimeRule,
    Default,
}

impl RuleSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleSource::StatusRule => "STATUS_RULE",
            RuleSource::TimeRule => "TIME_RULE",
            RuleSource::Default => "DEFAULT",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefundResolution {
    pub refund_percentage: u8,
    pub source: RuleSource,
}

/// Resolves the refund percentage for cancelling an order in `status`, placed at
/// `placed_at`, as of `now`.
///
/// Precedence: a status rule with `can_cancel = false` forbids cancellation; otherwise a
/// status rule beats a time rule, and the policy default applies when neither matches.
/// Time rules form an ascending ladder and the smallest window still containing the
/// elapsed time wins, upper bound inclusive.
///
/// Pure: the same inputs always give the same answer.
pub fn resolve_refund(
    policy: &CancellationPolicy,
    status: OrderStatus,
    placed_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> CoreResult<RefundResolution> {
    if status.is_terminal() {
        return Err(CoreError::StateError(format!(
            "order is already {} and cannot be cancelled",
            status
        )));
    }

    let status_candidate = match policy.status_rule(status) {
        Some(rule) if !rule.can_cancel => {
            return Err(CoreError::StateError(format!(
                "orders in {} cannot be cancelled",
                status
            )));
        }
        Some(rule) => Some(rule.refund_percentage),
        None => None,
    };

    let elapsed = (now - placed_at).max(TimeDelta::zero());
    let time_candidate = policy
        .time_based_rules
        .iter()
        .filter(|rule| elapsed <= TimeDelta::hours(rule.time_frame_hours as i64))
        .min_by_key(|rule| rule.time_frame_hours)
        .map(|rule| rule.refund_percentage);

    let resolution = match (status_candidate, time_candidate) {
        (Some(pct), _) => RefundResolution {
            refund_percentage: pct,
            source: RuleSource::StatusRule,
        },
        (None, Some(pct)) => RefundResolution {
            refund_percentage: pct,
            source: RuleSource::TimeRule,
        },
        (None, None) => RefundResolution {
            refund_percentage: policy.refund_percentage,
            source: RuleSource::Default,
        },
    };
    Ok(resolution)
}

/// `total_amt × pct / 100`, rounded down, never outside `[0, total_amt]`.
pub fn refund_amount(total_amt: i64, refund_percentage: u8) -> i64 {
    let total = total_amt.max(0) as i128;
    let pct = refund_percentage.min(100) as i128;
    (total * pct / 100) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StatusRule, TimeRule};
    use chrono::Duration;

    fn ladder_policy() -> CancellationPolicy {
        let mut policy = CancellationPolicy::with_defaults();
        policy.refund_percentage = 5;
        policy.time_based_rules = vec![
            TimeRule { time_frame_hours: 1, refund_percentage: 10 },
            TimeRule { time_frame_hours: 24, refund_percentage: 8 },
        ];
        policy.status_based_rules = vec![];
        policy
    }

    #[test]
    fn test_time_rule_applies_within_first_hour() {
        let now = Utc::now();
        let placed = now - Duration::minutes(30);
        let resolved = resolve_refund(&ladder_policy(), OrderStatus::OrderPlaced, placed, now).unwrap();
        assert_eq!(resolved.refund_percentage, 10);
        assert_eq!(resolved.source, RuleSource::TimeRule);
    }

    #[test]
    fn test_status_rule_beats_time_rule() {
        let now = Utc::now();
        let placed = now - Duration::minutes(30);
        let mut policy = ladder_policy();
        policy.status_based_rules.push(StatusRule {
            order_status: OrderStatus::OrderPlaced,
            can_cancel: true,
            refund_percentage: 7,
        });

        let resolved = resolve_refund(&policy, OrderStatus::OrderPlaced, placed, now).unwrap();
        assert_eq!(resolved.refund_percentage, 7);
        assert_eq!(resolved.source, RuleSource::StatusRule);
    }

    #[test]
    fn test_status_rule_can_forbid_cancellation() {
        let now = Utc::now();
        let mut policy = ladder_policy();
        policy.status_based_rules.push(StatusRule {
            order_status: OrderStatus::OutForDelivery,
            can_cancel: false,
            refund_percentage: 0,
        });

        let result = resolve_refund(&policy, OrderStatus::OutForDelivery, now, now);
        assert!(matches!(result, Err(CoreError::StateError(_))));
    }

    #[test]
    fn test_boundary_selects_that_tier() {
        let now = Utc::now();
        let policy = ladder_policy();

        let exactly_one_hour = resolve_refund(&policy, OrderStatus::OrderPlaced, now - Duration::hours(1), now).unwrap();
        assert_eq!(exactly_one_hour.refund_percentage, 10);

        let just_past = resolve_refund(
            &policy,
            OrderStatus::OrderPlaced,
            now - Duration::hours(1) - Duration::nanoseconds(1),
            now,
        )
        .unwrap();
        assert_eq!(just_past.refund_percentage, 8);
    }

    #[test]
    fn test_falls_back_to_default_past_every_window() {
        let now = Utc::now();
        let resolved = resolve_refund(&ladder_policy(), OrderStatus::Processing, now - Duration::days(3), now).unwrap();
        assert_eq!(resolved.refund_percentage, 5);
        assert_eq!(resolved.source, RuleSource::Default);
    }

    #[test]
    fn test_ladder_order_in_storage_does_not_matter() {
        let now = Utc::now();
        let mut policy = ladder_policy();
        policy.time_based_rules.reverse();
        let resolved = resolve_refund(&policy, OrderStatus::OrderPlaced, now - Duration::minutes(5), now).unwrap();
        assert_eq!(resolved.refund_percentage, 10);
    }

    #[test]
    fn test_terminal_orders_never_resolve() {
        let now = Utc::now();
        let policy = ladder_policy();
        for status in [OrderStatus::Delivered, OrderStatus::Cancelled] {
            assert!(resolve_refund(&policy, status, now, now).is_err());
        }
    }

    #[test]
    fn test_resolution_is_repeatable() {
        let now = Utc::now();
        let placed = now - Duration::hours(5);
        let policy = CancellationPolicy::with_defaults();
        let first = resolve_refund(&policy, OrderStatus::OrderPlaced, placed, now).unwrap();
        let second = resolve_refund(&policy, OrderStatus::OrderPlaced, placed, now).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_refund_amount_stays_within_total() {
        for total in [0_i64, 1, 99, 4999, 1_000_000, i64::MAX] {
            for pct in [0_u8, 1, 7, 15, 50, 99, 100, 255] {
                let amount = refund_amount(total, pct);
                assert!(amount >= 0 && amount <= total, "{} {} -> {}", total, pct, amount);
            }
        }
        assert_eq!(refund_amount(10_000, 15), 1_500);
        assert_eq!(refund_amount(999, 10), 99);
        assert_eq!(refund_amount(-50, 50), 0);
    }
}
