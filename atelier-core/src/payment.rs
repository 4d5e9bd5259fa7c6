use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::status::OrderStatus;
use crate::CoreError;

/// Only cash on delivery is offered at checkout.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    #[serde(alias = "Cash on Delivery", alias = "COD")]
    CashOnDelivery,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "CASH_ON_DELIVERY",
        }
    }

    /// Human-readable label shown on invoices and order pages.
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "Cash on Delivery",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CASH_ON_DELIVERY" | "Cash on Delivery" | "COD" => Ok(PaymentMethod::CashOnDelivery),
            other => Err(CoreError::ValidationError(format!(
                "unsupported payment method: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    /// Cash was never collected and never will be.
    Voided,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Voided => "VOIDED",
            PaymentStatus::Cancelled => "CANCELLED",
        }
    }

    /// Payment status implied by an order reaching `target`.
    pub fn after_order_transition(self, method: PaymentMethod, target: OrderStatus) -> PaymentStatus {
        match (target, method, self) {
            (OrderStatus::Cancelled, PaymentMethod::CashOnDelivery, PaymentStatus::Pending) => {
                PaymentStatus::Voided
            }
            (OrderStatus::Cancelled, _, _) => PaymentStatus::Cancelled,
            (OrderStatus::Delivered, PaymentMethod::CashOnDelivery, _) => PaymentStatus::Paid,
            _ => self,
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "PAID" => Ok(PaymentStatus::Paid),
            "VOIDED" => Ok(PaymentStatus::Voided),
            "CANCELLED" => Ok(PaymentStatus::Cancelled),
            other => Err(CoreError::ValidationError(format!(
                "unknown payment status: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cod_cancelled_before_collection_is_voided() {
        let status = PaymentStatus::Pending
            .after_order_transition(PaymentMethod::CashOnDelivery, OrderStatus::Cancelled);
        assert_eq!(status, PaymentStatus::Voided);
    }

    #[test]
    fn test_cod_delivery_settles_payment() {
        let status = PaymentStatus::Pending
            .after_order_transition(PaymentMethod::CashOnDelivery, OrderStatus::Delivered);
        assert_eq!(status, PaymentStatus::Paid);
    }

    #[test]
    fn test_intermediate_transitions_leave_payment_alone() {
        for target in [OrderStatus::Processing, OrderStatus::OutForDelivery] {
            let status = PaymentStatus::Pending
                .after_order_transition(PaymentMethod::CashOnDelivery, target);
            assert_eq!(status, PaymentStatus::Pending);
        }
    }

    #[test]
    fn test_label_parsing() {
        assert_eq!(
            "Cash on Delivery".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::CashOnDelivery
        );
        let method: PaymentMethod = serde_json::from_str("\"COD\"").unwrap();
        assert_eq!(method, PaymentMethod::CashOnDelivery);
        assert!("CARD".parse::<PaymentMethod>().is_err());
    }
}
