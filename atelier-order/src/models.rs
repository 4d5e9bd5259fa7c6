use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use atelier_catalog::ItemRef;
use atelier_core::{CoreError, CoreResult, OrderStatus, PaymentMethod, PaymentStatus};

/// A purchased line with its price frozen at order time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "item_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderLine {
    Product {
        product_id: Uuid,
        name: String,
        quantity: u32,
        unit_price: i64,
    },
    Bundle {
        bundle_id: Uuid,
        name: String,
        quantity: u32,
        bundle_price: i64,
    },
}

impl OrderLine {
    pub fn item(&self) -> ItemRef {
        match self {
            OrderLine::Product { product_id, .. } => ItemRef::Product {
                product_id: *product_id,
            },
            OrderLine::Bundle { bundle_id, .. } => ItemRef::Bundle {
                bundle_id: *bundle_id,
            },
        }
    }

    pub fn quantity(&self) -> u32 {
        match self {
            OrderLine::Product { quantity, .. } | OrderLine::Bundle { quantity, .. } => *quantity,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            OrderLine::Product { name, .. } | OrderLine::Bundle { name, .. } => name,
        }
    }

    /// Price times quantity. Fails when the amount does not fit in minor units.
    pub fn line_total(&self) -> CoreResult<i64> {
        let price = match self {
            OrderLine::Product { unit_price, .. } => *unit_price,
            OrderLine::Bundle { bundle_price, .. } => *bundle_price,
        };
        price
            .checked_mul(i64::from(self.quantity()))
            .ok_or_else(|| out_of_range(format!("total for {}", self.name())))
    }
}

fn out_of_range(what: String) -> CoreError {
    CoreError::ValidationError(format!("{} is too large", what))
}

/// A buyer's purchase. Amounts are in minor currency units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Uuid,
    /// User-facing identifier, distinct from `id`.
    pub order_number: String,
    pub owner_id: String,
    pub items: Vec<OrderLine>,
    pub total_qty: u32,
    pub sub_total_amt: i64,
    pub total_amt: i64,
    pub delivery_address_id: Uuid,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub order_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        owner_id: impl Into<String>,
        items: Vec<OrderLine>,
        delivery_address_id: Uuid,
        payment_method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> CoreResult<Self> {
        let mut total_qty: u32 = 0;
        let mut sub_total_amt: i64 = 0;
        for item in &items {
            total_qty = total_qty
                .checked_add(item.quantity())
                .ok_or_else(|| out_of_range("order quantity".to_string()))?;
            sub_total_amt = sub_total_amt
                .checked_add(item.line_total()?)
                .ok_or_else(|| out_of_range("order total".to_string()))?;
        }
        Ok(Self {
            id: Uuid::new_v4(),
            order_number: generate_order_number(now),
            owner_id: owner_id.into(),
            items,
            total_qty,
            sub_total_amt,
            // Delivery fees are settled outside checkout.
            total_amt: sub_total_amt,
            delivery_address_id,
            payment_method,
            payment_status: PaymentStatus::Pending,
            order_status: OrderStatus::OrderPlaced,
            order_date: now,
            updated_at: now,
        })
    }

    pub fn summary(&self) -> OrderSummary {
        OrderSummary {
            id: self.id,
            order_number: self.order_number.clone(),
            order_status: self.order_status,
            total_amt: self.total_amt,
            order_date: self.order_date,
        }
    }
}

/// What cancellation listings show about the order a request refers to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderSummary {
    pub id: Uuid,
    pub order_number: String,
    pub order_status: OrderStatus,
    pub total_amt: i64,
    pub order_date: DateTime<Utc>,
}

/// `ATL-<yyyymmdd>-<8 alphanumerics>`
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect();
    format!("ATL-{}-{}", now.format("%Y%m%d"), suffix)
}
