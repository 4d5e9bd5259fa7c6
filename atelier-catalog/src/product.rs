use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog product as seen by checkout. Amounts are in minor currency units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price: i64,
    pub discount_price: Option<i64>,
    pub published: bool,
    pub stock: u32,
}

impl Product {
    /// Price charged right now; a discount only applies when it is actually lower.
    pub fn effective_price(&self) -> i64 {
        match self.discount_price {
            Some(discounted) if discounted >= 0 && discounted < self.price => discounted,
            _ => self.price,
        }
    }
}

/// A merchandised group of products sold as one unit at a fixed price.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bundle {
    pub id: Uuid,
    pub name: String,
    pub bundle_price: i64,
    pub product_ids: Vec<Uuid>,
    pub active: bool,
    pub time_limited: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub stock: Option<u32>,
}

impl Bundle {
    /// `[start_date, end_date]`, both ends inclusive. A missing bound is open.
    pub fn within_window(&self, now: DateTime<Utc>) -> bool {
        if !self.time_limited {
            return true;
        }
        let started = self.start_date.map_or(true, |start| now >= start);
        let not_ended = self.end_date.map_or(true, |end| now <= end);
        started && not_ended
    }
}
