use serde::{Deserialize, Serialize};
use uuid::Uuid;

use atelier_core::CoreError;

/// What a cart or order line points at: exactly one of a product or a bundle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "item_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemRef {
    Product { product_id: Uuid },
    Bundle { bundle_id: Uuid },
}

impl ItemRef {
    pub fn id(&self) -> Uuid {
        match self {
            ItemRef::Product { product_id } => *product_id,
            ItemRef::Bundle { bundle_id } => *bundle_id,
        }
    }
}

/// A line the buyer wants to purchase. Quantity is checked against live catalog state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartLine {
    #[serde(flatten)]
    pub item: ItemRef,
    pub quantity: u32,
}

impl CartLine {
    pub fn product(product_id: Uuid, quantity: u32) -> Self {
        Self {
            item: ItemRef::Product { product_id },
            quantity,
        }
    }

    pub fn bundle(bundle_id: Uuid, quantity: u32) -> Self {
        Self {
            item: ItemRef::Bundle { bundle_id },
            quantity,
        }
    }
}

/// Wire shape accepted from clients, where either id may be present.
#[derive(Debug, Clone, Deserialize)]
pub struct CartLineInput {
    pub product_id: Option<Uuid>,
    pub bundle_id: Option<Uuid>,
    pub quantity: u32,
}

impl TryFrom<CartLineInput> for CartLine {
    type Error = CoreError;

    fn try_from(input: CartLineInput) -> Result<Self, Self::Error> {
        if input.quantity == 0 {
            return Err(CoreError::ValidationError(
                "quantity must be at least 1".to_string(),
            ));
        }
        let item = match (input.product_id, input.bundle_id) {
            (Some(product_id), None) => ItemRef::Product { product_id },
            (None, Some(bundle_id)) => ItemRef::Bundle { bundle_id },
            (Some(_), Some(_)) => {
                return Err(CoreError::ValidationError(
                    "a line must reference a product or a bundle, not both".to_string(),
                ))
            }
            (None, None) => {
                return Err(CoreError::ValidationError(
                    "a line must reference a product or a bundle".to_string(),
                ))
            }
        };
        Ok(CartLine {
            item,
            quantity: input.quantity,
        })
    }
}
