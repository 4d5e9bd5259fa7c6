pub mod models;

pub use models::events::{BuyerNotification, NotificationKind};
