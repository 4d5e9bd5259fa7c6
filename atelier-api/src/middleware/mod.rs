pub mod auth;
pub mod rate_limit;

pub use auth::{admin_auth_middleware, customer_auth_middleware, AccountClaims};
pub use rate_limit::rate_limit_middleware;
