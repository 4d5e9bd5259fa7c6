pub mod app_config;
pub mod cancellation_repo;
pub mod catalog_repo;
pub mod database;
pub mod events;
pub mod order_repo;
pub mod policy_repo;
pub mod redis_repo;

pub use cancellation_repo::PgCancellationRepository;
pub use catalog_repo::PgCatalogRepository;
pub use database::DbClient;
pub use events::EventProducer;
pub use order_repo::PgOrderRepository;
pub use policy_repo::PgPolicyRepository;
pub use redis_repo::RedisClient;
