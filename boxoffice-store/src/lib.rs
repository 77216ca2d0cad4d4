pub mod app_config;
pub mod database;
pub mod memory_repo;
pub mod redis_repo;
pub mod ticket_repo;

pub use database::DbClient;
pub use memory_repo::InMemoryTicketStore;
pub use redis_repo::RedisClient;
pub use ticket_repo::PostgresTicketStore;
