pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod events;
pub mod memory;
pub mod memory_repo;
pub mod redis_repo;

pub use booking_repo::{PgBookingRepository, PgCatalogRepository};
pub use database::DbClient;
pub use events::EventProducer;
pub use memory::MemoryLeaseStore;
pub use memory_repo::{InMemoryBookingRepository, InMemoryCatalog};
pub use redis_repo::{RedisBroadcaster, RedisLeaseStore};
