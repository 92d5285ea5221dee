pub mod in_memory;
pub mod kafka_bus;
pub mod loggers;
pub mod postgres_repository;

pub use in_memory::*;
pub use kafka_bus::*;
pub use loggers::*;
pub use postgres_repository::*;
