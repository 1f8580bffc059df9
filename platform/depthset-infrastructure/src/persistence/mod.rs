pub mod memory;
pub mod postgres_store;
pub mod wire;
