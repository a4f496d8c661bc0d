//! PostgreSQL persistence adapter built on Diesel.

mod account_persistence_error_mapping;
mod diesel_account_repository;
mod models;
mod pool;
pub mod schema;

pub use diesel_account_repository::DieselAccountRepository;
pub use pool::{DbPool, PoolConfig, PoolError};
