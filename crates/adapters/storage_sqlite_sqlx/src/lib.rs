//! # domisafe-adapter-storage-sqlite-sqlx
//!
//! `SQLite` durability fallback store using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the `FallbackStore` port defined in `domisafe-app::ports`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between publish records and database rows
//!
//! ## Dependency rule
//! Depends on `domisafe-app` (for port traits) and `domisafe-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod error;
pub mod fallback_store;
pub mod pool;

pub use fallback_store::SqliteFallbackStore;
