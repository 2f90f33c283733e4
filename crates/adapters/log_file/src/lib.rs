//! # domisafe-adapter-log-file
//!
//! Local log store: one append-only text file per category and UTC day.
//!
//! ## Responsibilities
//! - Implement the `RecordLog` port defined in `domisafe-app::ports`
//! - Keep exactly one open partition per category, rotating at UTC midnight
//!   of each record's own timestamp (`YYYYMMDD_<category>.txt`)
//! - Buffer writes and flush them on a fixed interval
//!
//! ## Dependency rule
//! Depends on `domisafe-app` (for port traits) and `domisafe-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod error;
pub mod flusher;
pub mod store;

pub use error::LogStoreError;
pub use flusher::spawn_flusher;
pub use store::DailyLogStore;
