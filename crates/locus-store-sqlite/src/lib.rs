//! SQLite backend for the Locus reconciliation store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. Every mutating operation
//! executes inside a single IMMEDIATE transaction: it fully applies or
//! leaves no trace.

mod encode;
mod ops;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
