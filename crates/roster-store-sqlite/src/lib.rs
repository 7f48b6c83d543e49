//! SQLite backend for the Roster enrollment timeline.
//!
//! [`SqliteBackend`] implements the engine's store traits on a plain
//! [`rusqlite::Connection`]. [`SqliteStore`] wraps [`tokio_rusqlite`] so all
//! database access runs on a dedicated thread without blocking the async
//! runtime, and runs every engine call inside one SQLite transaction.

mod backend;
mod encode;
mod schema;
mod store;

pub mod error;

pub use backend::SqliteBackend;
pub use error::{Error, Result};
pub use schema::SCHEMA;
pub use store::SqliteStore;

#[cfg(test)]
mod proptests;
