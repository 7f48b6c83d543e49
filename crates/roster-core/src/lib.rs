//! Core types, store traits and the enrollment-timeline engine for Roster.
//!
//! This crate has no HTTP or database dependencies. The
//! engine talks to persistence only through the capability traits in
//! [`store`]; every engine call takes the caller's transactional scope as an
//! explicit argument and never opens or commits a transaction itself.

pub mod audit;
pub mod batch;
pub mod engine;
pub mod entry;
pub mod error;
pub mod event;
pub mod order;
pub mod package;
pub mod service;
pub mod store;
pub mod time;

pub use engine::Engine;
pub use error::{AsErrorKind, Error, ErrorKind, Result};
