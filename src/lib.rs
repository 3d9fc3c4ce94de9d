//! Tally - todo list client with a normalized, optimistic cache
//!
//! Todos fetched from a REST service are kept in a key-addressed cache:
//! the ordered id list and each record live under separate keys, so a
//! record changes in exactly one place. Updates show up in the cache before
//! the server confirms them and are rolled back if it refuses. A small
//! file-backed counter store rides along.

pub mod cache;
pub mod cli;
pub mod client;
pub mod config;
pub mod counter;
pub mod error;
pub mod service;
pub mod todo;
pub mod ui;

pub use error::{TallyError, TallyResult};
