//! Acquisition engine.
//!
//! [`Engine`] ties the adapters, the store and the exporters together. It
//! decides whether a book needs fetching, fetches only what is new, retries
//! failed chapters in rounds and persists the result in one transaction.

mod acquire;
mod catalog;
mod engine;
pub mod error;
#[cfg(test)]
mod testing;

pub use crate::engine::Engine;
pub use tome_adapter::Params;
pub use tome_store::{BookQuery, Filter};
