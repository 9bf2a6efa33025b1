mod adapter;
pub mod biquge;
pub mod error;
mod registry;

pub use crate::adapter::{Adapter, BookStream, MenuEntry, Params, Token};
pub use crate::registry::{AdapterContext, AdapterFactory, AdapterRegistry};
