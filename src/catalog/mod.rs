//! Product catalog: startup load and in-memory search

pub mod search;
pub mod store;

pub use search::{parse_price, CatalogSearch};
pub use store::CatalogStore;
