pub mod cache;
pub mod lookup;

pub use cache::OrderCache;
pub use lookup::{LookupError, OrderLookup};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReadModelError {
    #[error("Cannot cache an order without an identifier")]
    EmptyIdentifier,
}
