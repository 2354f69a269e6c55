pub mod errors;
pub mod models;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use errors::DomainError;
pub use models::{Delivery, Item, Order, Payment};
