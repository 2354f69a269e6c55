pub mod order_lookup;

pub use order_lookup::{LookupError, OrderLookup};
