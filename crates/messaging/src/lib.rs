pub mod consumer;

pub use consumer::{ConsumerError, OrderConsumer, OrderStream};
