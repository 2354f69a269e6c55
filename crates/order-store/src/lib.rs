pub mod postgres_order_repository;

pub use postgres_order_repository::PostgresOrderRepository;

use async_trait::async_trait;
use domain::{DomainError, Order};
use thiserror::Error;

/// Durable store for orders, the single owner of committed order state
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Validate and persist an order with its delivery, payment and items in
    /// one transaction. Returns the identifier assigned to the order.
    async fn save(&self, order: &Order) -> Result<String, OrderStoreError>;

    /// Load every stored order
    async fn find_all(&self) -> Result<Vec<Order>, OrderStoreError>;

    /// Load a single order, `None` if no order has this identifier
    async fn find_by_id(&self, order_uid: &str) -> Result<Option<Order>, OrderStoreError>;
}

#[derive(Debug, Error)]
pub enum OrderStoreError {
    #[error("Invalid order: {0}")]
    Validation(#[from] DomainError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl OrderStoreError {
    /// Whether the order itself was at fault rather than the database
    pub fn is_validation(&self) -> bool {
        matches!(self, OrderStoreError::Validation(_))
    }
}
