use common::metrics;
use domain::Order;
use order_store::{OrderRepository, OrderStoreError};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info};

use crate::cache::OrderCache;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Order id is required")]
    InvalidArgument,

    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("Order store unavailable: {0}")]
    Store(#[from] OrderStoreError),
}

/// Point lookups of single orders: cache first, store on a miss.
///
/// Orders found only in the store are returned without being added to the
/// cache; the cache holds what was restored at startup or ingested since.
pub struct OrderLookup {
    cache: Arc<OrderCache>,
    repository: Arc<dyn OrderRepository>,
}

impl OrderLookup {
    pub fn new(cache: Arc<OrderCache>, repository: Arc<dyn OrderRepository>) -> Self {
        Self { cache, repository }
    }

    pub fn cache(&self) -> &OrderCache {
        &self.cache
    }

    /// Get a single order by its identifier
    pub async fn get_order(&self, order_uid: &str) -> Result<Order, LookupError> {
        let started = Instant::now();

        if order_uid.is_empty() {
            metrics::record_lookup("none", "invalid", started.elapsed().as_secs_f64());
            return Err(LookupError::InvalidArgument);
        }

        if let Some(order) = self.cache.load(order_uid).await {
            metrics::record_lookup("cache", "found", started.elapsed().as_secs_f64());
            return Ok(order);
        }

        info!(order_uid = %order_uid, "Cache miss, querying store");

        let result = match self.repository.find_by_id(order_uid).await {
            Ok(Some(order)) => Ok(order),
            Ok(None) => Err(LookupError::NotFound(order_uid.to_string())),
            Err(e) => {
                error!(order_uid = %order_uid, "Failed to fetch order from store: {}", e);
                Err(LookupError::Store(e))
            }
        };

        let status = match &result {
            Ok(_) => "found",
            Err(LookupError::NotFound(_)) => "not_found",
            Err(_) => "error",
        };
        metrics::record_lookup("store", status, started.elapsed().as_secs_f64());

        result
    }
}
