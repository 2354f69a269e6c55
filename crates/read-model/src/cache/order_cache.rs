use common::metrics;
use domain::Order;
use order_store::OrderRepository;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::ReadModelError;

/// In-process mirror of the orders committed to the store, keyed by `order_uid`.
///
/// One reader/writer lock guards the whole map: lookups share it, writes take it
/// exclusively. The lock is never held across I/O. Entries are owned values, so
/// what goes in and what comes out are independent copies.
#[derive(Debug, Default)]
pub struct OrderCache {
    orders: RwLock<HashMap<String, Order>>,
}

impl OrderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for a persisted order
    pub async fn store(&self, order: Order) -> Result<(), ReadModelError> {
        if !order.is_persisted() {
            warn!(track_number = %order.track_number, "Refusing to cache order without identifier");
            return Err(ReadModelError::EmptyIdentifier);
        }

        let order_uid = order.order_uid.clone();
        {
            let mut orders = self.orders.write().await;
            orders.insert(order_uid.clone(), order);
            // Set under the lock: the gauge tracks the latest write
            metrics::set_cache_entries(orders.len());
        }

        debug!(order_uid = %order_uid, "Cached order");
        Ok(())
    }

    /// Get a copy of a cached order
    pub async fn load(&self, order_uid: &str) -> Option<Order> {
        let order = self.orders.read().await.get(order_uid).cloned();
        metrics::record_cache_request(order.is_some());

        if order.is_some() {
            debug!(order_uid = %order_uid, "Cache hit");
        } else {
            debug!(order_uid = %order_uid, "Cache miss");
        }
        order
    }

    /// Load every order the store holds into the cache.
    ///
    /// Returns the number of orders restored. A store failure is logged and
    /// leaves the cache as it was; callers keep starting up and lookups fall
    /// back to the store until ingestion fills the cache again.
    pub async fn restore_from_store<R>(&self, repository: &R) -> usize
    where
        R: OrderRepository + ?Sized,
    {
        let orders = match repository.find_all().await {
            Ok(orders) => orders,
            Err(e) => {
                error!("Failed to restore orders from store into cache: {}", e);
                return 0;
            }
        };

        let mut restored = 0;
        {
            let mut cached = self.orders.write().await;
            for order in orders {
                if !order.is_persisted() {
                    warn!(track_number = %order.track_number, "Skipping stored order without identifier");
                    continue;
                }
                cached.insert(order.order_uid.clone(), order);
                restored += 1;
            }
            metrics::set_cache_entries(cached.len());
        }

        metrics::record_restored(restored);
        info!(restored, "Restored orders from store into cache");
        restored
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}
