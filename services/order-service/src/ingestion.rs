use common::metrics;
use domain::Order;
use messaging::{ConsumerError, OrderStream};
use order_store::OrderRepository;
use read_model::OrderCache;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::shutdown::ShutdownListener;

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("Order stream failed: {0}")]
    Stream(#[from] ConsumerError),
}

/// What happened to a single message payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Persisted and cached under the assigned identifier
    Cached(String),
    /// Not a decodable order document
    Malformed,
    /// Decoded, but the store did not accept it
    Rejected,
}

/// Drains the order stream into the store and then the cache.
///
/// Messages are handled one at a time, in arrival order. Bad messages are
/// logged and dropped; only a failure of the stream itself stops the loop.
pub struct IngestionLoop<S> {
    stream: S,
    repository: Arc<dyn OrderRepository>,
    cache: Arc<OrderCache>,
}

impl<S: OrderStream> IngestionLoop<S> {
    pub fn new(stream: S, repository: Arc<dyn OrderRepository>, cache: Arc<OrderCache>) -> Self {
        Self {
            stream,
            repository,
            cache,
        }
    }

    /// Consume until `shutdown` fires or the stream fails.
    ///
    /// A message already being processed when shutdown fires is finished first.
    pub async fn run(mut self, mut shutdown: ShutdownListener) -> Result<(), IngestionError> {
        info!("Starting order ingestion loop...");

        loop {
            let received = tokio::select! {
                biased;
                _ = shutdown.triggered() => {
                    info!("Ingestion loop cancelled");
                    return Ok(());
                }
                received = self.stream.recv() => received,
            };

            match received {
                Ok(Some(payload)) => {
                    self.process_message(&payload).await;
                }
                Ok(None) => {
                    metrics::record_ingested("empty");
                }
                Err(e) => {
                    error!("Order stream failed, stopping ingestion: {}", e);
                    return Err(e.into());
                }
            }
        }
    }

    /// Decode, persist and cache one payload
    pub async fn process_message(&self, payload: &[u8]) -> MessageOutcome {
        let mut order = match Order::from_slice(payload) {
            Ok(order) => order,
            Err(e) => {
                warn!(bytes = payload.len(), "Dropping undecodable order message: {}", e);
                metrics::record_ingested("malformed");
                return MessageOutcome::Malformed;
            }
        };

        let order_uid = match self.repository.save(&order).await {
            Ok(order_uid) => order_uid,
            Err(e) => {
                if e.is_validation() {
                    warn!(track_number = %order.track_number, "Dropping invalid order: {}", e);
                } else {
                    error!(track_number = %order.track_number, "Failed to persist order: {}", e);
                }
                metrics::record_ingested("rejected");
                return MessageOutcome::Rejected;
            }
        };

        order.assign_uid(order_uid.clone());
        if let Err(e) = self.cache.store(order).await {
            error!(order_uid = %order_uid, "Persisted order could not be cached: {}", e);
            metrics::record_ingested("rejected");
            return MessageOutcome::Rejected;
        }

        metrics::record_ingested("cached");
        info!(order_uid = %order_uid, "Order ingested");
        MessageOutcome::Cached(order_uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown;
    use async_trait::async_trait;
    use domain::fixtures::sample_order;
    use order_store::{MockOrderRepository, OrderStoreError};
    use rdkafka::error::KafkaError;
    use read_model::{LookupError, OrderLookup};
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Replays a fixed script, then waits forever like an idle topic.
    struct ScriptedStream {
        script: VecDeque<Result<Option<Vec<u8>>, ConsumerError>>,
    }

    impl ScriptedStream {
        fn new(script: Vec<Result<Option<Vec<u8>>, ConsumerError>>) -> Self {
            Self {
                script: script.into(),
            }
        }
    }

    #[async_trait]
    impl OrderStream for ScriptedStream {
        async fn recv(&mut self) -> Result<Option<Vec<u8>>, ConsumerError> {
            match self.script.pop_front() {
                Some(next) => next,
                None => std::future::pending().await,
            }
        }
    }

    fn valid_payload(track_number: &str) -> Vec<u8> {
        serde_json::to_vec(&sample_order(track_number)).unwrap()
    }

    async fn wait_until_cached(cache: &OrderCache, order_uid: &str) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while cache.load(order_uid).await.is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("order was not cached in time");
    }

    #[tokio::test]
    async fn test_malformed_message_reaches_neither_store_nor_cache() {
        let mut repository = MockOrderRepository::new();
        repository.expect_save().never();

        let cache = Arc::new(OrderCache::new());
        let ingestion = IngestionLoop::new(
            ScriptedStream::new(vec![]),
            Arc::new(repository),
            cache.clone(),
        );

        let outcome = ingestion.process_message(b"{\"order_uid\": ").await;
        assert_eq!(outcome, MessageOutcome::Malformed);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_rejected_order_is_not_cached() {
        let mut repository = MockOrderRepository::new();
        repository.expect_save().times(1).returning(|order| {
            Err(OrderStoreError::Validation(
                order.validate_for_persistence().unwrap_err(),
            ))
        });

        let cache = Arc::new(OrderCache::new());
        let ingestion = IngestionLoop::new(
            ScriptedStream::new(vec![]),
            Arc::new(repository),
            cache.clone(),
        );

        let mut order = sample_order("WBILNOITEMS");
        order.items = None;
        let payload = serde_json::to_vec(&order).unwrap();

        assert_eq!(
            ingestion.process_message(&payload).await,
            MessageOutcome::Rejected
        );
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_order_with_empty_item_list_is_ingested() {
        let mut repository = MockOrderRepository::new();
        repository
            .expect_save()
            .times(1)
            .returning(|order| match order.validate_for_persistence() {
                Ok(()) => Ok("E1".to_string()),
                Err(e) => Err(e.into()),
            });

        let cache = Arc::new(OrderCache::new());
        let ingestion = IngestionLoop::new(
            ScriptedStream::new(vec![]),
            Arc::new(repository),
            cache.clone(),
        );

        let mut order = sample_order("WBILEMPTY");
        order.items = Some(Vec::new());
        let payload = serde_json::to_vec(&order).unwrap();

        assert_eq!(
            ingestion.process_message(&payload).await,
            MessageOutcome::Cached("E1".to_string())
        );
        assert_eq!(cache.load("E1").await.unwrap().items, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_store_failure_is_not_cached() {
        let mut repository = MockOrderRepository::new();
        repository
            .expect_save()
            .returning(|_| Err(OrderStoreError::DatabaseError(sqlx::Error::PoolTimedOut)));

        let cache = Arc::new(OrderCache::new());
        let ingestion = IngestionLoop::new(
            ScriptedStream::new(vec![]),
            Arc::new(repository),
            cache.clone(),
        );

        assert_eq!(
            ingestion.process_message(&valid_payload("WBILDOWN")).await,
            MessageOutcome::Rejected
        );
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_ingested_order_becomes_visible_to_lookup() {
        let mut repository = MockOrderRepository::new();
        repository
            .expect_save()
            .times(1)
            .returning(|_| Ok("X1".to_string()));
        repository.expect_find_by_id().times(1).returning(|_| Ok(None));
        let repository: Arc<dyn OrderRepository> = Arc::new(repository);

        let cache = Arc::new(OrderCache::new());
        let lookup = OrderLookup::new(cache.clone(), repository.clone());

        assert!(matches!(
            lookup.get_order("X1").await,
            Err(LookupError::NotFound(_))
        ));

        let stream = ScriptedStream::new(vec![
            Ok(Some(b"garbage".to_vec())),
            Ok(None),
            Ok(Some(valid_payload("WBILMEBX1"))),
        ]);
        let (trigger, listener) = shutdown::channel();
        let task = tokio::spawn(IngestionLoop::new(stream, repository, cache.clone()).run(listener));

        wait_until_cached(&cache, "X1").await;
        trigger.trigger();
        assert!(task.await.unwrap().is_ok());

        let order = lookup.get_order("X1").await.unwrap();
        assert_eq!(order.order_uid, "X1");
        assert_eq!(order.track_number, "WBILMEBX1");
        assert_eq!(order.items().len(), 1);
        assert_eq!(order.payment.unwrap().amount, 1817);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_loop_stops_on_shutdown_while_idle() {
        let repository = MockOrderRepository::new();
        let (trigger, listener) = shutdown::channel();

        let task = tokio::spawn(
            IngestionLoop::new(
                ScriptedStream::new(vec![]),
                Arc::new(repository),
                Arc::new(OrderCache::new()),
            )
            .run(listener),
        );

        trigger.trigger();
        let result = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_stream_failure_stops_the_loop_with_error() {
        let mut repository = MockOrderRepository::new();
        repository.expect_save().never();
        let (_trigger, listener) = shutdown::channel();

        let stream = ScriptedStream::new(vec![Err(ConsumerError::Receive(
            KafkaError::NoMessageReceived,
        ))]);
        let result = IngestionLoop::new(stream, Arc::new(repository), Arc::new(OrderCache::new()))
            .run(listener)
            .await;

        assert!(matches!(result, Err(IngestionError::Stream(_))));
    }
}
