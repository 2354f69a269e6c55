use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use common::metrics;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    match metrics::gather_metrics() {
        Ok(metrics) => (StatusCode::OK, metrics),
        Err(e) => {
            tracing::error!("Failed to gather metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, String::from("Failed to gather metrics"))
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(metrics_handler))

        // Order lookup
        .route("/api/v1/orders", get(handlers::get_order::get_order_handler))
        .route("/getOrder", get(handlers::get_order::get_order_handler))

        // Middleware
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use domain::fixtures::persisted_order;
    use domain::Order;
    use order_store::{MockOrderRepository, OrderStoreError};
    use read_model::{OrderCache, OrderLookup};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn router_with(repository: MockOrderRepository, cached: Vec<Order>) -> Router {
        let cache = Arc::new(OrderCache::new());
        for order in cached {
            cache.store(order).await.unwrap();
        }
        let lookup = Arc::new(OrderLookup::new(cache, Arc::new(repository)));
        create_router(AppState::new(lookup))
    }

    async fn get(router: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_cached_order_is_returned_as_json() {
        let mut repository = MockOrderRepository::new();
        repository.expect_find_by_id().never();
        let router = router_with(repository, vec![persisted_order("C1", "WBILC1")]).await;

        let (status, body) = get(router, "/api/v1/orders?id=C1").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["order_uid"], "C1");
        assert_eq!(json["track_number"], "WBILC1");
        assert_eq!(json["shardkey"], "9");
        assert_eq!(json["items"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_legacy_lookup_path_serves_the_same_order() {
        let router = router_with(MockOrderRepository::new(), vec![persisted_order("C1", "WBILC1")]).await;

        let (status, body) = get(router, "/getOrder?id=C1").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["order_uid"], "C1");
    }

    #[tokio::test]
    async fn test_missing_id_is_bad_request() {
        // A mock without expectations panics if the store is queried
        for uri in ["/api/v1/orders", "/api/v1/orders?id=", "/getOrder"] {
            let router = router_with(MockOrderRepository::new(), vec![]).await;
            let (status, _) = get(router, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_unknown_order_is_not_found() {
        let mut repository = MockOrderRepository::new();
        repository.expect_find_by_id().times(1).returning(|_| Ok(None));
        let router = router_with(repository, vec![]).await;

        let (status, _) = get(router, "/api/v1/orders?id=nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_store_failure_is_reported_as_not_found() {
        let mut repository = MockOrderRepository::new();
        repository
            .expect_find_by_id()
            .returning(|_| Err(OrderStoreError::DatabaseError(sqlx::Error::PoolClosed)));
        let router = router_with(repository, vec![]).await;

        let (status, body) = get(router, "/api/v1/orders?id=S1").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(!String::from_utf8(body).unwrap().contains("pool"));
    }

    #[tokio::test]
    async fn test_health_reports_cached_orders() {
        let router = router_with(
            MockOrderRepository::new(),
            vec![persisted_order("H1", "WBILH1"), persisted_order("H2", "WBILH2")],
        )
        .await;

        let (status, body) = get(router, "/health").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["cached_orders"], 2);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_exposes_prometheus_text() {
        let router = router_with(MockOrderRepository::new(), vec![]).await;
        let (status, _) = get(router, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
    }
}
