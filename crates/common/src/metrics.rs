use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, register_int_gauge,
    CounterVec, Encoder, HistogramVec, IntCounter, IntGauge, TextEncoder,
};

lazy_static! {
    // Ingestion metrics
    pub static ref INGESTED_MESSAGES: CounterVec = register_counter_vec!(
        "orders_ingested_messages_total",
        "Total number of stream messages handled by the ingestion loop",
        &["outcome"]
    )
    .expect("metric cannot be created");

    // Lookup metrics
    pub static ref LOOKUP_COUNTER: CounterVec = register_counter_vec!(
        "orders_lookups_total",
        "Total number of order lookups",
        &["source", "status"]
    )
    .expect("metric cannot be created");

    pub static ref LOOKUP_DURATION: HistogramVec = register_histogram_vec!(
        "orders_lookup_duration_seconds",
        "Order lookup duration in seconds",
        &["source"],
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("metric cannot be created");

    // Cache metrics
    pub static ref CACHE_HIT_COUNTER: CounterVec = register_counter_vec!(
        "orders_cache_requests_total",
        "Total number of cache requests",
        &["status"]
    )
    .expect("metric cannot be created");

    pub static ref CACHE_ENTRIES: IntGauge = register_int_gauge!(
        "orders_cache_entries",
        "Number of orders currently held in the cache"
    )
    .expect("metric cannot be created");

    pub static ref RESTORED_ORDERS: IntCounter = register_int_counter!(
        "orders_restored_total",
        "Total number of orders loaded into the cache from the store at startup"
    )
    .expect("metric cannot be created");

    // Store metrics
    pub static ref STORE_OPERATIONS: CounterVec = register_counter_vec!(
        "orders_store_operations_total",
        "Total number of order store operations",
        &["operation", "status"]
    )
    .expect("metric cannot be created");

    pub static ref STORE_DURATION: HistogramVec = register_histogram_vec!(
        "orders_store_duration_seconds",
        "Order store operation duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("metric cannot be created");
}

/// Get all metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Helper function to record what happened to one stream message
pub fn record_ingested(outcome: &str) {
    INGESTED_MESSAGES.with_label_values(&[outcome]).inc();
}

/// Helper function to record a lookup and where it was answered from
pub fn record_lookup(source: &str, status: &str, duration_secs: f64) {
    LOOKUP_COUNTER.with_label_values(&[source, status]).inc();
    LOOKUP_DURATION
        .with_label_values(&[source])
        .observe(duration_secs);
}

/// Helper function to record cache hit/miss
pub fn record_cache_request(hit: bool) {
    let status = if hit { "hit" } else { "miss" };
    CACHE_HIT_COUNTER.with_label_values(&[status]).inc();
}

pub fn set_cache_entries(entries: usize) {
    CACHE_ENTRIES.set(entries as i64);
}

pub fn record_restored(count: usize) {
    RESTORED_ORDERS.inc_by(count as u64);
}

/// Helper function to record order store operation
pub fn record_store_operation(operation: &str, success: bool, duration_secs: f64) {
    let status = if success { "success" } else { "error" };
    STORE_OPERATIONS
        .with_label_values(&[operation, status])
        .inc();
    STORE_DURATION
        .with_label_values(&[operation])
        .observe(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_metrics() {
        set_cache_entries(3);
        let metrics = gather_metrics().unwrap();
        assert!(metrics.contains("orders_cache_entries 3"));
    }

    #[test]
    fn test_record_ingested() {
        record_ingested("malformed");
        let metrics = gather_metrics().unwrap();
        assert!(metrics.contains("orders_ingested_messages_total"));
        assert!(metrics.contains("outcome=\"malformed\""));
    }

    #[test]
    fn test_record_lookup() {
        record_lookup("cache", "found", 0.0002);
        let metrics = gather_metrics().unwrap();
        assert!(metrics.contains("orders_lookups_total"));
        assert!(metrics.contains("orders_lookup_duration_seconds"));
    }

    #[test]
    fn test_record_store_operation() {
        record_store_operation("save", false, 0.01);
        let metrics = gather_metrics().unwrap();
        assert!(metrics.contains("orders_store_operations_total"));
    }
}
