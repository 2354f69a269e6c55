use read_model::OrderLookup;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub lookup: Arc<OrderLookup>,
}

impl AppState {
    pub fn new(lookup: Arc<OrderLookup>) -> Self {
        Self { lookup }
    }
}
