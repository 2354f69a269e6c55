use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use domain::Order;
use read_model::LookupError;
use serde::Deserialize;
use tracing::{info, warn};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OrderQuery {
    pub id: Option<String>,
}

/// Get a single order by its identifier, passed as `?id=`
pub async fn get_order_handler(
    State(state): State<AppState>,
    Query(query): Query<OrderQuery>,
) -> Result<Json<Order>, (StatusCode, String)> {
    let order_uid = query.id.unwrap_or_default();
    info!("Fetching order: {}", order_uid);

    match state.lookup.get_order(&order_uid).await {
        Ok(order) => Ok(Json(order)),
        Err(LookupError::InvalidArgument) => Err((
            StatusCode::BAD_REQUEST,
            String::from("Query parameter 'id' is required"),
        )),
        Err(LookupError::NotFound(_)) => {
            info!("Order not found: {}", order_uid);
            Err((StatusCode::NOT_FOUND, format!("Order not found: {}", order_uid)))
        }
        // Store failures are not exposed to clients
        Err(LookupError::Store(e)) => {
            warn!("Order {} unavailable, store error: {}", order_uid, e);
            Err((StatusCode::NOT_FOUND, format!("Order not found: {}", order_uid)))
        }
    }
}
