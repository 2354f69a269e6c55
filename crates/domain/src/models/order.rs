use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::errors::DomainError;

/// An order as carried on the stream, persisted by the store and mirrored by the cache.
///
/// Every field has a serde default so that a document with missing fields still
/// decodes; whether it may be persisted is decided by [`Order::validate_for_persistence`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Order {
    /// Assigned by the store on the first successful write, empty before that.
    pub order_uid: String,

    #[validate(length(min = 1, message = "Track number cannot be empty"))]
    pub track_number: String,

    #[validate(length(min = 1, message = "Entry cannot be empty"))]
    pub entry: String,

    #[validate(length(min = 1, message = "Locale cannot be empty"))]
    pub locale: String,

    pub internal_signature: String,

    #[validate(length(min = 1, message = "Customer id cannot be empty"))]
    pub customer_id: String,

    #[validate(length(min = 1, message = "Delivery service cannot be empty"))]
    pub delivery_service: String,

    #[serde(rename = "shardkey")]
    #[validate(length(min = 1, message = "Shard key cannot be empty"))]
    pub shard_key: String,

    #[validate(range(min = 1, message = "Shard map id must be set"))]
    pub sm_id: i32,

    #[validate(custom(function = "validate_date_created"))]
    pub date_created: DateTime<Utc>,

    #[validate(length(min = 1, message = "Out-of-shard flag cannot be empty"))]
    pub oof_shard: String,

    #[validate(required(message = "Order must have a delivery"), nested)]
    pub delivery: Option<Delivery>,

    #[validate(required(message = "Order must have a payment"), nested)]
    pub payment: Option<Payment>,

    /// `None` when the document has no `items` key; an empty list is a valid value.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(required(message = "Order must have items"))]
    pub items: Option<Vec<Item>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Delivery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_id: Option<String>,

    #[validate(length(min = 1, message = "Recipient name cannot be empty"))]
    pub name: String,

    #[validate(length(min = 1, message = "Phone cannot be empty"))]
    pub phone: String,

    #[validate(length(min = 1, message = "ZIP code cannot be empty"))]
    pub zip: String,

    #[validate(length(min = 1, message = "City cannot be empty"))]
    pub city: String,

    #[validate(length(min = 1, message = "Address cannot be empty"))]
    pub address: String,

    #[validate(length(min = 1, message = "Region cannot be empty"))]
    pub region: String,

    #[validate(length(min = 1, message = "Email cannot be empty"))]
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Payment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,

    #[validate(length(min = 1, message = "Transaction cannot be empty"))]
    pub transaction: String,

    pub request_id: Option<String>,

    #[validate(length(min = 1, message = "Currency cannot be empty"))]
    pub currency: String,

    #[validate(length(min = 1, message = "Provider cannot be empty"))]
    pub provider: String,

    #[validate(range(min = 1, message = "Amount must be greater than 0"))]
    pub amount: i64,

    #[validate(range(min = 1, message = "Payment timestamp must be set"))]
    pub payment_dt: i64,

    #[validate(length(min = 1, message = "Bank cannot be empty"))]
    pub bank: String,

    #[validate(range(min = 1, message = "Delivery cost must be greater than 0"))]
    pub delivery_cost: i64,

    #[validate(range(min = 1, message = "Goods total must be greater than 0"))]
    pub goods_total: i64,

    pub custom_fee: Option<i64>,
}

/// A line of an order. Item fields are stored as given; none of them is checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    pub chrt_id: i64,
    pub track_number: String,
    pub price: i64,
    pub rid: String,
    pub name: String,
    pub sale: i32,
    pub size: String,
    pub total_price: i64,
    pub nm_id: i64,
    pub brand: String,
    pub status: i32,
}

fn validate_date_created(value: &DateTime<Utc>) -> Result<(), ValidationError> {
    if value.timestamp() == 0 {
        let mut err = ValidationError::new("date_created");
        err.message = Some("Creation timestamp must be set".into());
        return Err(err);
    }
    Ok(())
}

impl Order {
    /// Decode an order document from a raw message payload.
    pub fn from_slice(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Check every required field before the order is handed to the store.
    pub fn validate_for_persistence(&self) -> Result<(), DomainError> {
        self.validate()?;
        Ok(())
    }

    /// Whether the store has assigned this order its identifier.
    pub fn is_persisted(&self) -> bool {
        !self.order_uid.is_empty()
    }

    /// The order's items, empty when the document carried none.
    pub fn items(&self) -> &[Item] {
        self.items.as_deref().unwrap_or_default()
    }

    /// Record the identifier assigned by the store.
    pub fn assign_uid(&mut self, order_uid: impl Into<String>) {
        self.order_uid = order_uid.into();
    }
}
