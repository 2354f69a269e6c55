//! Ready-made orders for tests across the workspace.

use chrono::{TimeZone, Utc};

use crate::models::{Delivery, Item, Order, Payment};

/// A complete, valid order that has not been persisted yet.
pub fn sample_order(track_number: &str) -> Order {
    Order {
        order_uid: String::new(),
        track_number: track_number.to_string(),
        entry: "WBIL".to_string(),
        locale: "en".to_string(),
        internal_signature: String::new(),
        customer_id: "test".to_string(),
        delivery_service: "meest".to_string(),
        shard_key: "9".to_string(),
        sm_id: 99,
        date_created: Utc.with_ymd_and_hms(2021, 11, 26, 6, 22, 19).unwrap(),
        oof_shard: "1".to_string(),
        delivery: Some(Delivery {
            delivery_id: None,
            name: "Test Testov".to_string(),
            phone: "+9720000000".to_string(),
            zip: "2639809".to_string(),
            city: "Kiryat Mozkin".to_string(),
            address: "Ploshad Mira 15".to_string(),
            region: "Kraiot".to_string(),
            email: "test@gmail.com".to_string(),
        }),
        payment: Some(Payment {
            payment_id: None,
            transaction: "b563feb7b2b84b6test".to_string(),
            request_id: None,
            currency: "USD".to_string(),
            provider: "wbpay".to_string(),
            amount: 1817,
            payment_dt: 1637907727,
            bank: "alpha".to_string(),
            delivery_cost: 1500,
            goods_total: 317,
            custom_fee: Some(0),
        }),
        items: Some(vec![sample_item(track_number)]),
    }
}

/// The same order as [`sample_order`], already carrying a store-assigned id.
pub fn persisted_order(order_uid: &str, track_number: &str) -> Order {
    let mut order = sample_order(track_number);
    order.assign_uid(order_uid);
    order
}

pub fn sample_item(track_number: &str) -> Item {
    Item {
        item_id: None,
        chrt_id: 9934930,
        track_number: track_number.to_string(),
        price: 453,
        rid: "ab4219087a764ae0btest".to_string(),
        name: "Mascaras".to_string(),
        sale: 30,
        size: "0".to_string(),
        total_price: 317,
        nm_id: 2389212,
        brand: "Vivienne Sabo".to_string(),
        status: 202,
    }
}
