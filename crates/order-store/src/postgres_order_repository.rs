use super::{OrderRepository, OrderStoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::metrics;
use domain::{Delivery, DomainError, Item, Order, Payment};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

const SELECT_ORDERS: &str = r#"
    SELECT o.order_uid, o.track_number, o.entry, o.locale, o.internal_signature,
           o.customer_id, o.delivery_service, o.shardkey, o.sm_id, o.date_created, o.oof_shard,
           d.delivery_id, d.name, d.phone, d.zip, d.city, d.address, d.region, d.email,
           p.payment_id, p.transaction, p.request_id, p.currency, p.provider, p.amount,
           p.payment_dt, p.bank, p.delivery_cost, p.goods_total, p.custom_fee
    FROM orders o
    JOIN delivery d ON d.order_uid = o.order_uid
    JOIN payment p ON p.order_uid = o.order_uid
"#;

const SELECT_ITEMS: &str = r#"
    SELECT item_id, order_uid, chrt_id, track_number, price, rid, name,
           sale, size, total_price, nm_id, brand, status
    FROM items
"#;

/// PostgreSQL implementation of the order store
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    /// Create a new PostgreSQL order store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the database pool (useful for testing)
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn insert_order(&self, order: &Order) -> Result<String, OrderStoreError> {
        order.validate_for_persistence()?;

        let (Some(delivery), Some(payment)) = (&order.delivery, &order.payment) else {
            return Err(DomainError::ValidationError(
                "Order must have a delivery and a payment".to_string(),
            )
            .into());
        };

        let order_uid = Uuid::new_v4().simple().to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                order_uid, track_number, entry, locale, internal_signature,
                customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&order_uid)
        .bind(&order.track_number)
        .bind(&order.entry)
        .bind(&order.locale)
        .bind(&order.internal_signature)
        .bind(&order.customer_id)
        .bind(&order.delivery_service)
        .bind(&order.shard_key)
        .bind(order.sm_id)
        .bind(order.date_created)
        .bind(&order.oof_shard)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO delivery (
                delivery_id, order_uid, name, phone, zip, city, address, region, email
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4().simple().to_string())
        .bind(&order_uid)
        .bind(&delivery.name)
        .bind(&delivery.phone)
        .bind(&delivery.zip)
        .bind(&delivery.city)
        .bind(&delivery.address)
        .bind(&delivery.region)
        .bind(&delivery.email)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO payment (
                payment_id, order_uid, transaction, request_id, currency, provider,
                amount, payment_dt, bank, delivery_cost, goods_total, custom_fee
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(Uuid::new_v4().simple().to_string())
        .bind(&order_uid)
        .bind(&payment.transaction)
        .bind(&payment.request_id)
        .bind(&payment.currency)
        .bind(&payment.provider)
        .bind(payment.amount)
        .bind(payment.payment_dt)
        .bind(&payment.bank)
        .bind(payment.delivery_cost)
        .bind(payment.goods_total)
        .bind(payment.custom_fee)
        .execute(&mut *tx)
        .await?;

        for (position, item) in order.items().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO items (
                    item_id, order_uid, position, chrt_id, track_number, price, rid,
                    name, sale, size, total_price, nm_id, brand, status
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                "#,
            )
            .bind(Uuid::new_v4().simple().to_string())
            .bind(&order_uid)
            .bind(position as i32)
            .bind(item.chrt_id)
            .bind(&item.track_number)
            .bind(item.price)
            .bind(&item.rid)
            .bind(&item.name)
            .bind(item.sale)
            .bind(&item.size)
            .bind(item.total_price)
            .bind(item.nm_id)
            .bind(&item.brand)
            .bind(item.status)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            order_uid = %order_uid,
            items = order.items().len(),
            "Order committed"
        );

        Ok(order_uid)
    }

    async fn load_all(&self) -> Result<Vec<Order>, OrderStoreError> {
        let rows = sqlx::query(&format!(
            "{SELECT_ORDERS} ORDER BY o.date_created ASC, o.order_uid ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        let item_rows = sqlx::query(&format!("{SELECT_ITEMS} ORDER BY order_uid, position"))
            .fetch_all(&self.pool)
            .await?;

        let mut items_by_order: HashMap<String, Vec<Item>> = HashMap::new();
        for row in &item_rows {
            let order_uid: String = row.try_get("order_uid")?;
            items_by_order
                .entry(order_uid)
                .or_default()
                .push(item_from_row(row)?);
        }

        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut order = order_from_row(row)?;
            order.items = Some(items_by_order.remove(&order.order_uid).unwrap_or_default());
            orders.push(order);
        }

        debug!("Loaded {} orders", orders.len());
        Ok(orders)
    }

    async fn load_one(&self, order_uid: &str) -> Result<Option<Order>, OrderStoreError> {
        let row = sqlx::query(&format!("{SELECT_ORDERS} WHERE o.order_uid = $1"))
            .bind(order_uid)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            debug!(order_uid = %order_uid, "Order not found in store");
            return Ok(None);
        };

        let mut order = order_from_row(&row)?;

        let item_rows = sqlx::query(&format!(
            "{SELECT_ITEMS} WHERE order_uid = $1 ORDER BY position"
        ))
        .bind(order_uid)
        .fetch_all(&self.pool)
        .await?;

        order.items = Some(
            item_rows
                .iter()
                .map(item_from_row)
                .collect::<Result<Vec<_>, _>>()?,
        );

        Ok(Some(order))
    }
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    async fn save(&self, order: &Order) -> Result<String, OrderStoreError> {
        let started = Instant::now();
        let result = self.insert_order(order).await;
        metrics::record_store_operation("save", result.is_ok(), started.elapsed().as_secs_f64());
        result
    }

    async fn find_all(&self) -> Result<Vec<Order>, OrderStoreError> {
        let started = Instant::now();
        let result = self.load_all().await;
        metrics::record_store_operation(
            "find_all",
            result.is_ok(),
            started.elapsed().as_secs_f64(),
        );
        result
    }

    async fn find_by_id(&self, order_uid: &str) -> Result<Option<Order>, OrderStoreError> {
        let started = Instant::now();
        let result = self.load_one(order_uid).await;
        metrics::record_store_operation(
            "find_by_id",
            result.is_ok(),
            started.elapsed().as_secs_f64(),
        );
        result
    }
}

fn order_from_row(row: &PgRow) -> Result<Order, sqlx::Error> {
    Ok(Order {
        order_uid: row.try_get("order_uid")?,
        track_number: row.try_get("track_number")?,
        entry: row.try_get("entry")?,
        locale: row.try_get("locale")?,
        internal_signature: row.try_get("internal_signature")?,
        customer_id: row.try_get("customer_id")?,
        delivery_service: row.try_get("delivery_service")?,
        shard_key: row.try_get("shardkey")?,
        sm_id: row.try_get("sm_id")?,
        date_created: row.try_get::<DateTime<Utc>, _>("date_created")?,
        oof_shard: row.try_get("oof_shard")?,
        delivery: Some(Delivery {
            delivery_id: row.try_get("delivery_id")?,
            name: row.try_get("name")?,
            phone: row.try_get("phone")?,
            zip: row.try_get("zip")?,
            city: row.try_get("city")?,
            address: row.try_get("address")?,
            region: row.try_get("region")?,
            email: row.try_get("email")?,
        }),
        payment: Some(Payment {
            payment_id: row.try_get("payment_id")?,
            transaction: row.try_get("transaction")?,
            request_id: row.try_get("request_id")?,
            currency: row.try_get("currency")?,
            provider: row.try_get("provider")?,
            amount: row.try_get("amount")?,
            payment_dt: row.try_get("payment_dt")?,
            bank: row.try_get("bank")?,
            delivery_cost: row.try_get("delivery_cost")?,
            goods_total: row.try_get("goods_total")?,
            custom_fee: row.try_get("custom_fee")?,
        }),
        items: None,
    })
}

fn item_from_row(row: &PgRow) -> Result<Item, sqlx::Error> {
    Ok(Item {
        item_id: row.try_get("item_id")?,
        chrt_id: row.try_get("chrt_id")?,
        track_number: row.try_get("track_number")?,
        price: row.try_get("price")?,
        rid: row.try_get("rid")?,
        name: row.try_get("name")?,
        sale: row.try_get("sale")?,
        size: row.try_get("size")?,
        total_price: row.try_get("total_price")?,
        nm_id: row.try_get("nm_id")?,
        brand: row.try_get("brand")?,
        status: row.try_get("status")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::fixtures::sample_order;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
    use tracing_subscriber::Registry;

    #[tokio::test]
    async fn test_invalid_order_is_rejected_before_any_write() {
        // A lazy pool never connects, so reaching the database would fail with a
        // connection error instead of a validation error.
        let pool = PgPool::connect_lazy("postgresql://localhost:1/unreachable").unwrap();
        let repository = PostgresOrderRepository::new(pool);

        let mut order = sample_order("WBILTRACK");
        order.payment = None;

        let err = repository.save(&order).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[derive(Clone, Default)]
    struct WarningCounter(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for WarningCounter {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() <= Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[tokio::test]
    async fn test_failed_save_is_left_to_the_caller_to_log() {
        let counter = WarningCounter::default();
        let _guard = tracing::subscriber::set_default(Registry::default().with(counter.clone()));

        let pool = PgPool::connect_lazy("postgresql://localhost:1/unreachable").unwrap();
        let repository = PostgresOrderRepository::new(pool);

        let mut order = sample_order("WBILTRACK");
        order.items = None;

        assert!(repository.save(&order).await.is_err());
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_select_statements_join_sub_entities() {
        assert!(SELECT_ORDERS.contains("JOIN delivery"));
        assert!(SELECT_ORDERS.contains("JOIN payment"));
        assert!(SELECT_ITEMS.contains("FROM items"));
    }
}
