//! Postgres persistence
//!
//! Typed record shapes as bound into SQL, the `Store` trait the entity
//! processors work against, and the Postgres implementation. Upserts
//! are multi-row `INSERT ... ON CONFLICT (natural key) DO UPDATE`
//! statements, so re-ingesting the same file converges instead of
//! duplicating. All queries are runtime-checked.

use crate::resolve::{RefEntity, ReferenceLookup};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{PgPool, Postgres, QueryBuilder};

/// Fully coerced customer ready to bind
#[derive(Debug, Clone)]
pub struct CustomerRecord {
    pub customer_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub loyalty_points: i32,
    pub is_active: bool,
}

/// Fully coerced product ready to bind
#[derive(Debug, Clone)]
pub struct ProductRecord {
    pub product_code: String,
    pub product_name: String,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub unit_price: BigDecimal,
    pub stock_quantity: i32,
    pub weight_kg: Option<BigDecimal>,
    pub brand: Option<String>,
    pub sku: Option<String>,
    pub is_active: bool,
}

/// Order header, shared by every line of one order group
#[derive(Debug, Clone)]
pub struct OrderHeader {
    pub order_number: String,
    pub customer_id: i64,
    pub status: String,
    pub total_amount: BigDecimal,
    pub discount_amount: BigDecimal,
    pub tax_amount: BigDecimal,
    pub shipping_amount: BigDecimal,
    pub currency: String,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
    pub ordered_at: NaiveDateTime,
    pub shipped_at: Option<NaiveDateTime>,
    pub delivered_at: Option<NaiveDateTime>,
}

/// One order line item
#[derive(Debug, Clone)]
pub struct OrderItemRecord {
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub discount: BigDecimal,
}

/// Persistence operations the entity processors need. Implemented by
/// [`PgStore`]; test code substitutes fakes.
#[async_trait]
pub trait Store: ReferenceLookup {
    /// Multi-row customer upsert; returns rows affected
    async fn upsert_customers(&self, rows: &[CustomerRecord]) -> Result<u64, sqlx::Error>;

    /// Multi-row product upsert; returns rows affected
    async fn upsert_products(&self, rows: &[ProductRecord]) -> Result<u64, sqlx::Error>;

    /// Upsert one order header and return its id
    async fn upsert_order(&self, header: &OrderHeader) -> Result<i64, sqlx::Error>;

    /// Insert one line item; re-inserting the same (order, product)
    /// pair is a no-op
    async fn insert_order_item(&self, item: &OrderItemRecord) -> Result<(), sqlx::Error>;
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ReferenceLookup for PgStore {
    async fn find_id_by_code(
        &self,
        entity: RefEntity,
        code: &str,
    ) -> Result<Option<i64>, sqlx::Error> {
        let sql = match entity {
            RefEntity::Customer => "SELECT id FROM customers WHERE customer_code = $1",
            RefEntity::Product => "SELECT id FROM products WHERE product_code = $1",
            RefEntity::Category => "SELECT id FROM categories WHERE category_code = $1",
        };
        sqlx::query_scalar::<_, i64>(sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
    }
}

#[async_trait]
impl Store for PgStore {
    async fn upsert_customers(&self, rows: &[CustomerRecord]) -> Result<u64, sqlx::Error> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO customers (customer_code, first_name, last_name, email, phone, \
             date_of_birth, country, city, address, postal_code, loyalty_points, is_active, \
             created_at, updated_at) ",
        );
        qb.push_values(rows, |mut b, row| {
            b.push_bind(&row.customer_code)
                .push_bind(&row.first_name)
                .push_bind(&row.last_name)
                .push_bind(&row.email)
                .push_bind(&row.phone)
                .push_bind(row.date_of_birth)
                .push_bind(&row.country)
                .push_bind(&row.city)
                .push_bind(&row.address)
                .push_bind(&row.postal_code)
                .push_bind(row.loyalty_points)
                .push_bind(row.is_active)
                .push("NOW()")
                .push("NOW()");
        });
        qb.push(
            " ON CONFLICT (customer_code) DO UPDATE SET \
             first_name = EXCLUDED.first_name, \
             last_name = EXCLUDED.last_name, \
             email = EXCLUDED.email, \
             phone = EXCLUDED.phone, \
             date_of_birth = EXCLUDED.date_of_birth, \
             country = EXCLUDED.country, \
             city = EXCLUDED.city, \
             address = EXCLUDED.address, \
             postal_code = EXCLUDED.postal_code, \
             loyalty_points = EXCLUDED.loyalty_points, \
             is_active = EXCLUDED.is_active, \
             updated_at = NOW()",
        );
        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn upsert_products(&self, rows: &[ProductRecord]) -> Result<u64, sqlx::Error> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO products (product_code, product_name, description, category_id, \
             unit_price, stock_quantity, weight_kg, brand, sku, is_active, created_at, \
             updated_at) ",
        );
        qb.push_values(rows, |mut b, row| {
            b.push_bind(&row.product_code)
                .push_bind(&row.product_name)
                .push_bind(&row.description)
                .push_bind(row.category_id)
                .push_bind(&row.unit_price)
                .push_bind(row.stock_quantity)
                .push_bind(&row.weight_kg)
                .push_bind(&row.brand)
                .push_bind(&row.sku)
                .push_bind(row.is_active)
                .push("NOW()")
                .push("NOW()");
        });
        qb.push(
            " ON CONFLICT (product_code) DO UPDATE SET \
             product_name = EXCLUDED.product_name, \
             description = EXCLUDED.description, \
             category_id = EXCLUDED.category_id, \
             unit_price = EXCLUDED.unit_price, \
             stock_quantity = EXCLUDED.stock_quantity, \
             weight_kg = EXCLUDED.weight_kg, \
             brand = EXCLUDED.brand, \
             sku = EXCLUDED.sku, \
             is_active = EXCLUDED.is_active, \
             updated_at = NOW()",
        );
        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn upsert_order(&self, header: &OrderHeader) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO orders (order_number, customer_id, status, total_amount, \
             discount_amount, tax_amount, shipping_amount, currency, shipping_address, \
             notes, ordered_at, shipped_at, delivered_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, NOW(), NOW()) \
             ON CONFLICT (order_number) DO UPDATE SET \
             status = EXCLUDED.status, \
             total_amount = EXCLUDED.total_amount, \
             updated_at = NOW() \
             RETURNING id",
        )
        .bind(&header.order_number)
        .bind(header.customer_id)
        .bind(&header.status)
        .bind(&header.total_amount)
        .bind(&header.discount_amount)
        .bind(&header.tax_amount)
        .bind(&header.shipping_amount)
        .bind(&header.currency)
        .bind(&header.shipping_address)
        .bind(&header.notes)
        .bind(header.ordered_at)
        .bind(header.shipped_at)
        .bind(header.delivered_at)
        .fetch_one(&self.pool)
        .await
    }

    async fn insert_order_item(&self, item: &OrderItemRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO order_items (order_id, product_id, quantity, unit_price, discount, \
             created_at) VALUES ($1, $2, $3, $4, $5, NOW()) \
             ON CONFLICT DO NOTHING",
        )
        .bind(item.order_id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(&item.unit_price)
        .bind(&item.discount)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
