//! PostgreSQL store backend.
//!
//! Cascade and nullify rules live in the schema's foreign keys. Each trait
//! method runs inside one transaction.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use super::{NewOrder, OrderFilter, OrderPage, OrderStore, Page, StoreError};
use crate::domain::order::{Order, OrderDetail, OrderId, OrderStatus};
use crate::domain::product::{NewProduct, Product, ProductId, ProductRef};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS products (
        id BIGINT PRIMARY KEY,
        name VARCHAR(64) NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS orders (
        id BIGSERIAL PRIMARY KEY,
        version BIGINT NOT NULL DEFAULT 1,
        status VARCHAR(12) NOT NULL DEFAULT 'new',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        external_id VARCHAR(128) NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS orders_external_id_idx ON orders (external_id)",
    "CREATE INDEX IF NOT EXISTS orders_status_idx ON orders (status)",
    "CREATE TABLE IF NOT EXISTS order_details (
        id BIGSERIAL PRIMARY KEY,
        order_id BIGINT NOT NULL REFERENCES orders (id) ON DELETE CASCADE,
        product_id BIGINT REFERENCES products (id) ON DELETE SET NULL,
        amount INTEGER NOT NULL,
        price NUMERIC(12, 2) NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS order_details_order_id_idx ON order_details (order_id)",
];

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

fn has_code(err: &sqlx::Error, wanted: &str) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == wanted)
}

fn product_insert_error(err: sqlx::Error, name: &str) -> StoreError {
    if has_code(&err, UNIQUE_VIOLATION) {
        StoreError::DuplicateProductName(name.to_string())
    } else {
        err.into()
    }
}

fn detail_insert_error(err: sqlx::Error, product_id: ProductId) -> StoreError {
    if has_code(&err, FOREIGN_KEY_VIOLATION) {
        StoreError::ProductNotFound(product_id)
    } else {
        err.into()
    }
}

/// Store backend on a PostgreSQL connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Create tables and indexes if they are missing.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!("Database schema ready");
        Ok(())
    }

    fn order_from_row(row: &PgRow) -> Result<Order, StoreError> {
        let status: String = row.try_get("status")?;
        let status = status
            .parse::<OrderStatus>()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Order {
            id: row.try_get("id")?,
            version: row.try_get("version")?,
            status,
            created_at: row.try_get("created_at")?,
            external_id: row.try_get("external_id")?,
            details: Vec::new(),
        })
    }

    async fn load_details(
        conn: &mut PgConnection,
        order_ids: &[OrderId],
    ) -> Result<HashMap<OrderId, Vec<OrderDetail>>, StoreError> {
        let rows = sqlx::query(
            "SELECT d.id, d.order_id, d.amount, d.price, p.id AS product_id, p.name AS product_name
             FROM order_details d
             LEFT JOIN products p ON p.id = d.product_id
             WHERE d.order_id = ANY($1)
             ORDER BY d.id",
        )
        .bind(order_ids)
        .fetch_all(&mut *conn)
        .await?;

        let mut details: HashMap<OrderId, Vec<OrderDetail>> = HashMap::new();
        for row in rows {
            let product_id: Option<ProductId> = row.try_get("product_id")?;
            let product_name: Option<String> = row.try_get("product_name")?;
            let product = match (product_id, product_name) {
                (Some(id), Some(name)) => Some(Product { id, name }),
                _ => None,
            };

            details
                .entry(row.try_get("order_id")?)
                .or_default()
                .push(OrderDetail {
                    id: row.try_get("id")?,
                    amount: row.try_get("amount")?,
                    price: row.try_get("price")?,
                    product,
                });
        }
        Ok(details)
    }

    async fn fetch_order(conn: &mut PgConnection, id: OrderId) -> Result<Order, StoreError> {
        let row = sqlx::query(
            "SELECT id, version, status, created_at, external_id FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(StoreError::OrderNotFound(id))?;

        let mut order = Self::order_from_row(&row)?;
        let mut details = Self::load_details(conn, &[id]).await?;
        order.details = details.remove(&id).unwrap_or_default();
        Ok(order)
    }

    /// Explain why a version-guarded write touched no row.
    async fn missed_write(
        conn: &mut PgConnection,
        id: OrderId,
        expected: i64,
    ) -> Result<StoreError, StoreError> {
        let current: Option<i64> = sqlx::query_scalar("SELECT version FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(match current {
            None => StoreError::OrderNotFound(id),
            Some(actual) => StoreError::Conflict {
                order_id: id,
                expected,
                actual,
            },
        })
    }

    /// Make sure the referenced product exists and hold a key-share lock on
    /// it until the transaction ends, so it cannot be deleted underneath the
    /// detail rows that are about to reference it.
    async fn ensure_product(
        conn: &mut PgConnection,
        product: &ProductRef,
    ) -> Result<(), StoreError> {
        if let ProductRef::GetOrCreate { id, name } = product {
            sqlx::query(
                "INSERT INTO products (id, name) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING",
            )
            .bind(id)
            .bind(name)
            .execute(&mut *conn)
            .await
            .map_err(|e| product_insert_error(e, name))?;
        }

        let id = product.id();
        let found: Option<ProductId> =
            sqlx::query_scalar("SELECT id FROM products WHERE id = $1 FOR KEY SHARE")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
        if found.is_none() {
            return Err(StoreError::ProductNotFound(id));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn get_order(&self, id: OrderId) -> Result<Order, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_order(&mut conn, id).await
    }

    async fn list_orders(&self, filter: &OrderFilter, page: Page) -> Result<OrderPage, StoreError> {
        let mut tx = self.pool.begin().await?;
        let status = filter.status.map(|s| s.as_str());

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders
             WHERE ($1::TEXT IS NULL OR external_id = $1)
               AND ($2::TEXT IS NULL OR status = $2)",
        )
        .bind(filter.external_id.as_deref())
        .bind(status)
        .fetch_one(&mut *tx)
        .await?;

        let rows = sqlx::query(
            "SELECT id, version, status, created_at, external_id FROM orders
             WHERE ($1::TEXT IS NULL OR external_id = $1)
               AND ($2::TEXT IS NULL OR status = $2)
             ORDER BY id, status, external_id
             LIMIT $3 OFFSET $4",
        )
        .bind(filter.external_id.as_deref())
        .bind(status)
        .bind(page.limit as i64)
        .bind(page.offset as i64)
        .fetch_all(&mut *tx)
        .await?;

        let mut orders = rows
            .iter()
            .map(Self::order_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let ids: Vec<OrderId> = orders.iter().map(|order| order.id).collect();
        let mut details = Self::load_details(&mut tx, &ids).await?;
        for order in &mut orders {
            order.details = details.remove(&order.id).unwrap_or_default();
        }

        tx.commit().await?;
        Ok(OrderPage {
            orders,
            total: total as usize,
        })
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Named references first so a bare id may point at a product this
        // order creates.
        let mut products: Vec<&ProductRef> = order.details.iter().map(|d| &d.product).collect();
        products.sort_by_key(|product| matches!(product, ProductRef::Existing(_)));
        for product in products {
            Self::ensure_product(&mut tx, product).await?;
        }

        let order_id: OrderId = sqlx::query_scalar(
            "INSERT INTO orders (status, external_id) VALUES ($1, $2) RETURNING id",
        )
        .bind(OrderStatus::New.as_str())
        .bind(&order.external_id)
        .fetch_one(&mut *tx)
        .await?;

        for detail in &order.details {
            sqlx::query(
                "INSERT INTO order_details (order_id, product_id, amount, price)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(order_id)
            .bind(detail.product.id())
            .bind(detail.amount)
            .bind(detail.price)
            .execute(&mut *tx)
            .await
            .map_err(|e| detail_insert_error(e, detail.product.id()))?;
        }

        let created = Self::fetch_order(&mut tx, order_id).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn save_order(&self, order: &Order) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE orders SET status = $1, external_id = $2, version = version + 1
             WHERE id = $3 AND version = $4",
        )
        .bind(order.status.as_str())
        .bind(&order.external_id)
        .bind(order.id)
        .bind(order.version)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(Self::missed_write(&mut tx, order.id, order.version).await?);
        }

        let saved = Self::fetch_order(&mut tx, order.id).await?;
        tx.commit().await?;
        Ok(saved)
    }

    async fn delete_order(&self, id: OrderId, expected_version: i64) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM orders WHERE id = $1 AND version = $2")
            .bind(id)
            .bind(expected_version)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            return Err(Self::missed_write(&mut tx, id, expected_version).await?);
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Product, StoreError> {
        let row = sqlx::query("SELECT id, name FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::ProductNotFound(id))?;

        Ok(Product {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
        })
    }

    async fn create_product(&self, data: NewProduct) -> Result<Product, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Ids may also be chosen by callers, so the next id is derived under a lock.
        sqlx::query("LOCK TABLE products IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;

        let id: ProductId = sqlx::query_scalar(
            "INSERT INTO products (id, name)
             SELECT COALESCE(MAX(id), 0) + 1, $1 FROM products
             RETURNING id",
        )
        .bind(&data.name)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| product_insert_error(e, &data.name))?;

        tx.commit().await?;
        Ok(Product {
            id,
            name: data.name,
        })
    }

    async fn get_or_create_product(&self, id: ProductId, name: &str) -> Result<Product, StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::ensure_product(
            &mut tx,
            &ProductRef::GetOrCreate {
                id,
                name: name.to_string(),
            },
        )
        .await?;

        let stored: String = sqlx::query_scalar("SELECT name FROM products WHERE id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Product { id, name: stored })
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), StoreError> {
        let deleted = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if deleted.rows_affected() == 0 {
            return Err(StoreError::ProductNotFound(id));
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// ============================================================================
// Integration Tests
// ============================================================================
//
// These need a reachable PostgreSQL database:
//   DATABASE_URL=postgres://... cargo test -- --ignored
//
// ============================================================================
