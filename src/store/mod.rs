//! Persistence gateway for orders, their details and products.
//!
//! Services receive an `Arc<dyn OrderStore>` and never reach a backend
//! directly, so the in-memory store can stand in for PostgreSQL in tests.
//!
//! Referential rules every backend enforces:
//! - deleting an order deletes its details
//! - deleting a product nullifies the `product` of details referencing it
//! - writes to an order are compare-and-swap on `Order::version`

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::order::{Order, OrderId, OrderStatus};
use crate::domain::product::{NewProduct, Product, ProductId, ProductRef};
use crate::utils::IsTransient;

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Product name already taken: {0}")]
    DuplicateProductName(String),

    /// The order changed between read and write.
    #[error("Concurrency conflict on order {order_id}: expected version {expected}, found {actual}")]
    Conflict {
        order_id: OrderId,
        expected: i64,
        actual: i64,
    },

    #[error("Backend error: {0}")]
    Backend(String),
}

impl IsTransient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Optional equality filters for listing orders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub external_id: Option<String>,
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    pub fn matches(&self, external_id: &str, status: OrderStatus) -> bool {
        self.external_id.as_deref().is_none_or(|wanted| wanted == external_id)
            && self.status.is_none_or(|wanted| wanted == status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    /// Number of orders matching the filter, ignoring the page window.
    pub total: usize,
}

/// A validated order ready to be persisted together with its details.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub external_id: String,
    pub details: Vec<NewOrderDetail>,
}

#[derive(Debug, Clone)]
pub struct NewOrderDetail {
    pub amount: i32,
    pub price: Decimal,
    pub product: ProductRef,
}

/// Storage backend for the order service.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get_order(&self, id: OrderId) -> Result<Order, StoreError>;

    async fn list_orders(&self, filter: &OrderFilter, page: Page) -> Result<OrderPage, StoreError>;

    /// Persist an order with status `New` and all of its details in one write.
    /// Products are resolved inside the same write; nothing is kept if any
    /// product reference fails.
    async fn create_order(&self, order: NewOrder) -> Result<Order, StoreError>;

    /// Persist `status` and `external_id` if the stored version still equals
    /// `order.version`. Returns the order with its new version.
    async fn save_order(&self, order: &Order) -> Result<Order, StoreError>;

    /// Delete an order and its details if the stored version still equals
    /// `expected_version`.
    async fn delete_order(&self, id: OrderId, expected_version: i64) -> Result<(), StoreError>;

    async fn get_product(&self, id: ProductId) -> Result<Product, StoreError>;

    async fn create_product(&self, data: NewProduct) -> Result<Product, StoreError>;

    /// Return the product with `id`, creating it with `name` when absent.
    async fn get_or_create_product(&self, id: ProductId, name: &str) -> Result<Product, StoreError>;

    /// Delete a product; details that referenced it keep a null product.
    async fn delete_product(&self, id: ProductId) -> Result<(), StoreError>;

    /// Cheap liveness check.
    async fn ping(&self) -> Result<(), StoreError>;
}
