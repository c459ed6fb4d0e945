//! In-memory store backend.
//!
//! Rows are kept in normalized tables behind a single `RwLock`, so every
//! multi-row write happens under one write guard and is atomic with respect
//! to other requests.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use super::{NewOrder, OrderFilter, OrderPage, OrderStore, Page, StoreError};
use crate::domain::order::{Order, OrderDetail, OrderDetailId, OrderId, OrderStatus};
use crate::domain::product::{NewProduct, Product, ProductId, ProductRef};

#[derive(Debug, Clone)]
struct OrderRow {
    id: OrderId,
    version: i64,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    external_id: String,
}

#[derive(Debug, Clone)]
struct DetailRow {
    id: OrderDetailId,
    order_id: OrderId,
    product_id: Option<ProductId>,
    amount: i32,
    price: Decimal,
}

#[derive(Debug, Default)]
struct Tables {
    orders: BTreeMap<OrderId, OrderRow>,
    details: BTreeMap<OrderDetailId, DetailRow>,
    products: BTreeMap<ProductId, Product>,
    last_order_id: OrderId,
    last_detail_id: OrderDetailId,
}

impl Tables {
    fn assemble(&self, row: &OrderRow) -> Order {
        let details = self
            .details
            .values()
            .filter(|detail| detail.order_id == row.id)
            .map(|detail| OrderDetail {
                id: detail.id,
                amount: detail.amount,
                price: detail.price,
                product: detail
                    .product_id
                    .and_then(|product_id| self.products.get(&product_id).cloned()),
            })
            .collect();

        Order {
            id: row.id,
            version: row.version,
            status: row.status,
            created_at: row.created_at,
            external_id: row.external_id.clone(),
            details,
        }
    }

    fn order_row(&self, id: OrderId) -> Result<&OrderRow, StoreError> {
        self.orders.get(&id).ok_or(StoreError::OrderNotFound(id))
    }

    fn check_version(row: &OrderRow, expected: i64) -> Result<(), StoreError> {
        if row.version != expected {
            return Err(StoreError::Conflict {
                order_id: row.id,
                expected,
                actual: row.version,
            });
        }
        Ok(())
    }

    fn name_taken(&self, name: &str, except: ProductId) -> bool {
        self.products
            .values()
            .any(|product| product.name == name && product.id != except)
    }

    fn next_product_id(&self) -> ProductId {
        self.products.keys().next_back().copied().unwrap_or(0) + 1
    }
}

/// Store backend keeping everything in process memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn get_order(&self, id: OrderId) -> Result<Order, StoreError> {
        let tables = self.tables.read().await;
        let row = tables.order_row(id)?;
        Ok(tables.assemble(row))
    }

    async fn list_orders(&self, filter: &OrderFilter, page: Page) -> Result<OrderPage, StoreError> {
        let tables = self.tables.read().await;

        // BTreeMap iteration is already ordered by id.
        let matching: Vec<&OrderRow> = tables
            .orders
            .values()
            .filter(|row| filter.matches(&row.external_id, row.status))
            .collect();

        let total = matching.len();
        let orders = matching
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .map(|row| tables.assemble(row))
            .collect();

        Ok(OrderPage { orders, total })
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut tables = self.tables.write().await;

        // Resolve every product before touching any table. Named references
        // go first so a bare id may point at a product this order creates.
        let mut to_create: BTreeMap<ProductId, String> = BTreeMap::new();
        for product in order.details.iter().map(|detail| &detail.product) {
            let ProductRef::GetOrCreate { id, name } = product else {
                continue;
            };
            if tables.products.contains_key(id) || to_create.contains_key(id) {
                continue;
            }
            let pending_clash = to_create.values().any(|pending| pending == name);
            if pending_clash || tables.name_taken(name, *id) {
                return Err(StoreError::DuplicateProductName(name.clone()));
            }
            to_create.insert(*id, name.clone());
        }
        for product in order.details.iter().map(|detail| &detail.product) {
            let ProductRef::Existing(id) = product else {
                continue;
            };
            if !tables.products.contains_key(id) && !to_create.contains_key(id) {
                return Err(StoreError::ProductNotFound(*id));
            }
        }

        for (id, name) in to_create {
            tracing::debug!(product_id = id, name = %name, "Creating product for order detail");
            tables.products.insert(id, Product { id, name });
        }

        tables.last_order_id += 1;
        let order_id = tables.last_order_id;
        let row = OrderRow {
            id: order_id,
            version: 1,
            status: OrderStatus::New,
            created_at: Utc::now(),
            external_id: order.external_id,
        };

        for detail in order.details {
            tables.last_detail_id += 1;
            let detail_id = tables.last_detail_id;
            tables.details.insert(
                detail_id,
                DetailRow {
                    id: detail_id,
                    order_id,
                    product_id: Some(detail.product.id()),
                    amount: detail.amount,
                    price: detail.price,
                },
            );
        }

        let created = tables.assemble(&row);
        tables.orders.insert(order_id, row);
        Ok(created)
    }

    async fn save_order(&self, order: &Order) -> Result<Order, StoreError> {
        let mut tables = self.tables.write().await;

        let row = tables
            .orders
            .get_mut(&order.id)
            .ok_or(StoreError::OrderNotFound(order.id))?;
        Tables::check_version(row, order.version)?;

        row.status = order.status;
        row.external_id = order.external_id.clone();
        row.version += 1;

        let row = row.clone();
        Ok(tables.assemble(&row))
    }

    async fn delete_order(&self, id: OrderId, expected_version: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;

        let row = tables.order_row(id)?;
        Tables::check_version(row, expected_version)?;

        tables.orders.remove(&id);
        tables.details.retain(|_, detail| detail.order_id != id);
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Product, StoreError> {
        let tables = self.tables.read().await;
        tables
            .products
            .get(&id)
            .cloned()
            .ok_or(StoreError::ProductNotFound(id))
    }

    async fn create_product(&self, data: NewProduct) -> Result<Product, StoreError> {
        let mut tables = self.tables.write().await;

        let id = tables.next_product_id();
        if tables.name_taken(&data.name, id) {
            return Err(StoreError::DuplicateProductName(data.name));
        }

        let product = Product { id, name: data.name };
        tables.products.insert(id, product.clone());
        Ok(product)
    }

    async fn get_or_create_product(&self, id: ProductId, name: &str) -> Result<Product, StoreError> {
        let mut tables = self.tables.write().await;

        if let Some(existing) = tables.products.get(&id) {
            return Ok(existing.clone());
        }
        if tables.name_taken(name, id) {
            return Err(StoreError::DuplicateProductName(name.to_string()));
        }

        let product = Product {
            id,
            name: name.to_string(),
        };
        tables.products.insert(id, product.clone());
        Ok(product)
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;

        if tables.products.remove(&id).is_none() {
            return Err(StoreError::ProductNotFound(id));
        }
        for detail in tables.details.values_mut() {
            if detail.product_id == Some(id) {
                detail.product_id = None;
            }
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewOrderDetail;

    fn detail(product: ProductRef) -> NewOrderDetail {
        NewOrderDetail {
            amount: 5,
            price: Decimal::new(755, 2),
            product,
        }
    }

    fn widget() -> ProductRef {
        ProductRef::GetOrCreate {
            id: 1,
            name: "Widget".to_string(),
        }
    }

    fn new_order(external_id: &str, details: Vec<NewOrderDetail>) -> NewOrder {
        NewOrder {
            external_id: external_id.to_string(),
            details,
        }
    }

    const ALL: Page = Page {
        offset: 0,
        limit: 100,
    };

    #[tokio::test]
    async fn test_create_and_get_order() {
        let store = MemoryStore::new();
        let created = store
            .create_order(new_order("X", vec![detail(widget())]))
            .await
            .unwrap();

        assert_eq!(created.id, 1);
        assert_eq!(created.status, OrderStatus::New);
        assert_eq!(created.details.len(), 1);
        assert_eq!(created.details[0].product.as_ref().unwrap().name, "Widget");

        let fetched = store.get_order(created.id).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_create_order_with_missing_product_writes_nothing() {
        let store = MemoryStore::new();
        let result = store
            .create_order(new_order(
                "X",
                vec![detail(widget()), detail(ProductRef::Existing(42))],
            ))
            .await;

        assert!(matches!(result, Err(StoreError::ProductNotFound(42))));
        assert!(matches!(
            store.get_product(1).await,
            Err(StoreError::ProductNotFound(1))
        ));
        let page = store.list_orders(&OrderFilter::default(), ALL).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_same_new_product_in_two_details_created_once() {
        let store = MemoryStore::new();
        let created = store
            .create_order(new_order(
                "X",
                vec![detail(widget()), detail(ProductRef::Existing(1))],
            ))
            .await
            .unwrap();

        assert_eq!(created.details.len(), 2);
        assert_eq!(store.get_product(1).await.unwrap().name, "Widget");
    }

    #[tokio::test]
    async fn test_bare_id_may_precede_its_named_reference() {
        let store = MemoryStore::new();
        let created = store
            .create_order(new_order(
                "X",
                vec![detail(ProductRef::Existing(1)), detail(widget())],
            ))
            .await
            .unwrap();

        assert_eq!(created.details.len(), 2);
        assert!(created.details.iter().all(|d| d.product.is_some()));
    }

    #[tokio::test]
    async fn test_existing_product_keeps_stored_name() {
        let store = MemoryStore::new();
        store.get_or_create_product(1, "Widget").await.unwrap();

        let created = store
            .create_order(new_order(
                "X",
                vec![detail(ProductRef::GetOrCreate {
                    id: 1,
                    name: "Renamed".to_string(),
                })],
            ))
            .await
            .unwrap();

        assert_eq!(created.details[0].product.as_ref().unwrap().name, "Widget");
    }

    #[tokio::test]
    async fn test_save_order_bumps_version_and_detects_conflict() {
        let store = MemoryStore::new();
        let mut order = store
            .create_order(new_order("X", vec![detail(widget())]))
            .await
            .unwrap();

        order.status = OrderStatus::Accepted;
        let saved = store.save_order(&order).await.unwrap();
        assert_eq!(saved.version, order.version + 1);
        assert_eq!(saved.status, OrderStatus::Accepted);

        // Stale copy.
        order.status = OrderStatus::Failed;
        let result = store.save_order(&order).await;
        assert!(matches!(result, Err(StoreError::Conflict { expected: 1, actual: 2, .. })));
        assert_eq!(
            store.get_order(order.id).await.unwrap().status,
            OrderStatus::Accepted
        );
    }

    #[tokio::test]
    async fn test_delete_order_cascades_to_details() {
        let store = MemoryStore::new();
        let order = store
            .create_order(new_order("X", vec![detail(widget()), detail(widget())]))
            .await
            .unwrap();

        store.delete_order(order.id, order.version).await.unwrap();

        assert!(matches!(
            store.get_order(order.id).await,
            Err(StoreError::OrderNotFound(_))
        ));
        assert!(store.tables.read().await.details.is_empty());
        // Products survive order deletion.
        assert!(store.get_product(1).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_order_with_stale_version() {
        let store = MemoryStore::new();
        let order = store
            .create_order(new_order("X", vec![detail(widget())]))
            .await
            .unwrap();
        store.save_order(&order).await.unwrap();

        let result = store.delete_order(order.id, order.version).await;
        assert!(matches!(result, Err(StoreError::Conflict { .. })));
        assert!(store.get_order(order.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_product_nullifies_details() {
        let store = MemoryStore::new();
        let order = store
            .create_order(new_order("X", vec![detail(widget())]))
            .await
            .unwrap();

        store.delete_product(1).await.unwrap();

        let fetched = store.get_order(order.id).await.unwrap();
        assert_eq!(fetched.details.len(), 1);
        assert!(fetched.details[0].product.is_none());

        assert!(matches!(
            store.delete_product(1).await,
            Err(StoreError::ProductNotFound(1))
        ));
    }

    #[tokio::test]
    async fn test_product_names_are_unique() {
        let store = MemoryStore::new();
        let first = store
            .create_product(NewProduct {
                name: "Widget".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(first.id, 1);

        let dup = store
            .create_product(NewProduct {
                name: "Widget".to_string(),
            })
            .await;
        assert!(matches!(dup, Err(StoreError::DuplicateProductName(_))));

        let dup = store.get_or_create_product(5, "Widget").await;
        assert!(matches!(dup, Err(StoreError::DuplicateProductName(_))));

        let second = store
            .create_product(NewProduct {
                name: "Gadget".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(second.id, 2);
    }

    #[tokio::test]
    async fn test_list_orders_filters_and_pages() {
        let store = MemoryStore::new();
        for external_id in ["a", "b", "a", "c", "a"] {
            store
                .create_order(new_order(external_id, vec![detail(widget())]))
                .await
                .unwrap();
        }

        let filter = OrderFilter {
            external_id: Some("a".to_string()),
            status: None,
        };
        let page = store
            .list_orders(&filter, Page { offset: 1, limit: 1 })
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.orders.len(), 1);
        assert_eq!(page.orders[0].id, 3);

        let by_status = OrderFilter {
            external_id: None,
            status: Some(OrderStatus::Accepted),
        };
        let page = store.list_orders(&by_status, ALL).await.unwrap();
        assert_eq!(page.total, 0);

        let beyond = store
            .list_orders(&OrderFilter::default(), Page { offset: 10, limit: 5 })
            .await
            .unwrap();
        assert_eq!(beyond.total, 5);
        assert!(beyond.orders.is_empty());
    }
}
