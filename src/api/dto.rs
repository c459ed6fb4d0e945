use serde::Serialize;

use crate::domain::order::{Order, OrderDetail, OrderDetailId, OrderId, OrderStatus, PRICE_SCALE};
use crate::domain::product::{Product, ProductId};

/// Textual form of `created_at` in responses (day-month-year, UTC).
pub const CREATED_AT_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub status: OrderStatus,
    pub created_at: String,
    pub external_id: String,
    pub details: Vec<OrderDetailResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderDetailResponse {
    pub id: OrderDetailId,
    pub amount: i32,
    pub price: String,
    /// Null once the product has been deleted.
    pub product: Option<ProductResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductResponse {
    pub id: ProductId,
    pub name: String,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            status: order.status,
            created_at: order.created_at.format(CREATED_AT_FORMAT).to_string(),
            external_id: order.external_id.clone(),
            details: order.details.iter().map(OrderDetailResponse::from).collect(),
        }
    }
}

impl From<&OrderDetail> for OrderDetailResponse {
    fn from(detail: &OrderDetail) -> Self {
        let mut price = detail.price;
        price.rescale(PRICE_SCALE);

        Self {
            id: detail.id,
            amount: detail.amount,
            price: price.to_string(),
            product: detail.product.as_ref().map(ProductResponse::from),
        }
    }
}

impl From<&Product> for ProductResponse {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
        }
    }
}
