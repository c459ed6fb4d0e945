use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;

use crate::domain::product::ProductRef;
use crate::metrics::Metrics;
use crate::store::{NewOrder, OrderStore, StoreError};

use super::aggregate::Order;
use super::errors::OrderError;
use super::validation::parse_create_payload;

// ============================================================================
// Order Composer - creates an order with its nested details
// ============================================================================
//
// 1. Validate the whole payload (no store access).
// 2. Check that every product referenced without a name exists.
// 3. Hand the order to the store, which resolves get-or-create products and
//    writes order + details in one atomic step.
//
// Products named in a detail but missing from the store are created as a
// side effect of order creation.
//
// ============================================================================

pub struct OrderComposer {
    store: Arc<dyn OrderStore>,
    metrics: Arc<Metrics>,
}

impl OrderComposer {
    pub fn new(store: Arc<dyn OrderStore>, metrics: Arc<Metrics>) -> Self {
        Self { store, metrics }
    }

    /// Validate a raw create-order body and persist it.
    pub async fn create(&self, payload: &Value) -> Result<Order, OrderError> {
        let order = parse_create_payload(payload)?;
        self.compose(order).await
    }

    /// Persist an already validated order.
    pub async fn compose(&self, order: NewOrder) -> Result<Order, OrderError> {
        self.check_products(&order).await?;

        let external_id = order.external_id.clone();
        let detail_count = order.details.len();
        let created = self.store.create_order(order).await?;

        self.metrics.record_order_created();
        tracing::info!(
            order_id = created.id,
            external_id = %external_id,
            detail_count = detail_count,
            "✅ Order created"
        );

        Ok(created)
    }

    async fn check_products(&self, order: &NewOrder) -> Result<(), OrderError> {
        // Ids that this same order creates by name count as present.
        let named: BTreeSet<_> = order
            .details
            .iter()
            .filter_map(|detail| match &detail.product {
                ProductRef::GetOrCreate { id, .. } => Some(*id),
                ProductRef::Existing(_) => None,
            })
            .collect();

        let mut checked = BTreeSet::new();
        for detail in &order.details {
            let &ProductRef::Existing(id) = &detail.product else {
                continue;
            };
            if named.contains(&id) || !checked.insert(id) {
                continue;
            }

            match self.store.get_product(id).await {
                Ok(_) => {}
                Err(StoreError::ProductNotFound(missing)) => {
                    tracing::info!(product_id = missing, "Order references unknown product");
                    return Err(OrderError::ProductNotFound(missing));
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
