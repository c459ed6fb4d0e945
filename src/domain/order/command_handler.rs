use std::sync::Arc;

use crate::metrics::Metrics;
use crate::store::{OrderStore, StoreError};
use crate::utils::{retry_on_transient, RetryConfig};

use super::aggregate::Order;
use super::commands::OrderCommand;
use super::errors::OrderError;
use super::events::OrderEvent;
use super::value_objects::OrderId;

// ============================================================================
// Order Command Handler - Lifecycle engine
// ============================================================================
//
// Orchestrates: load Order → Aggregate decides events → Store writes with a
// version check. A lost race surfaces as a store conflict; the whole
// load-decide-write cycle is then repeated against the fresh state, so the
// loser of two concurrent `accept` calls sees `InvalidTransition`.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Updated(Order),
    Deleted(OrderId),
}

pub struct OrderCommandHandler {
    store: Arc<dyn OrderStore>,
    metrics: Arc<Metrics>,
    retry: RetryConfig,
}

impl OrderCommandHandler {
    pub fn new(store: Arc<dyn OrderStore>, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            metrics,
            retry: RetryConfig::conflicts(),
        }
    }

    /// Handle a command against the current state of an order.
    pub async fn handle(
        &self,
        order_id: OrderId,
        command: OrderCommand,
    ) -> Result<CommandOutcome, OrderError> {
        let action = command.action();

        let result = retry_on_transient(self.retry.clone(), |attempt| {
            let command = &command;
            async move { self.attempt(order_id, command, attempt).await }
        })
        .await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(OrderError::InvalidTransition { .. }) => "rejected",
            Err(OrderError::NotFound(_)) => "not_found",
            Err(_) => "error",
        };
        self.metrics.record_command(action.as_str(), outcome);

        if let Err(OrderError::InvalidTransition { status, .. }) = &result {
            tracing::info!(
                order_id = order_id,
                command = %action,
                status = %status,
                "Order command rejected by status gate"
            );
        }

        result
    }

    pub async fn accept(&self, order_id: OrderId) -> Result<Order, OrderError> {
        self.handle_update(order_id, OrderCommand::Accept).await
    }

    pub async fn fail(&self, order_id: OrderId) -> Result<Order, OrderError> {
        self.handle_update(order_id, OrderCommand::Fail).await
    }

    pub async fn update(
        &self,
        order_id: OrderId,
        external_id: Option<String>,
    ) -> Result<Order, OrderError> {
        self.handle_update(order_id, OrderCommand::Update { external_id })
            .await
    }

    pub async fn delete(&self, order_id: OrderId) -> Result<(), OrderError> {
        self.handle(order_id, OrderCommand::Delete).await?;
        Ok(())
    }

    async fn handle_update(
        &self,
        order_id: OrderId,
        command: OrderCommand,
    ) -> Result<Order, OrderError> {
        match self.handle(order_id, command).await? {
            CommandOutcome::Updated(order) => Ok(order),
            CommandOutcome::Deleted(id) => Err(OrderError::NotFound(id)),
        }
    }

    async fn attempt(
        &self,
        order_id: OrderId,
        command: &OrderCommand,
        attempt: u32,
    ) -> Result<CommandOutcome, OrderError> {
        let order = self.store.get_order(order_id).await?;
        let events = order.handle_command(command)?;

        if events.is_empty() {
            return Ok(CommandOutcome::Updated(order));
        }

        let write = if events.contains(&OrderEvent::Deleted) {
            self.store
                .delete_order(order_id, order.version)
                .await
                .map(|()| CommandOutcome::Deleted(order_id))
        } else {
            let mut updated = order.clone();
            for event in &events {
                updated.apply_event(event);
            }
            self.store
                .save_order(&updated)
                .await
                .map(CommandOutcome::Updated)
        };

        match write {
            Ok(outcome) => {
                for event in &events {
                    match event {
                        OrderEvent::StatusChanged { from, to } => tracing::info!(
                            order_id = order_id,
                            event_type = event.event_type(),
                            from = %from,
                            to = %to,
                            "✅ Order status changed"
                        ),
                        _ => tracing::info!(
                            order_id = order_id,
                            event_type = event.event_type(),
                            "✅ Order event persisted"
                        ),
                    }
                }
                Ok(outcome)
            }
            Err(err @ StoreError::Conflict { .. }) => {
                self.metrics.record_conflict(command.action().as_str());
                tracing::warn!(
                    order_id = order_id,
                    attempt = attempt,
                    error = %err,
                    "Order changed concurrently, re-reading"
                );
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderAction, OrderStatus};
    use crate::domain::product::ProductRef;
    use crate::store::{MemoryStore, NewOrder, NewOrderDetail};
    use rust_decimal::Decimal;

    async fn setup() -> (Arc<MemoryStore>, OrderCommandHandler, Order) {
        let store = Arc::new(MemoryStore::new());
        let metrics = Arc::new(Metrics::new().unwrap());
        let handler = OrderCommandHandler::new(store.clone(), metrics);

        let order = store
            .create_order(NewOrder {
                external_id: "test_ext_id".to_string(),
                details: vec![NewOrderDetail {
                    amount: 5,
                    price: Decimal::new(795, 2),
                    product: ProductRef::GetOrCreate {
                        id: 1,
                        name: "Test_product".to_string(),
                    },
                }],
            })
            .await
            .unwrap();

        (store, handler, order)
    }

    #[tokio::test]
    async fn test_accept_persists_status() {
        let (store, handler, order) = setup().await;

        let accepted = handler.accept(order.id).await.unwrap();
        assert_eq!(accepted.status, OrderStatus::Accepted);

        let stored = store.get_order(order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Accepted);
    }

    #[tokio::test]
    async fn test_accept_and_fail_are_effective_once() {
        let (store, handler, order) = setup().await;
        handler.fail(order.id).await.unwrap();
        let before = store.get_order(order.id).await.unwrap();

        for result in [handler.accept(order.id).await, handler.fail(order.id).await] {
            assert!(matches!(
                result,
                Err(OrderError::InvalidTransition {
                    status: OrderStatus::Failed,
                    ..
                })
            ));
        }

        let after = store.get_order(order.id).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_unknown_order_is_not_found() {
        let (_store, handler, _order) = setup().await;

        assert!(matches!(handler.accept(404).await, Err(OrderError::NotFound(404))));
        assert!(matches!(handler.fail(404).await, Err(OrderError::NotFound(404))));
        assert!(matches!(
            handler.update(404, Some("x".to_string())).await,
            Err(OrderError::NotFound(404))
        ));
        assert!(matches!(handler.delete(404).await, Err(OrderError::NotFound(404))));
    }

    #[tokio::test]
    async fn test_update_only_while_new() {
        let (store, handler, order) = setup().await;

        let updated = handler
            .update(order.id, Some("wrong_test_id".to_string()))
            .await
            .unwrap();
        assert_eq!(updated.external_id, "wrong_test_id");
        assert_eq!(updated.details, order.details);
        assert_eq!(updated.created_at, order.created_at);

        handler.accept(order.id).await.unwrap();
        let rejected = handler.update(order.id, Some("again".to_string())).await;
        assert!(matches!(
            rejected,
            Err(OrderError::InvalidTransition {
                action: OrderAction::Update,
                ..
            })
        ));
        assert_eq!(
            store.get_order(order.id).await.unwrap().external_id,
            "wrong_test_id"
        );
    }

    #[tokio::test]
    async fn test_delete_gated_on_accepted() {
        let (store, handler, order) = setup().await;
        handler.accept(order.id).await.unwrap();

        assert!(matches!(
            handler.delete(order.id).await,
            Err(OrderError::InvalidTransition {
                action: OrderAction::Delete,
                status: OrderStatus::Accepted,
            })
        ));
        assert!(store.get_order(order.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_failed_order() {
        let (store, handler, order) = setup().await;
        handler.fail(order.id).await.unwrap();

        handler.delete(order.id).await.unwrap();
        assert!(matches!(
            store.get_order(order.id).await,
            Err(StoreError::OrderNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_accepts_have_one_winner() {
        let (store, handler, order) = setup().await;
        let handler = Arc::new(handler);

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let handler = handler.clone();
            let id = order.id;
            tasks.push(tokio::spawn(async move { handler.accept(id).await }));
        }

        let mut successes = 0;
        let mut rejections = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => successes += 1,
                Err(OrderError::InvalidTransition { .. }) => rejections += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(rejections, 7);
        assert_eq!(
            store.get_order(order.id).await.unwrap().status,
            OrderStatus::Accepted
        );
    }

    #[tokio::test]
    async fn test_accept_races_fail() {
        let (store, handler, order) = setup().await;
        let handler = Arc::new(handler);
        let id = order.id;

        let accept = {
            let handler = handler.clone();
            tokio::spawn(async move { handler.accept(id).await })
        };
        let fail = {
            let handler = handler.clone();
            tokio::spawn(async move { handler.fail(id).await })
        };

        let results = [accept.await.unwrap(), fail.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);

        let final_status = store.get_order(id).await.unwrap().status;
        assert_ne!(final_status, OrderStatus::New);
    }
}
