use std::fmt;

use super::value_objects::{OrderAction, OrderId, OrderStatus};
use crate::domain::product::ProductId;
use crate::store::StoreError;
use crate::utils::IsTransient;

pub const NOT_NEW_ORDER_STATUS_TEXT: &str = "Only \"new\" status of order could be changed.";
pub const ACCEPTED_ORDER_DELETE_TEXT: &str = "Order with status \"accepted\" could not be deleted.";

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    #[error("{0}")]
    Validation(ValidationErrors),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Cannot {action} order in status: {status}")]
    InvalidTransition {
        action: OrderAction,
        status: OrderStatus,
    },

    #[error("Store failure: {0}")]
    Store(StoreError),
}

impl OrderError {
    /// Caller-facing text for a rejected status-gated operation.
    pub fn transition_message(action: OrderAction) -> &'static str {
        match action {
            OrderAction::Delete => ACCEPTED_ORDER_DELETE_TEXT,
            OrderAction::Accept | OrderAction::Fail | OrderAction::Update => {
                NOT_NEW_ORDER_STATUS_TEXT
            }
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::default();
        errors.add(field, message);
        OrderError::Validation(errors)
    }
}

impl From<StoreError> for OrderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::OrderNotFound(id) => OrderError::NotFound(id),
            StoreError::ProductNotFound(id) => OrderError::ProductNotFound(id),
            StoreError::DuplicateProductName(name) => OrderError::validation(
                "product.name",
                format!("Product with name \"{name}\" already exists."),
            ),
            other => OrderError::Store(other),
        }
    }
}

impl IsTransient for OrderError {
    fn is_transient(&self) -> bool {
        match self {
            OrderError::Store(err) => err.is_transient(),
            _ => false,
        }
    }
}

/// Field errors collected while checking a payload, keyed by field path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: Vec<(String, String)>,
}

impl ValidationErrors {
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields.push((field.into(), message.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// `Ok(value)` when nothing was collected.
    pub fn into_result<T>(self, value: T) -> Result<T, OrderError> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(OrderError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validation failed")?;
        for (i, (field, message)) in self.fields.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{field}: {message}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_display() {
        let mut errors = ValidationErrors::default();
        errors.add("external_id", "This field is required.");
        errors.add("details", "This list may not be empty.");
        assert_eq!(
            errors.to_string(),
            "Validation failed: external_id: This field is required.; details: This list may not be empty."
        );
    }

    #[test]
    fn test_into_result() {
        assert_eq!(ValidationErrors::default().into_result(5).unwrap(), 5);

        let err = OrderError::validation("details", "required").to_string();
        assert!(err.contains("details: required"));
    }

    #[test]
    fn test_store_errors_map_to_domain_errors() {
        assert!(matches!(
            OrderError::from(StoreError::OrderNotFound(9)),
            OrderError::NotFound(9)
        ));
        assert!(matches!(
            OrderError::from(StoreError::ProductNotFound(2)),
            OrderError::ProductNotFound(2)
        ));
        assert!(matches!(
            OrderError::from(StoreError::DuplicateProductName("Widget".into())),
            OrderError::Validation(_)
        ));
        assert!(matches!(
            OrderError::from(StoreError::Backend("boom".into())),
            OrderError::Store(StoreError::Backend(_))
        ));
    }

    #[test]
    fn test_only_store_conflicts_are_transient() {
        let conflict = OrderError::Store(StoreError::Conflict {
            order_id: 1,
            expected: 1,
            actual: 2,
        });
        assert!(conflict.is_transient());
        assert!(!OrderError::NotFound(1).is_transient());
        assert!(!OrderError::InvalidTransition {
            action: OrderAction::Accept,
            status: OrderStatus::Accepted,
        }
        .is_transient());
    }

    #[test]
    fn test_transition_messages() {
        assert_eq!(
            OrderError::transition_message(OrderAction::Accept),
            NOT_NEW_ORDER_STATUS_TEXT
        );
        assert_eq!(
            OrderError::transition_message(OrderAction::Delete),
            ACCEPTED_ORDER_DELETE_TEXT
        );
    }
}
