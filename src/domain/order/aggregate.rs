use chrono::{DateTime, Utc};

use super::commands::OrderCommand;
use super::errors::OrderError;
use super::events::OrderEvent;
use super::value_objects::{OrderAction, OrderDetail, OrderId, OrderStatus};

// ============================================================================
// Order Aggregate - Lifecycle rules
// ============================================================================
//
// Commands are checked against the transition table of the current status
// and turned into events. Events carry no rules of their own; applying them
// only moves state. The store persists the result with a version check.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    // Identity
    pub id: OrderId,
    /// Bumped by the store on every write; used for compare-and-swap.
    pub version: i64,

    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub external_id: String,
    pub details: Vec<OrderDetail>,
}

impl Order {
    /// Gate a command on the current status and decide the resulting events.
    ///
    /// An empty event list means the command is allowed but changes nothing.
    pub fn handle_command(&self, command: &OrderCommand) -> Result<Vec<OrderEvent>, OrderError> {
        let action = command.action();
        self.ensure_permits(action)?;

        let events = match command {
            OrderCommand::Accept => vec![OrderEvent::StatusChanged {
                from: self.status,
                to: OrderStatus::Accepted,
            }],
            OrderCommand::Fail => vec![OrderEvent::StatusChanged {
                from: self.status,
                to: OrderStatus::Failed,
            }],
            OrderCommand::Update { external_id } => match external_id {
                Some(external_id) if *external_id != self.external_id => {
                    vec![OrderEvent::ExternalIdUpdated {
                        external_id: external_id.clone(),
                    }]
                }
                _ => vec![],
            },
            OrderCommand::Delete => vec![OrderEvent::Deleted],
        };

        Ok(events)
    }

    pub fn apply_event(&mut self, event: &OrderEvent) {
        match event {
            OrderEvent::StatusChanged { to, .. } => {
                self.status = *to;
            }
            OrderEvent::ExternalIdUpdated { external_id } => {
                self.external_id = external_id.clone();
            }
            // Removal is carried out by the store.
            OrderEvent::Deleted => {}
        }
    }

    fn ensure_permits(&self, action: OrderAction) -> Result<(), OrderError> {
        if self.status.permits(action) {
            Ok(())
        } else {
            Err(OrderError::InvalidTransition {
                action,
                status: self.status,
            })
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
