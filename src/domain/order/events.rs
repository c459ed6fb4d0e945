use super::value_objects::OrderStatus;

// ============================================================================
// Order Events - Facts decided by the aggregate, applied by the store
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderEvent {
    StatusChanged { from: OrderStatus, to: OrderStatus },
    ExternalIdUpdated { external_id: String },
    Deleted,
}

impl OrderEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::StatusChanged { to: OrderStatus::Accepted, .. } => "OrderAccepted",
            OrderEvent::StatusChanged { to: OrderStatus::Failed, .. } => "OrderFailed",
            OrderEvent::StatusChanged { .. } => "OrderStatusChanged",
            OrderEvent::ExternalIdUpdated { .. } => "OrderExternalIdUpdated",
            OrderEvent::Deleted => "OrderDeleted",
        }
    }
}
