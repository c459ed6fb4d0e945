use super::value_objects::OrderAction;

// ============================================================================
// Order Commands - Represent caller intent on an existing order
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderCommand {
    Accept,
    Fail,
    /// Only `external_id` is patchable. `None` leaves it as is.
    Update { external_id: Option<String> },
    Delete,
}

impl OrderCommand {
    pub fn action(&self) -> OrderAction {
        match self {
            OrderCommand::Accept => OrderAction::Accept,
            OrderCommand::Fail => OrderAction::Fail,
            OrderCommand::Update { .. } => OrderAction::Update,
            OrderCommand::Delete => OrderAction::Delete,
        }
    }
}
