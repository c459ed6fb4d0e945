// ============================================================================
// Order Domain - Business Logic for the Order Aggregate
// ============================================================================
//
// This module contains ALL Order-specific code:
// - Value objects (OrderStatus, OrderAction, OrderDetail, price rules)
// - Events (StatusChanged, ExternalIdUpdated, Deleted)
// - Commands (Accept, Fail, Update, Delete)
// - Errors (OrderError enum)
// - Aggregate (Order with the status gate)
// - Command Handler (lifecycle engine over the store)
// - Validation + Composition (creating an order with nested details)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod command_handler;
pub mod validation;
pub mod composition;

// Re-export for convenience
pub use value_objects::*;
pub use errors::*;
pub use aggregate::*;
pub use command_handler::*;
pub use validation::*;
pub use composition::*;
