// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each aggregate has its own subdirectory with:
// - Value objects
// - Events
// - Commands
// - Errors
// - Aggregate implementation
// - Command handler
//
// Products are plain catalog records without a lifecycle, so they only carry
// their data types.
//
// ============================================================================

pub mod order;
pub mod product;
