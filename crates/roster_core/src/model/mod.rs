//! Domain model for procedure-user assignments within a plan.
//!
//! # Responsibility
//! - Define the assignment record, its read projection and the referenced
//!   procedure/user/plan shapes.
//!
//! # Invariants
//! - At most one active (`is_removed=false`) assignment exists per triple.
//! - Removal is a soft-delete state transition; rows are never hard deleted.

pub mod assignment;
pub mod directory;
