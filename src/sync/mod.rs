//! IdeaBoard votes - Reconciliation layer
//!
//! Implements:
//! - Optimistic vote transitions with exact rollback
//! - Last-writer-wins and versioned reconciliation of authoritative counts
//! - Operation and generation tracking
//! - Optional per-target single-flight

mod reconciler;
mod state;
mod tracker;

pub use reconciler::*;
pub use state::*;
pub use tracker::*;
