//! IdeaBoard votes - Core types and traits
//!
//! Identifiers, vote values, count arithmetic, the error taxonomy and the
//! backend seams. This module has no I/O of its own.

mod constants;
mod error;
mod traits;
mod types;

pub use constants::*;
pub use error::*;
pub use traits::*;
pub use types::*;
