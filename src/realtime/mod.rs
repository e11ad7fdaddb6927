//! IdeaBoard votes - Realtime layer
//!
//! Decodes backend row-change documents and fans them out to the
//! reconcilers of displayed targets.

mod event;
mod hub;
mod pump;

pub use event::*;
pub use hub::*;
pub use pump::*;
