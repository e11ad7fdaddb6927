//! IdeaBoard votes - Backend clients
//!
//! Two [`VoteBackend`](crate::core::VoteBackend) implementations over HTTP:
//! the REST API ([`ApiBackend`]) and direct PostgREST table access
//! ([`PostgrestBackend`]). Both share one [`Session`] with the reconcilers.

mod api;
mod config;
mod http;
mod postgrest;
mod retry;
mod session;

pub use api::*;
pub use config::*;
pub use postgrest::*;
pub use session::*;
