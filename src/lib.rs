//! # IdeaBoard votes
//!
//! Optimistic vote counting with rollback and realtime reconciliation.
//!
//! A vote control shows up/down counts for one post or comment and lets the
//! signed-in viewer cast, switch, or toggle off their vote. This crate keeps
//! that display responsive and correct:
//!
//! - **Optimistic**: counts change the moment the vote is clicked
//! - **Rollback**: a rejected mutation restores exactly what was shown before
//! - **Reconciliation**: authoritative counts (re-fetches and realtime pushes)
//!   always overwrite local arithmetic
//!
//! ## Feature Flags
//!
//! - `rest` (default): HTTP backends for the REST API and PostgREST
//! - `realtime` (default): change-feed decoding and per-target fan-out
//!
//! ## Modules
//!
//! - [`core`]: Types, traits, constants, and errors (always included)
//! - [`sync`]: Vote state and the reconciler (always included)
//! - [`client`]: HTTP backends and session (requires `rest` feature)
//! - [`realtime`]: Realtime change handling (requires `realtime` feature)
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ideaboard_votes::prelude::*;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let session = Arc::new(Session::signed_in(UserId::new("user-1"), "access-token"));
//! let backend = Arc::new(ApiBackend::new(&BackendConfig::from_env()?, session.clone())?);
//!
//! let target = VoteTarget::post("post-42")?;
//! let seed = VoteState::new(target, VoteCounts::new(5, 2));
//! let reconciler = VoteReconciler::new(seed, backend, session);
//!
//! match reconciler.cast_vote(VoteDirection::Up).await {
//!     Ok(outcome) => println!("{} up", outcome.state.displayed_up()),
//!     Err(err) => eprintln!("{}", err.user_message().unwrap_or_default()),
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Reconciliation (always included)
pub mod sync;

// HTTP backends (feature-gated)
#[cfg(feature = "rest")]
#[cfg_attr(docsrs, doc(cfg(feature = "rest")))]
pub mod client;

// Realtime layer (feature-gated)
#[cfg(feature = "realtime")]
#[cfg_attr(docsrs, doc(cfg(feature = "realtime")))]
pub mod realtime;

/// Prelude module for convenient imports.
pub mod prelude {
    // Core traits and types
    pub use crate::core::*;

    // Reconciler
    pub use crate::sync::{
        AfterSuccess, CastAction, CastOutcome, PendingPolicy, Phase, ReconcilerConfig,
        SnapshotOutcome, VoteReconciler, VoteState,
    };

    #[cfg(feature = "rest")]
    pub use crate::client::{ApiBackend, BackendConfig, ConfigError, PostgrestBackend, Session};

    #[cfg(feature = "realtime")]
    pub use crate::realtime::{
        ChangeEvent, CountUpdate, PumpExit, RealtimeError, RealtimeHub, Subscription, spawn_pump,
    };
}

// Re-export commonly used items at crate root
pub use crate::core::{BackendError, VoteBackend, VoteDirection, VoteError, VoteTarget, VoteValue};
pub use crate::sync::{VoteReconciler, VoteState};
