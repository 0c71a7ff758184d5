//! SPAN session-state synchronization engine.
//!
//! This crate keeps a materialized per-session view (admin state,
//! destination, deduplicated source-endpoint set) in sync with a
//! graph-structured policy store, and notifies downstream renderers of
//! changes.
//!
//! # Architecture
//!
//! ```text
//! [policy store] ──change events──> [SpanOrch]
//!                                      │  graph resolution under one
//!                                      │  state lock; deferred index
//!                                      │  for unresolved targets
//!                                      ↓
//!                               [keyed dispatcher] ──> [SpanListener]s
//! ```
//!
//! Change events arrive on arbitrary threads, independently and in any
//! order. Every broken link silently aborts the current derivation; a
//! later event retries, so the view is eventually consistent with the
//! store. Notifications are delivered off-thread, FIFO per session
//! identity, and any state a listener observes reflects a single
//! consistent traversal.

mod deferred;
mod dispatch;
mod orch;
mod types;

pub use deferred::DeferredEndpointIndex;
pub use dispatch::SpanListener;
pub use orch::{SpanOrch, SpanOrchConfig, SpanOrchStats};
pub use types::{Destination, SessionState, SourceEndpoint};
