//! Common value types for the SPAN policy agent.
//!
//! This crate provides the type-safe primitives shared by the policy
//! graph model and the session-state engine:
//!
//! - [`Identity`]: hierarchical path naming an object in the policy graph
//! - [`Direction`]: mirror traffic direction for a source membership
//! - [`AdminState`]: administrative state of a mirror session
//! - [`ErspanVersion`]: encapsulation protocol version of a destination

mod admin;
mod direction;
mod erspan;
mod identity;

pub use admin::AdminState;
pub use direction::Direction;
pub use erspan::ErspanVersion;
pub use identity::Identity;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("invalid identity element: {0}")]
    InvalidIdentityElement(String),

    #[error("invalid direction: {0}")]
    InvalidDirection(String),

    #[error("invalid admin state: {0}")]
    InvalidAdminState(String),

    #[error("invalid ERSPAN version: {0}")]
    InvalidErspanVersion(String),
}
