//! Derived per-session view types.

use serde::{Deserialize, Serialize};
use span_model::{AdminState, Direction, ErspanVersion, Identity};
use std::collections::HashSet;
use std::net::IpAddr;

/// A monitored interface/direction pair contributing traffic to a
/// session.
///
/// Value type: equality and hash cover all three fields, and a session
/// stores its sources as a set, so re-adding an endpoint is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceEndpoint {
    pub name: String,
    pub interface: String,
    pub direction: Direction,
}

impl SourceEndpoint {
    pub fn new(
        name: impl Into<String>,
        interface: impl Into<String>,
        direction: Direction,
    ) -> Self {
        Self {
            name: name.into(),
            interface: interface.into(),
            direction,
        }
    }
}

/// Destination sink of a session.
///
/// Overwritten wholesale each time the session's destination group is
/// reprocessed; absence means the session has no active sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    pub address: IpAddr,
    pub version: ErspanVersion,
}

/// Materialized view of one mirror session.
///
/// Lookups and delete snapshots clone the whole view, so a consumer
/// always observes the result of a single consistent graph traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub identity: Identity,
    pub name: String,
    pub admin_state: AdminState,
    pub destination: Option<Destination>,
    pub src_endpoints: HashSet<SourceEndpoint>,
}

impl SessionState {
    pub fn new(identity: Identity, name: impl Into<String>, admin_state: AdminState) -> Self {
        Self {
            identity,
            name: name.into(),
            admin_state,
            destination: None,
            src_endpoints: HashSet::new(),
        }
    }

    /// Returns true if the session has at least one source endpoint.
    pub fn has_src_endpoints(&self) -> bool {
        !self.src_endpoints.is_empty()
    }

    /// JSON rendering for diagnostics, with graceful fallback.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error":"serialization_failed","message":"{}"}}"#, e))
    }
}
