//! Policy graph object model and store interface for the SPAN agent.
//!
//! The policy store is a shared, versioned, graph-structured database
//! populated by a remote controller and by local agents. This crate
//! defines the slice of it the SPAN engine consumes:
//!
//! - [`PolicyObject`] / [`ObjectData`]: the typed object model
//! - [`ObjectType`] / [`RelationKind`]: class and relation taxonomy
//! - [`PolicyStore`]: resolve-by-identity, parent/child traversal, and
//!   per-class change subscription
//! - [`schema`]: the positional identity contract (class-tag path
//!   elements and well-known roots)
//! - [`MemoryPolicyStore`]: a thread-safe in-memory implementation used
//!   by embedders and tests
//!
//! Change notifications carry only `(object type, identity)`; consumers
//! re-resolve live state. Callbacks may arrive on arbitrary threads, at
//! least once per change, with no ordering guarantee across classes.

mod memory;
mod object;
pub mod schema;
mod store;

pub use memory::MemoryPolicyStore;
pub use object::{
    DestinationSummaryData, EndpointGroupData, ForwardingEndpointData, LocalEndpointData,
    MemberReference, ObjectData, ObjectType, PolicyObject, SessionData, SourceMemberData,
};
pub use store::{PolicyListener, PolicyStore, RelationKind};
