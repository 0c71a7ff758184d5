//! Store interface consumed by the SPAN engine.

use crate::object::{ObjectType, PolicyObject};
use crate::schema;
use span_model::Identity;
use std::sync::Arc;

/// A parent-to-child relation in the policy graph.
///
/// Each relation knows the class-tag path element its children sit
/// under and the class of those children, so stores can enumerate a
/// relation with a subtree scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// Container -> sessions.
    Sessions,
    /// Session -> source groups.
    SourceGroups,
    /// Source group -> source members.
    SourceMembers,
    /// Session -> destination groups.
    DestinationGroups,
    /// Destination group -> destination members.
    DestinationMembers,
    /// Destination member -> destination summaries.
    DestinationSummaries,
    /// Session -> local endpoints.
    LocalEndpoints,
    /// Inventory root -> forwarding endpoints.
    ForwardingEndpoints,
    /// Group universe root -> endpoint groups.
    EndpointGroups,
}

impl RelationKind {
    /// Class-tag path element children of this relation sit under.
    pub const fn element(&self) -> &'static str {
        match self {
            RelationKind::Sessions => schema::SESSION_ELEMENT,
            RelationKind::SourceGroups => schema::SRC_GROUP_ELEMENT,
            RelationKind::SourceMembers => schema::SRC_MEMBER_ELEMENT,
            RelationKind::DestinationGroups => schema::DST_GROUP_ELEMENT,
            RelationKind::DestinationMembers => schema::DST_MEMBER_ELEMENT,
            RelationKind::DestinationSummaries => schema::DST_SUMMARY_ELEMENT,
            RelationKind::LocalEndpoints => schema::LOCAL_EP_ELEMENT,
            RelationKind::ForwardingEndpoints => schema::FWD_EP_ELEMENT,
            RelationKind::EndpointGroups => schema::EP_GROUP_ELEMENT,
        }
    }

    /// Class of the children this relation resolves to.
    pub const fn child_type(&self) -> ObjectType {
        match self {
            RelationKind::Sessions => ObjectType::Session,
            RelationKind::SourceGroups => ObjectType::SourceGroup,
            RelationKind::SourceMembers => ObjectType::SourceMember,
            RelationKind::DestinationGroups => ObjectType::DestinationGroup,
            RelationKind::DestinationMembers => ObjectType::DestinationMember,
            RelationKind::DestinationSummaries => ObjectType::DestinationSummary,
            RelationKind::LocalEndpoints => ObjectType::LocalEndpoint,
            RelationKind::ForwardingEndpoints => ObjectType::ForwardingEndpoint,
            RelationKind::EndpointGroups => ObjectType::EndpointGroup,
        }
    }
}

/// Change-notification callback registered with the store.
///
/// Invoked on arbitrary threads, at least once per change, with no
/// ordering guarantee across object types. The callback receives only
/// the class and identity; consumers re-resolve live state.
pub trait PolicyListener: Send + Sync {
    fn object_updated(&self, object_type: ObjectType, identity: &Identity);
}

/// The policy graph store as consumed by the SPAN engine.
///
/// All accesses are synchronous, cache-resident lookups; `resolve`
/// returns a snapshot of the object or absence, never an error.
pub trait PolicyStore: Send + Sync {
    /// Resolves an object by identity.
    fn resolve(&self, identity: &Identity) -> Option<PolicyObject>;

    /// Enumerates the children of `parent` along `kind`.
    fn resolve_children(&self, parent: &Identity, kind: RelationKind) -> Vec<PolicyObject>;

    /// Registers a listener for changes to objects of `object_type`.
    fn register_listener(&self, object_type: ObjectType, listener: Arc<dyn PolicyListener>);

    /// Unregisters a previously registered listener instance.
    fn unregister_listener(&self, object_type: ObjectType, listener: &Arc<dyn PolicyListener>);
}
