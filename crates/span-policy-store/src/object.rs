//! Typed policy graph objects.

use serde::{Deserialize, Serialize};
use span_model::{AdminState, Direction, ErspanVersion, Identity};
use std::fmt;
use std::net::IpAddr;

/// Class of a policy graph object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    /// Container holding all mirror sessions.
    SessionContainer,
    /// A configured mirror session.
    Session,
    /// Group of source memberships under a session.
    SourceGroup,
    /// One source membership; carries the direction and a reference to
    /// either an endpoint group or a local endpoint.
    SourceMember,
    /// Group of destination memberships under a session.
    DestinationGroup,
    /// One destination membership.
    DestinationMember,
    /// Destination sink parameters (IP address, ERSPAN version).
    DestinationSummary,
    /// Policy-layer endpoint descriptor under a session, referencing a
    /// forwarding endpoint.
    LocalEndpoint,
    /// Concrete data-plane endpoint with an interface name and optional
    /// group membership.
    ForwardingEndpoint,
    /// Named collection of forwarding endpoints.
    EndpointGroup,
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectType::SessionContainer => "session-container",
            ObjectType::Session => "session",
            ObjectType::SourceGroup => "source-group",
            ObjectType::SourceMember => "source-member",
            ObjectType::DestinationGroup => "destination-group",
            ObjectType::DestinationMember => "destination-member",
            ObjectType::DestinationSummary => "destination-summary",
            ObjectType::LocalEndpoint => "local-endpoint",
            ObjectType::ForwardingEndpoint => "forwarding-endpoint",
            ObjectType::EndpointGroup => "endpoint-group",
        };
        write!(f, "{}", s)
    }
}

/// Session payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub name: String,
    pub admin_state: AdminState,
}

/// Reference carried by a source membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberReference {
    /// Class of the referenced object; only `EndpointGroup` and
    /// `LocalEndpoint` targets participate in source resolution.
    pub target_class: ObjectType,
    pub target: Identity,
}

/// Source membership payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMemberData {
    pub direction: Direction,
    pub reference: Option<MemberReference>,
}

/// Destination sink payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationSummaryData {
    pub address: IpAddr,
    pub version: ErspanVersion,
}

/// Local endpoint payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalEndpointData {
    pub name: String,
    /// Identity of the forwarding endpoint this descriptor resolves to,
    /// once known.
    pub target: Option<Identity>,
}

/// Forwarding endpoint payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardingEndpointData {
    pub name: String,
    pub interface: String,
    /// Endpoint group this endpoint currently belongs to, if any.
    pub group: Option<Identity>,
}

/// Endpoint group payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointGroupData {
    pub name: String,
}

/// Per-class payload of a policy object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectData {
    SessionContainer,
    Session(SessionData),
    SourceGroup,
    SourceMember(SourceMemberData),
    DestinationGroup,
    DestinationMember,
    DestinationSummary(DestinationSummaryData),
    LocalEndpoint(LocalEndpointData),
    ForwardingEndpoint(ForwardingEndpointData),
    EndpointGroup(EndpointGroupData),
}

impl ObjectData {
    /// Returns the class of this payload.
    pub fn object_type(&self) -> ObjectType {
        match self {
            ObjectData::SessionContainer => ObjectType::SessionContainer,
            ObjectData::Session(_) => ObjectType::Session,
            ObjectData::SourceGroup => ObjectType::SourceGroup,
            ObjectData::SourceMember(_) => ObjectType::SourceMember,
            ObjectData::DestinationGroup => ObjectType::DestinationGroup,
            ObjectData::DestinationMember => ObjectType::DestinationMember,
            ObjectData::DestinationSummary(_) => ObjectType::DestinationSummary,
            ObjectData::LocalEndpoint(_) => ObjectType::LocalEndpoint,
            ObjectData::ForwardingEndpoint(_) => ObjectType::ForwardingEndpoint,
            ObjectData::EndpointGroup(_) => ObjectType::EndpointGroup,
        }
    }
}

/// A resolved policy graph object: identity plus typed payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyObject {
    pub identity: Identity,
    pub data: ObjectData,
}

impl PolicyObject {
    pub fn new(identity: Identity, data: ObjectData) -> Self {
        Self { identity, data }
    }

    /// Returns the class of this object.
    pub fn object_type(&self) -> ObjectType {
        self.data.object_type()
    }

    pub fn as_session(&self) -> Option<&SessionData> {
        match &self.data {
            ObjectData::Session(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_source_member(&self) -> Option<&SourceMemberData> {
        match &self.data {
            ObjectData::SourceMember(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_destination_summary(&self) -> Option<&DestinationSummaryData> {
        match &self.data {
            ObjectData::DestinationSummary(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_local_endpoint(&self) -> Option<&LocalEndpointData> {
        match &self.data {
            ObjectData::LocalEndpoint(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_forwarding_endpoint(&self) -> Option<&ForwardingEndpointData> {
        match &self.data {
            ObjectData::ForwardingEndpoint(data) => Some(data),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_type_of_payload() {
        let obj = PolicyObject::new(
            "/SpanUniverse/SpanSession/s1".parse().unwrap(),
            ObjectData::Session(SessionData {
                name: "s1".to_string(),
                admin_state: AdminState::Enabled,
            }),
        );
        assert_eq!(obj.object_type(), ObjectType::Session);
        assert!(obj.as_session().is_some());
        assert!(obj.as_local_endpoint().is_none());
    }
}
