//! The positional identity contract of the policy graph.
//!
//! Identities alternate class-tag elements with instance names:
//!
//! ```text
//! /SpanUniverse                                          session container
//! /SpanUniverse/SpanSession/<s>                          session
//! /SpanUniverse/SpanSession/<s>/SpanSrcGrp/<g>           source group
//! .../SpanSrcGrp/<g>/SpanSrcMember/<m>                   source member
//! /SpanUniverse/SpanSession/<s>/SpanDstGrp/<g>           destination group
//! .../SpanDstGrp/<g>/SpanDstMember/<m>                   destination member
//! .../SpanDstMember/<m>/SpanDstSummary/<x>               destination summary
//! /SpanUniverse/SpanSession/<s>/SpanLocalEp/<e>          local endpoint
//! /EndpointInventory/FwdEp/<e>                           forwarding endpoint
//! /GroupUniverse/EpGroup/<g>                             endpoint group
//! ```
//!
//! The `SpanLocalEp` element is the marker the engine's back-walk uses
//! to recover a local endpoint's enclosing session identity. The tags
//! are a fixed contract between identity producers and the engine; they
//! are matched literally, never inferred structurally.

use span_model::Identity;

pub const SESSION_CONTAINER: &str = "SpanUniverse";
pub const SESSION_ELEMENT: &str = "SpanSession";
pub const SRC_GROUP_ELEMENT: &str = "SpanSrcGrp";
pub const SRC_MEMBER_ELEMENT: &str = "SpanSrcMember";
pub const DST_GROUP_ELEMENT: &str = "SpanDstGrp";
pub const DST_MEMBER_ELEMENT: &str = "SpanDstMember";
pub const DST_SUMMARY_ELEMENT: &str = "SpanDstSummary";
/// Marker element for the session back-walk.
pub const LOCAL_EP_ELEMENT: &str = "SpanLocalEp";

pub const ENDPOINT_INVENTORY: &str = "EndpointInventory";
pub const FWD_EP_ELEMENT: &str = "FwdEp";
pub const GROUP_UNIVERSE: &str = "GroupUniverse";
pub const EP_GROUP_ELEMENT: &str = "EpGroup";

/// Identity of the session container.
pub fn session_container() -> Identity {
    Identity::root().child(SESSION_CONTAINER)
}

/// Identity of the forwarding endpoint inventory root.
pub fn endpoint_inventory() -> Identity {
    Identity::root().child(ENDPOINT_INVENTORY)
}

/// Identity of the endpoint group universe root.
pub fn group_universe() -> Identity {
    Identity::root().child(GROUP_UNIVERSE)
}

/// Identity of a session.
pub fn session(name: &str) -> Identity {
    session_container().child(SESSION_ELEMENT).child(name)
}

/// Identity of a source group under a session.
pub fn source_group(session_name: &str, group: &str) -> Identity {
    session(session_name).child(SRC_GROUP_ELEMENT).child(group)
}

/// Identity of a source member under a source group.
pub fn source_member(session_name: &str, group: &str, member: &str) -> Identity {
    source_group(session_name, group)
        .child(SRC_MEMBER_ELEMENT)
        .child(member)
}

/// Identity of a destination group under a session.
pub fn destination_group(session_name: &str, group: &str) -> Identity {
    session(session_name).child(DST_GROUP_ELEMENT).child(group)
}

/// Identity of a destination member under a destination group.
pub fn destination_member(session_name: &str, group: &str, member: &str) -> Identity {
    destination_group(session_name, group)
        .child(DST_MEMBER_ELEMENT)
        .child(member)
}

/// Identity of the destination summary under a destination member.
pub fn destination_summary(session_name: &str, group: &str, member: &str) -> Identity {
    destination_member(session_name, group, member)
        .child(DST_SUMMARY_ELEMENT)
        .child("summary")
}

/// Identity of a local endpoint under a session.
pub fn local_endpoint(session_name: &str, name: &str) -> Identity {
    session(session_name).child(LOCAL_EP_ELEMENT).child(name)
}

/// Identity of a forwarding endpoint.
pub fn forwarding_endpoint(name: &str) -> Identity {
    endpoint_inventory().child(FWD_EP_ELEMENT).child(name)
}

/// Identity of an endpoint group.
pub fn endpoint_group(name: &str) -> Identity {
    group_universe().child(EP_GROUP_ELEMENT).child(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_paths() {
        assert_eq!(
            session("sess1").to_string(),
            "/SpanUniverse/SpanSession/sess1"
        );
        assert_eq!(
            source_member("sess1", "g1", "m1").to_string(),
            "/SpanUniverse/SpanSession/sess1/SpanSrcGrp/g1/SpanSrcMember/m1"
        );
        assert_eq!(
            local_endpoint("sess1", "lep1").to_string(),
            "/SpanUniverse/SpanSession/sess1/SpanLocalEp/lep1"
        );
    }

    #[test]
    fn test_inventory_paths() {
        assert_eq!(
            forwarding_endpoint("ep-a").to_string(),
            "/EndpointInventory/FwdEp/ep-a"
        );
        assert_eq!(
            endpoint_group("epg1").to_string(),
            "/GroupUniverse/EpGroup/epg1"
        );
    }

    #[test]
    fn test_local_endpoint_contains_marker() {
        let lep = local_endpoint("sess1", "lep1");
        assert!(lep.elements().iter().any(|e| e == LOCAL_EP_ELEMENT));
    }
}
