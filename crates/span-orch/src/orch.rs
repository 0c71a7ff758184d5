//! SPAN session-state orchestration logic.

use crate::deferred::DeferredEndpointIndex;
use crate::dispatch::{KeyedTaskQueue, ListenerRegistry, SpanListener};
use crate::types::{Destination, SessionState, SourceEndpoint};
use parking_lot::Mutex;
use span_model::{Direction, Identity};
use span_policy_store::{
    schema, LocalEndpointData, ObjectType, PolicyListener, PolicyObject, PolicyStore, RelationKind,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Object types the engine subscribes to. Container changes announce
/// session creation; deletion and modification arrive on the session
/// itself.
const WATCHED_TYPES: [ObjectType; 4] = [
    ObjectType::SessionContainer,
    ObjectType::Session,
    ObjectType::LocalEndpoint,
    ObjectType::ForwardingEndpoint,
];

#[derive(Debug, Clone)]
pub struct SpanOrchConfig {
    /// Root under which sessions are enumerated on container changes.
    pub session_container: Identity,
    /// Root under which forwarding endpoints are enumerated for group
    /// membership resolution.
    pub endpoint_inventory: Identity,
}

impl Default for SpanOrchConfig {
    fn default() -> Self {
        Self {
            session_container: schema::session_container(),
            endpoint_inventory: schema::endpoint_inventory(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpanOrchStats {
    pub events_processed: u64,
    pub sessions_materialized: u64,
    pub sessions_removed: u64,
    pub endpoints_added: u64,
    pub deferred_inserted: u64,
    pub deferred_replayed: u64,
}

/// Engine state guarded by the single state mutex.
///
/// The notify sets are per-event batches: populated while an event
/// mutates the maps, drained into the dispatcher before the lock is
/// released.
#[derive(Default)]
struct SpanState {
    sessions: HashMap<Identity, SessionState>,
    deferred: DeferredEndpointIndex,
    notify_update: HashSet<Identity>,
    notify_delete: Vec<SessionState>,
    stats: SpanOrchStats,
}

/// The session-state synchronization engine.
///
/// Receives per-class change events from the policy store on arbitrary
/// threads, incrementally recomputes the per-session derived view, and
/// fans out non-blocking notifications to registered listeners.
///
/// All mutation runs under one exclusive state lock, taken once per
/// event at the adapter entry point; the graph-walk helpers below it
/// are lock-free and receive `&mut SpanState`. Notification tasks are
/// submitted while the lock is still held, so submission order for one
/// identity matches mutation order; delivery happens on dispatcher
/// workers and never stalls the event thread.
pub struct SpanOrch<S: PolicyStore> {
    store: Arc<S>,
    config: SpanOrchConfig,
    state: Mutex<SpanState>,
    registry: Arc<ListenerRegistry>,
    queue: KeyedTaskQueue,
}

impl<S: PolicyStore + 'static> SpanOrch<S> {
    /// Creates an engine over `store`, dispatching notifications on
    /// `runtime`'s blocking pool.
    pub fn new(store: Arc<S>, config: SpanOrchConfig, runtime: Handle) -> Self {
        Self {
            store,
            config,
            state: Mutex::new(SpanState::default()),
            registry: Arc::new(ListenerRegistry::default()),
            queue: KeyedTaskQueue::new(runtime),
        }
    }

    /// Subscribes to the watched object types.
    pub fn start(self: &Arc<Self>) {
        debug!("starting span orch");
        for object_type in WATCHED_TYPES {
            self.store
                .register_listener(object_type, Arc::clone(self) as Arc<dyn PolicyListener>);
        }
    }

    /// Unsubscribes from the store. In-flight notifications still
    /// drain; see [`SpanOrch::shutdown`].
    pub fn stop(self: &Arc<Self>) {
        let listener: Arc<dyn PolicyListener> = Arc::clone(self) as Arc<dyn PolicyListener>;
        for object_type in WATCHED_TYPES {
            self.store.unregister_listener(object_type, &listener);
        }
    }

    /// Re-enumerates sessions from the configured container root, as if
    /// a container change had been delivered. Picks up sessions written
    /// before the engine subscribed.
    pub fn resync(&self) {
        let container = self.config.session_container.clone();
        self.handle_object_updated(ObjectType::SessionContainer, &container);
    }

    /// Stops accepting notification tasks and waits for queued
    /// deliveries to finish.
    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
    }

    pub fn register_listener(&self, listener: Arc<dyn SpanListener>) {
        self.registry.register(listener);
    }

    pub fn unregister_listener(&self, listener: &Arc<dyn SpanListener>) {
        self.registry.unregister(listener);
    }

    /// Synchronous read of the live derived view.
    pub fn lookup_session(&self, identity: &Identity) -> Option<SessionState> {
        self.state.lock().sessions.get(identity).cloned()
    }

    pub fn session_exists(&self, identity: &Identity) -> bool {
        self.state.lock().sessions.contains_key(identity)
    }

    pub fn session_count(&self) -> usize {
        self.state.lock().sessions.len()
    }

    /// Number of local endpoints waiting on unresolved targets.
    pub fn deferred_pending(&self) -> usize {
        self.state.lock().deferred.len()
    }

    pub fn stats(&self) -> SpanOrchStats {
        self.state.lock().stats.clone()
    }

    fn handle_object_updated(&self, object_type: ObjectType, identity: &Identity) {
        let mut state = self.state.lock();
        state.stats.events_processed += 1;
        match object_type {
            ObjectType::SessionContainer => self.on_container_updated(&mut state, identity),
            ObjectType::Session => self.on_session_updated(&mut state, identity),
            ObjectType::LocalEndpoint => self.on_local_endpoint_updated(&mut state, identity),
            ObjectType::ForwardingEndpoint => {
                self.on_forwarding_endpoint_updated(&mut state, identity)
            }
            other => debug!(class = %other, "ignoring unwatched class"),
        }
        self.drain_notifications(&mut state);
    }

    /// Submits one task per affected identity, then clears the batch.
    /// Runs before the state lock is released, so same-identity
    /// submission order follows mutation order across events.
    fn drain_notifications(&self, state: &mut SpanState) {
        for identity in std::mem::take(&mut state.notify_update) {
            let registry = Arc::clone(&self.registry);
            let key = identity.to_string();
            self.queue
                .dispatch(&key, move || registry.notify_updated(&identity));
        }
        for snapshot in std::mem::take(&mut state.notify_delete) {
            let registry = Arc::clone(&self.registry);
            let key = snapshot.identity.to_string();
            self.queue
                .dispatch(&key, move || registry.notify_deleted(&snapshot));
        }
    }

    fn on_container_updated(&self, state: &mut SpanState, identity: &Identity) {
        if self.store.resolve(identity).is_none() {
            debug!(container = %identity, "session container not resolvable");
            return;
        }
        for session in self.store.resolve_children(identity, RelationKind::Sessions) {
            if !state.sessions.contains_key(&session.identity) {
                debug!(session = %session.identity, "creating session");
                self.process_session(state, &session);
            }
            state.notify_update.insert(session.identity.clone());
        }
    }

    fn on_session_updated(&self, state: &mut SpanState, identity: &Identity) {
        match self.store.resolve(identity) {
            Some(session) => {
                debug!(session = %identity, "update on session");
                self.process_session(state, &session);
                state.notify_update.insert(identity.clone());
            }
            None => {
                debug!(session = %identity, "session removed");
                if let Some(snapshot) = state.sessions.remove(identity) {
                    state.stats.sessions_removed += 1;
                    state.notify_delete.push(snapshot);
                }
            }
        }
    }

    fn on_local_endpoint_updated(&self, state: &mut SpanState, identity: &Identity) {
        if self.store.resolve(identity).is_none() {
            debug!(endpoint = %identity, "local endpoint not resolvable");
            return;
        }
        let Some(session_identity) = session_for_local_endpoint(identity) else {
            warn!(endpoint = %identity, "local endpoint identity missing session marker");
            return;
        };
        let Some(direction) = self.find_source_member_direction(&session_identity, identity)
        else {
            debug!(endpoint = %identity, "no source membership for local endpoint");
            return;
        };
        self.process_local_endpoint(state, identity, direction);
    }

    fn on_forwarding_endpoint_updated(&self, state: &mut SpanState, identity: &Identity) {
        let Some(endpoint) = self.store.resolve(identity) else {
            debug!(endpoint = %identity, "forwarding endpoint not resolvable");
            return;
        };
        let Some(endpoint_data) = endpoint.as_forwarding_endpoint() else {
            warn!(endpoint = %identity, "object is not a forwarding endpoint");
            return;
        };

        if let Some(waiter) = state.deferred.waiter(identity).cloned() {
            self.replay_deferred(state, identity, &waiter, &endpoint);
        } else {
            // No pending match: the endpoint's group may be a source
            // member of a tracked session.
            let Some(group) = endpoint_data.group.clone() else {
                warn!(endpoint = %identity, "group has not been set for forwarding endpoint");
                return;
            };
            self.process_group_membership(state, &group);
        }
    }

    /// Replays a deferred local endpoint once its target materializes.
    /// The index entry is consumed only on success; an aborted replay
    /// leaves it for a later event.
    fn replay_deferred(
        &self,
        state: &mut SpanState,
        target: &Identity,
        waiter: &Identity,
        endpoint: &PolicyObject,
    ) {
        let Some(local_ep) = self.store.resolve(waiter) else {
            debug!(endpoint = %waiter, "deferred local endpoint no longer resolvable");
            return;
        };
        let Some(local_data) = local_ep.as_local_endpoint() else {
            warn!(endpoint = %waiter, "object is not a local endpoint");
            return;
        };
        let Some(session_identity) = session_for_local_endpoint(waiter) else {
            warn!(endpoint = %waiter, "deferred local endpoint missing session marker");
            return;
        };
        if !state.sessions.contains_key(&session_identity) {
            debug!(session = %session_identity, "session for deferred endpoint not tracked");
            return;
        }
        let Some(direction) = self.find_source_member_direction(&session_identity, waiter) else {
            debug!(endpoint = %waiter, "no source membership for deferred endpoint");
            return;
        };
        if self.add_endpoint(state, waiter, local_data, endpoint, direction) {
            state.deferred.remove(target);
            state.stats.deferred_replayed += 1;
            debug!(target = %target, endpoint = %waiter, "replayed deferred endpoint");
        }
    }

    /// Rebuilds the derived view of one session from the graph.
    fn process_session(&self, state: &mut SpanState, session: &PolicyObject) {
        let Some(data) = session.as_session() else {
            warn!(identity = %session.identity, "object is not a session");
            return;
        };
        let identity = session.identity.clone();
        state.sessions.insert(
            identity.clone(),
            SessionState::new(identity.clone(), data.name.clone(), data.admin_state),
        );
        state.stats.sessions_materialized += 1;

        for group in self
            .store
            .resolve_children(&identity, RelationKind::SourceGroups)
        {
            self.process_source_group(state, &identity, &group.identity);
        }
        for group in self
            .store
            .resolve_children(&identity, RelationKind::DestinationGroups)
        {
            self.process_destination_group(state, &identity, &group.identity);
        }
    }

    fn process_source_group(
        &self,
        state: &mut SpanState,
        session_identity: &Identity,
        group_identity: &Identity,
    ) {
        for member in self
            .store
            .resolve_children(group_identity, RelationKind::SourceMembers)
        {
            let Some(data) = member.as_source_member() else {
                continue;
            };
            let Some(reference) = &data.reference else {
                debug!(member = %member.identity, "source member has no reference");
                continue;
            };
            match reference.target_class {
                ObjectType::EndpointGroup => self.process_endpoint_group(
                    state,
                    session_identity,
                    &reference.target,
                    data.direction,
                ),
                ObjectType::LocalEndpoint => {
                    self.process_local_endpoint(state, &reference.target, data.direction)
                }
                other => {
                    debug!(class = %other, member = %member.identity, "unsupported source member target class")
                }
            }
        }
    }

    fn process_destination_group(
        &self,
        state: &mut SpanState,
        session_identity: &Identity,
        group_identity: &Identity,
    ) {
        for member in self
            .store
            .resolve_children(group_identity, RelationKind::DestinationMembers)
        {
            for summary in self
                .store
                .resolve_children(&member.identity, RelationKind::DestinationSummaries)
            {
                let Some(data) = summary.as_destination_summary() else {
                    continue;
                };
                if let Some(session) = state.sessions.get_mut(session_identity) {
                    session.destination = Some(Destination {
                        address: data.address,
                        version: data.version,
                    });
                }
            }
        }
    }

    /// Adds every forwarding endpoint currently in `group_identity` as
    /// a source of `session_identity`, with the membership direction.
    fn process_endpoint_group(
        &self,
        state: &mut SpanState,
        session_identity: &Identity,
        group_identity: &Identity,
        direction: Direction,
    ) {
        if self.store.resolve(group_identity).is_none() {
            debug!(group = %group_identity, "endpoint group not found");
            return;
        }
        let members = self.forwarding_endpoints_in_group(group_identity);
        if members.is_empty() {
            debug!(group = %group_identity, "no forwarding endpoints in group");
            return;
        }
        for endpoint in members {
            let Some(data) = endpoint.as_forwarding_endpoint() else {
                continue;
            };
            self.add_source_endpoint(
                state,
                session_identity,
                SourceEndpoint::new(data.name.clone(), data.interface.clone(), direction),
            );
        }
    }

    /// Resolves a directly referenced local endpoint to its forwarding
    /// target; defers on absence.
    fn process_local_endpoint(
        &self,
        state: &mut SpanState,
        lep_identity: &Identity,
        direction: Direction,
    ) {
        let Some(local_ep) = self.store.resolve(lep_identity) else {
            debug!(endpoint = %lep_identity, "local endpoint not resolvable");
            return;
        };
        let Some(data) = local_ep.as_local_endpoint() else {
            warn!(endpoint = %lep_identity, "object is not a local endpoint");
            return;
        };
        let Some(target) = &data.target else {
            debug!(endpoint = %lep_identity, "local endpoint has no forwarding target");
            return;
        };
        match self.store.resolve(target) {
            Some(endpoint) => {
                self.add_endpoint(state, lep_identity, data, &endpoint, direction);
            }
            None => {
                debug!(target = %target, endpoint = %lep_identity, "forwarding target unresolved; deferring");
                if state.deferred.insert(target.clone(), lep_identity.clone()) {
                    state.stats.deferred_inserted += 1;
                }
            }
        }
    }

    /// Adds a resolved local/forwarding endpoint pair to its enclosing
    /// session. Returns false if the walk or the session lookup fails.
    fn add_endpoint(
        &self,
        state: &mut SpanState,
        lep_identity: &Identity,
        local_data: &LocalEndpointData,
        endpoint: &PolicyObject,
        direction: Direction,
    ) -> bool {
        let Some(session_identity) = session_for_local_endpoint(lep_identity) else {
            warn!(endpoint = %lep_identity, "local endpoint identity missing session marker");
            return false;
        };
        if !state.sessions.contains_key(&session_identity) {
            debug!(session = %session_identity, "session not tracked");
            return false;
        }
        let Some(endpoint_data) = endpoint.as_forwarding_endpoint() else {
            warn!(endpoint = %endpoint.identity, "object is not a forwarding endpoint");
            return false;
        };
        self.add_source_endpoint(
            state,
            &session_identity,
            SourceEndpoint::new(
                local_data.name.clone(),
                endpoint_data.interface.clone(),
                direction,
            ),
        );
        true
    }

    /// Inserts a source endpoint into its session's set and marks the
    /// session to-notify. Idempotent; never removes existing entries.
    fn add_source_endpoint(
        &self,
        state: &mut SpanState,
        session_identity: &Identity,
        endpoint: SourceEndpoint,
    ) {
        let Some(session) = state.sessions.get_mut(session_identity) else {
            debug!(session = %session_identity, "session not tracked");
            return;
        };
        debug!(session = %session_identity, endpoint = %endpoint.name, "adding source endpoint");
        if session.src_endpoints.insert(endpoint) {
            state.stats.endpoints_added += 1;
        }
        state.notify_update.insert(session_identity.clone());
    }

    /// Discovers whether `group` is a source member of any tracked
    /// session: linear scan over tracked sessions, their source-group
    /// memberships, and member references. There is no index on the
    /// group side; sessions are a low-cardinality operator-configured
    /// feature.
    fn process_group_membership(&self, state: &mut SpanState, group: &Identity) {
        let mut matches: Vec<(Identity, Direction)> = Vec::new();
        for session_identity in state.sessions.keys() {
            for source_group in self
                .store
                .resolve_children(session_identity, RelationKind::SourceGroups)
            {
                for member in self
                    .store
                    .resolve_children(&source_group.identity, RelationKind::SourceMembers)
                {
                    let Some(data) = member.as_source_member() else {
                        continue;
                    };
                    if let Some(reference) = &data.reference {
                        if reference.target_class == ObjectType::EndpointGroup
                            && &reference.target == group
                        {
                            matches.push((session_identity.clone(), data.direction));
                        }
                    }
                }
            }
        }
        if matches.is_empty() {
            debug!(group = %group, "group is not a source member of any tracked session");
            return;
        }
        for (session_identity, direction) in matches {
            debug!(session = %session_identity, group = %group, "found session for group");
            self.process_endpoint_group(state, &session_identity, group, direction);
        }
    }

    /// Finds the direction of the source membership referencing
    /// `target` under `session_identity`.
    fn find_source_member_direction(
        &self,
        session_identity: &Identity,
        target: &Identity,
    ) -> Option<Direction> {
        self.store.resolve(session_identity)?;
        for group in self
            .store
            .resolve_children(session_identity, RelationKind::SourceGroups)
        {
            for member in self
                .store
                .resolve_children(&group.identity, RelationKind::SourceMembers)
            {
                let Some(data) = member.as_source_member() else {
                    continue;
                };
                if let Some(reference) = &data.reference {
                    if &reference.target == target {
                        debug!(member = %member.identity, target = %target, "found source member");
                        return Some(data.direction);
                    }
                }
            }
        }
        None
    }

    fn forwarding_endpoints_in_group(&self, group: &Identity) -> Vec<PolicyObject> {
        self.store
            .resolve_children(
                &self.config.endpoint_inventory,
                RelationKind::ForwardingEndpoints,
            )
            .into_iter()
            .filter(|endpoint| {
                endpoint
                    .as_forwarding_endpoint()
                    .is_some_and(|data| data.group.as_ref() == Some(group))
            })
            .collect()
    }
}

impl<S: PolicyStore + 'static> PolicyListener for SpanOrch<S> {
    fn object_updated(&self, object_type: ObjectType, identity: &Identity) {
        self.handle_object_updated(object_type, identity);
    }
}

/// Recovers a local endpoint's enclosing session identity by walking
/// its path backward to the fixed marker element; the session is the
/// prefix before the marker. The marker is matched literally, per the
/// identity schema contract.
fn session_for_local_endpoint(identity: &Identity) -> Option<Identity> {
    let elements = identity.elements();
    let marker = elements
        .iter()
        .rposition(|element| element == schema::LOCAL_EP_ELEMENT)?;
    if marker == 0 {
        return None;
    }
    Identity::from_elements(elements[..marker].iter().cloned()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_session_back_walk() {
        let lep = schema::local_endpoint("sess1", "lep1");
        assert_eq!(
            session_for_local_endpoint(&lep),
            Some(schema::session("sess1"))
        );
    }

    #[test]
    fn test_session_back_walk_uses_last_marker() {
        // A pathological name that repeats the marker deeper in the
        // path still walks back from the last occurrence.
        let odd: Identity = "/SpanUniverse/SpanSession/s/SpanLocalEp/x/SpanLocalEp/y"
            .parse()
            .unwrap();
        assert_eq!(
            session_for_local_endpoint(&odd).unwrap().to_string(),
            "/SpanUniverse/SpanSession/s/SpanLocalEp/x"
        );
    }

    #[test]
    fn test_session_back_walk_missing_marker() {
        let no_marker: Identity = "/SpanUniverse/SpanSession/sess1".parse().unwrap();
        assert_eq!(session_for_local_endpoint(&no_marker), None);

        let leading: Identity = "/SpanLocalEp/x".parse().unwrap();
        assert_eq!(session_for_local_endpoint(&leading), None);
    }

    #[test]
    fn test_config_defaults() {
        let config = SpanOrchConfig::default();
        assert_eq!(config.session_container, schema::session_container());
        assert_eq!(config.endpoint_inventory, schema::endpoint_inventory());
    }
}
