//! In-memory policy store.

use crate::object::{ObjectType, PolicyObject};
use crate::store::{PolicyListener, PolicyStore, RelationKind};
use parking_lot::{Mutex, RwLock};
use span_model::Identity;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Thread-safe in-memory policy store.
///
/// Objects live in an ordered map keyed by identity, so subtree scans
/// are range scans. Mutations notify registered listeners synchronously
/// on the calling thread, after the object lock is released, so a
/// listener can re-resolve without deadlocking; this is also what makes
/// notifications arrive "on arbitrary threads" from the engine's point
/// of view.
///
/// Creating a new object additionally notifies the nearest existing
/// ancestor object: a child add surfaces as a change of its enclosing
/// container, which is how session creation reaches container
/// listeners.
#[derive(Default)]
pub struct MemoryPolicyStore {
    objects: RwLock<BTreeMap<Identity, PolicyObject>>,
    listeners: Mutex<HashMap<ObjectType, Vec<Arc<dyn PolicyListener>>>>,
}

impl MemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an object and notifies listeners.
    pub fn put(&self, object: PolicyObject) {
        let identity = object.identity.clone();
        let object_type = object.object_type();

        let ancestor = {
            let mut objects = self.objects.write();
            let is_new = !objects.contains_key(&identity);
            let ancestor = if is_new {
                Self::nearest_ancestor(&objects, &identity)
            } else {
                None
            };
            objects.insert(identity.clone(), object);
            ancestor
        };

        debug!(class = %object_type, identity = %identity, "store put");
        self.notify(object_type, &identity);
        if let Some((ancestor_type, ancestor_identity)) = ancestor {
            self.notify(ancestor_type, &ancestor_identity);
        }
    }

    /// Removes an object and its whole subtree, notifying listeners for
    /// each removed object, deepest first.
    pub fn remove(&self, identity: &Identity) {
        let removed: Vec<(ObjectType, Identity)> = {
            let mut objects = self.objects.write();
            let subtree: Vec<Identity> = objects
                .range(identity.clone()..)
                .take_while(|(id, _)| id.starts_with(identity))
                .map(|(id, _)| id.clone())
                .collect();
            subtree
                .into_iter()
                .filter_map(|id| objects.remove(&id).map(|obj| (obj.object_type(), id)))
                .collect()
        };

        for (object_type, id) in removed.into_iter().rev() {
            debug!(class = %object_type, identity = %id, "store remove");
            self.notify(object_type, &id);
        }
    }

    /// Number of objects currently in the store.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    fn nearest_ancestor(
        objects: &BTreeMap<Identity, PolicyObject>,
        identity: &Identity,
    ) -> Option<(ObjectType, Identity)> {
        let mut cursor = identity.parent();
        while let Some(candidate) = cursor {
            if let Some(object) = objects.get(&candidate) {
                return Some((object.object_type(), candidate));
            }
            cursor = candidate.parent();
        }
        None
    }

    fn notify(&self, object_type: ObjectType, identity: &Identity) {
        let snapshot: Vec<Arc<dyn PolicyListener>> = self
            .listeners
            .lock()
            .get(&object_type)
            .map(|list| list.to_vec())
            .unwrap_or_default();
        for listener in snapshot {
            listener.object_updated(object_type, identity);
        }
    }
}

impl PolicyStore for MemoryPolicyStore {
    fn resolve(&self, identity: &Identity) -> Option<PolicyObject> {
        self.objects.read().get(identity).cloned()
    }

    fn resolve_children(&self, parent: &Identity, kind: RelationKind) -> Vec<PolicyObject> {
        let prefix = parent.child(kind.element());
        let child_type = kind.child_type();
        self.objects
            .read()
            .range(prefix.clone()..)
            .take_while(|(id, _)| id.starts_with(&prefix))
            .filter(|(id, obj)| {
                id.depth() == prefix.depth() + 1 && obj.object_type() == child_type
            })
            .map(|(_, obj)| obj.clone())
            .collect()
    }

    fn register_listener(&self, object_type: ObjectType, listener: Arc<dyn PolicyListener>) {
        self.listeners
            .lock()
            .entry(object_type)
            .or_default()
            .push(listener);
    }

    fn unregister_listener(&self, object_type: ObjectType, listener: &Arc<dyn PolicyListener>) {
        if let Some(list) = self.listeners.lock().get_mut(&object_type) {
            list.retain(|candidate| !Arc::ptr_eq(candidate, listener));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ObjectData, SessionData};
    use crate::schema;
    use pretty_assertions::assert_eq;
    use span_model::AdminState;

    fn session_object(name: &str) -> PolicyObject {
        PolicyObject::new(
            schema::session(name),
            ObjectData::Session(SessionData {
                name: name.to_string(),
                admin_state: AdminState::Enabled,
            }),
        )
    }

    fn container_object() -> PolicyObject {
        PolicyObject::new(schema::session_container(), ObjectData::SessionContainer)
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(ObjectType, Identity)>>,
    }

    impl PolicyListener for Recorder {
        fn object_updated(&self, object_type: ObjectType, identity: &Identity) {
            self.events.lock().push((object_type, identity.clone()));
        }
    }

    #[test]
    fn test_put_resolve() {
        let store = MemoryPolicyStore::new();
        store.put(session_object("s1"));

        let resolved = store.resolve(&schema::session("s1")).unwrap();
        assert_eq!(resolved.as_session().unwrap().name, "s1");
        assert!(store.resolve(&schema::session("s2")).is_none());
    }

    #[test]
    fn test_resolve_children_by_relation() {
        let store = MemoryPolicyStore::new();
        store.put(container_object());
        store.put(session_object("s1"));
        store.put(session_object("s2"));
        // A local endpoint under s1 must not show up as a session.
        store.put(PolicyObject::new(
            schema::local_endpoint("s1", "lep1"),
            ObjectData::LocalEndpoint(crate::object::LocalEndpointData {
                name: "lep1".to_string(),
                target: None,
            }),
        ));

        let sessions =
            store.resolve_children(&schema::session_container(), RelationKind::Sessions);
        let names: Vec<&str> = sessions
            .iter()
            .filter_map(|o| o.as_session().map(|s| s.name.as_str()))
            .collect();
        assert_eq!(names, vec!["s1", "s2"]);
    }

    #[test]
    fn test_new_child_notifies_nearest_ancestor() {
        let store = MemoryPolicyStore::new();
        store.put(container_object());

        let recorder = Arc::new(Recorder::default());
        store.register_listener(
            ObjectType::SessionContainer,
            recorder.clone() as Arc<dyn PolicyListener>,
        );
        store.register_listener(
            ObjectType::Session,
            recorder.clone() as Arc<dyn PolicyListener>,
        );

        store.put(session_object("s1"));

        let events = recorder.events.lock().clone();
        assert_eq!(
            events,
            vec![
                (ObjectType::Session, schema::session("s1")),
                (
                    ObjectType::SessionContainer,
                    schema::session_container()
                ),
            ]
        );
    }

    #[test]
    fn test_replacement_does_not_notify_ancestor() {
        let store = MemoryPolicyStore::new();
        store.put(container_object());
        store.put(session_object("s1"));

        let recorder = Arc::new(Recorder::default());
        store.register_listener(
            ObjectType::SessionContainer,
            recorder.clone() as Arc<dyn PolicyListener>,
        );

        store.put(session_object("s1"));
        assert!(recorder.events.lock().is_empty());
    }

    #[test]
    fn test_remove_subtree_notifies_deepest_first() {
        let store = MemoryPolicyStore::new();
        store.put(container_object());
        store.put(session_object("s1"));
        store.put(PolicyObject::new(
            schema::local_endpoint("s1", "lep1"),
            ObjectData::LocalEndpoint(crate::object::LocalEndpointData {
                name: "lep1".to_string(),
                target: None,
            }),
        ));

        let recorder = Arc::new(Recorder::default());
        store.register_listener(
            ObjectType::Session,
            recorder.clone() as Arc<dyn PolicyListener>,
        );
        store.register_listener(
            ObjectType::LocalEndpoint,
            recorder.clone() as Arc<dyn PolicyListener>,
        );

        store.remove(&schema::session("s1"));

        let events = recorder.events.lock().clone();
        assert_eq!(
            events,
            vec![
                (
                    ObjectType::LocalEndpoint,
                    schema::local_endpoint("s1", "lep1")
                ),
                (ObjectType::Session, schema::session("s1")),
            ]
        );
        assert!(store.resolve(&schema::session("s1")).is_none());
    }

    #[test]
    fn test_unregister_listener_by_instance() {
        let store = MemoryPolicyStore::new();
        let recorder = Arc::new(Recorder::default());
        let listener: Arc<dyn PolicyListener> = recorder.clone();

        store.register_listener(ObjectType::Session, listener.clone());
        store.unregister_listener(ObjectType::Session, &listener);

        store.put(session_object("s1"));
        assert!(recorder.events.lock().is_empty());
    }
}
