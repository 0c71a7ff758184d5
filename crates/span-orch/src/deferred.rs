//! Deferred-resolution index.

use span_model::Identity;
use std::collections::HashMap;

/// Pending-match table for local endpoints whose forwarding target is
/// not yet materialized.
///
/// Keyed by the unresolved target identity; the value is the waiting
/// local-endpoint identity. The first waiter for a target wins; the
/// entry is removed only once a replay succeeds, so a replay that
/// aborts (session no longer tracked, membership gone) leaves the entry
/// in place for a later attempt.
#[derive(Debug, Default)]
pub struct DeferredEndpointIndex {
    waiting: HashMap<Identity, Identity>,
}

impl DeferredEndpointIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `waiter` as pending on `target`.
    ///
    /// Returns false if another waiter already holds the entry.
    pub fn insert(&mut self, target: Identity, waiter: Identity) -> bool {
        use std::collections::hash_map::Entry;
        match self.waiting.entry(target) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(waiter);
                true
            }
        }
    }

    /// Returns the waiter pending on `target`, if any.
    pub fn waiter(&self, target: &Identity) -> Option<&Identity> {
        self.waiting.get(target)
    }

    /// Removes and returns the waiter pending on `target`.
    pub fn remove(&mut self, target: &Identity) -> Option<Identity> {
        self.waiting.remove(target)
    }

    pub fn contains(&self, target: &Identity) -> bool {
        self.waiting.contains_key(target)
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use span_policy_store::schema;

    #[test]
    fn test_first_waiter_wins() {
        let mut index = DeferredEndpointIndex::new();
        let target = schema::forwarding_endpoint("fep1");

        assert!(index.insert(target.clone(), schema::local_endpoint("s1", "lep1")));
        assert!(!index.insert(target.clone(), schema::local_endpoint("s1", "lep2")));
        assert_eq!(
            index.waiter(&target),
            Some(&schema::local_endpoint("s1", "lep1"))
        );
    }

    #[test]
    fn test_remove() {
        let mut index = DeferredEndpointIndex::new();
        let target = schema::forwarding_endpoint("fep1");
        index.insert(target.clone(), schema::local_endpoint("s1", "lep1"));

        assert_eq!(
            index.remove(&target),
            Some(schema::local_endpoint("s1", "lep1"))
        );
        assert!(index.is_empty());
        assert!(index.remove(&target).is_none());
    }
}
