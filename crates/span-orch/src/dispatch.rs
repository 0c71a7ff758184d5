//! Keyed asynchronous notification dispatch.

use crate::types::SessionState;
use parking_lot::Mutex;
use span_model::Identity;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

/// Downstream observer of derived session state.
///
/// Callbacks run on dispatcher workers, never on the thread delivering
/// store events. Update callbacks receive only the identity and are
/// expected to re-read the live view; delete callbacks receive the
/// snapshot captured before removal.
pub trait SpanListener: Send + Sync {
    fn on_session_updated(&self, identity: &Identity);
    fn on_session_deleted(&self, snapshot: &SessionState);
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Task executor with FIFO ordering per key and concurrency across
/// keys.
///
/// Each key gets one worker draining an unbounded channel, so
/// submission never blocks and tasks for one key serialize in
/// submission order while different keys proceed independently.
pub(crate) struct KeyedTaskQueue {
    handle: Handle,
    tracker: TaskTracker,
    workers: Mutex<HashMap<String, mpsc::UnboundedSender<Job>>>,
    closed: AtomicBool,
}

impl KeyedTaskQueue {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            tracker: TaskTracker::new(),
            workers: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Submits a task for `key`; never blocks the caller.
    pub fn dispatch(&self, key: &str, job: impl FnOnce() + Send + 'static) {
        if self.closed.load(Ordering::Acquire) {
            debug!(key, "dispatch after shutdown; dropping task");
            return;
        }
        let mut workers = self.workers.lock();
        let sender = workers.entry(key.to_string()).or_insert_with(|| {
            let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
            self.tracker.spawn_blocking_on(
                move || {
                    while let Some(job) = rx.blocking_recv() {
                        job();
                    }
                },
                &self.handle,
            );
            tx
        });
        if sender.send(Box::new(job)).is_err() {
            warn!(key, "notification worker gone; dropping task");
        }
    }

    /// Stops accepting tasks and waits for queued ones to finish.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        self.workers.lock().clear();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

/// Registry of downstream listeners.
///
/// Guarded by its own lock, distinct from the engine state lock, so
/// registration never contends with resolution work. Delivery snapshots
/// the list first and isolates each call, so one faulting listener
/// cannot block the rest.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    listeners: Mutex<Vec<Arc<dyn SpanListener>>>,
}

impl ListenerRegistry {
    pub fn register(&self, listener: Arc<dyn SpanListener>) {
        debug!("registering span listener");
        self.listeners.lock().push(listener);
    }

    pub fn unregister(&self, listener: &Arc<dyn SpanListener>) {
        self.listeners
            .lock()
            .retain(|candidate| !Arc::ptr_eq(candidate, listener));
    }

    pub fn notify_updated(&self, identity: &Identity) {
        for listener in self.snapshot() {
            if catch_unwind(AssertUnwindSafe(|| listener.on_session_updated(identity))).is_err() {
                warn!(session = %identity, "listener panicked in update callback");
            }
        }
    }

    pub fn notify_deleted(&self, state: &SessionState) {
        debug!(session = %state.name, state = %state.to_json(), "delivering delete");
        for listener in self.snapshot() {
            if catch_unwind(AssertUnwindSafe(|| listener.on_session_deleted(state))).is_err() {
                warn!(session = %state.name, "listener panicked in delete callback");
            }
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn SpanListener>> {
        self.listeners.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use span_model::AdminState;
    use span_policy_store::schema;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_fifo_per_key() {
        let queue = KeyedTaskQueue::new(Handle::current());
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..100u32 {
            let seen = Arc::clone(&seen);
            queue.dispatch("key-a", move || seen.lock().push(i));
        }
        queue.shutdown().await;

        let seen = seen.lock();
        assert_eq!(*seen, (0..100).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_keys_are_independent() {
        let queue = KeyedTaskQueue::new(Handle::current());
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..20u32 {
            let key = if i % 2 == 0 { "even" } else { "odd" };
            let seen = Arc::clone(&seen);
            queue.dispatch(key, move || seen.lock().push(i));
        }
        queue.shutdown().await;

        // Interleaving across keys is unspecified; per-key order is not.
        let seen = seen.lock();
        let evens: Vec<u32> = seen.iter().copied().filter(|i| i % 2 == 0).collect();
        let odds: Vec<u32> = seen.iter().copied().filter(|i| i % 2 == 1).collect();
        assert_eq!(evens, (0..20).filter(|i| i % 2 == 0).collect::<Vec<_>>());
        assert_eq!(odds, (0..20).filter(|i| i % 2 == 1).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_dispatch_after_shutdown_is_dropped() {
        let queue = KeyedTaskQueue::new(Handle::current());
        queue.shutdown().await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let cloned = Arc::clone(&seen);
        queue.dispatch("key-a", move || cloned.lock().push(1u32));
        assert!(seen.lock().is_empty());
    }

    struct Panicking;

    impl SpanListener for Panicking {
        fn on_session_updated(&self, _identity: &Identity) {
            panic!("listener fault");
        }
        fn on_session_deleted(&self, _snapshot: &SessionState) {
            panic!("listener fault");
        }
    }

    struct Counting {
        updates: Mutex<u32>,
    }

    impl SpanListener for Counting {
        fn on_session_updated(&self, _identity: &Identity) {
            *self.updates.lock() += 1;
        }
        fn on_session_deleted(&self, _snapshot: &SessionState) {}
    }

    #[test]
    fn test_listener_fault_is_isolated() {
        let registry = ListenerRegistry::default();
        let counting = Arc::new(Counting {
            updates: Mutex::new(0),
        });
        registry.register(Arc::new(Panicking));
        registry.register(counting.clone());

        registry.notify_updated(&schema::session("s1"));
        registry.notify_deleted(&SessionState::new(
            schema::session("s1"),
            "s1",
            AdminState::Enabled,
        ));

        assert_eq!(*counting.updates.lock(), 1);
    }

    #[test]
    fn test_unregister_by_instance() {
        let registry = ListenerRegistry::default();
        let counting = Arc::new(Counting {
            updates: Mutex::new(0),
        });
        let listener: Arc<dyn SpanListener> = counting.clone();
        registry.register(listener.clone());
        registry.unregister(&listener);

        registry.notify_updated(&schema::session("s1"));
        assert_eq!(*counting.updates.lock(), 0);
    }
}
