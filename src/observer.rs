//! Fan-out of session events to passive observers
//!
//! Observers register a sink under a session id or under the global key.
//! Publishing never waits on a sink: each push is a single non-blocking
//! attempt, and a sink that fails it is dropped from its group.

mod event;

pub use event::ObserverEvent;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkError {
    #[error("observer disconnected")]
    Closed,
    #[error("observer is not keeping up")]
    Backlogged,
}

/// Something serialized events can be pushed to
pub trait EventSink: Send + Sync {
    /// Attempt to hand off one frame without blocking
    fn push(&self, frame: &str) -> Result<(), SinkError>;
}

/// Bounded channel sink. A full buffer counts as a failure, so a slow
/// reader is disconnected instead of accumulating a backlog.
impl EventSink for mpsc::Sender<String> {
    fn push(&self, frame: &str) -> Result<(), SinkError> {
        self.try_send(frame.to_string()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SinkError::Backlogged,
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}

/// Group an observer belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObserverKey {
    /// Receives events for every session
    Global,
    Session(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkId(u64);

type Groups = HashMap<ObserverKey, HashMap<SinkId, Arc<dyn EventSink>>>;

#[derive(Default)]
pub struct ObserverBus {
    groups: RwLock<Groups>,
    next_id: AtomicU64,
}

impl ObserverBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Groups> {
        self.groups.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Groups> {
        self.groups.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, key: ObserverKey, sink: Arc<dyn EventSink>) -> SinkId {
        let id = SinkId(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(?key, sink_id = id.0, "Observer registered");
        self.write().entry(key).or_default().insert(id, sink);
        id
    }

    /// Remove a sink. Returns false if it was already gone (e.g. pruned).
    pub fn deregister(&self, key: &ObserverKey, id: SinkId) -> bool {
        let mut groups = self.write();
        let Some(group) = groups.get_mut(key) else {
            return false;
        };
        let removed = group.remove(&id).is_some();
        if group.is_empty() {
            groups.remove(key);
        }
        if removed {
            tracing::debug!(?key, sink_id = id.0, "Observer deregistered");
        }
        removed
    }

    /// Push `event` to its session's observers and to every global observer.
    ///
    /// Returns how many sinks accepted it. Failing sinks are pruned.
    pub fn publish(&self, event: &ObserverEvent) -> usize {
        let session_key = event
            .session_id()
            .map(|id| ObserverKey::Session(id.to_string()));
        let global = ObserverKey::Global;

        // Snapshot targets so no lock is held while pushing
        let targets: Vec<(ObserverKey, SinkId, Arc<dyn EventSink>)> = {
            let groups = self.read();
            session_key
                .iter()
                .chain(std::iter::once(&global))
                .filter_map(|key| groups.get(key).map(|group| (key, group)))
                .flat_map(|(key, group)| {
                    group
                        .iter()
                        .map(move |(id, sink)| (key.clone(), *id, sink.clone()))
                })
                .collect()
        };

        if targets.is_empty() {
            return 0;
        }

        let frame = event.to_frame();
        let mut delivered = 0;
        let mut failed = Vec::new();

        for (key, id, sink) in targets {
            match sink.push(&frame) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        ?key,
                        sink_id = id.0,
                        event = event.event_type(),
                        error = %e,
                        "Pruning observer"
                    );
                    failed.push((key, id));
                }
            }
        }

        if !failed.is_empty() {
            let mut groups = self.write();
            for (key, id) in failed {
                if let Some(group) = groups.get_mut(&key) {
                    group.remove(&id);
                    if group.is_empty() {
                        groups.remove(&key);
                    }
                }
            }
        }

        delivered
    }

    pub fn sink_count(&self, key: &ObserverKey) -> usize {
        self.read().get(key).map_or(0, HashMap::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::TerminationReason;
    use serde_json::Value;
    use std::sync::Mutex;

    /// Sink that records every frame it receives
    #[derive(Default)]
    struct RecordingSink {
        frames: Mutex<Vec<Value>>,
    }

    impl RecordingSink {
        fn types(&self) -> Vec<String> {
            self.frames
                .lock()
                .unwrap()
                .iter()
                .map(|f| f["type"].as_str().unwrap_or_default().to_string())
                .collect()
        }

        fn session_ids(&self) -> Vec<String> {
            self.frames
                .lock()
                .unwrap()
                .iter()
                .map(|f| f["session_id"].as_str().unwrap_or_default().to_string())
                .collect()
        }
    }

    impl EventSink for RecordingSink {
        fn push(&self, frame: &str) -> Result<(), SinkError> {
            self.frames
                .lock()
                .unwrap()
                .push(serde_json::from_str(frame).unwrap());
            Ok(())
        }
    }

    struct BrokenSink;

    impl EventSink for BrokenSink {
        fn push(&self, _frame: &str) -> Result<(), SinkError> {
            Err(SinkError::Closed)
        }
    }

    fn sent(session_id: &str) -> ObserverEvent {
        ObserverEvent::InstructionSent {
            session_id: session_id.to_string(),
            instruction: "do it".to_string(),
        }
    }

    #[test]
    fn test_global_sink_sees_every_session() {
        let bus = ObserverBus::new();
        let global = Arc::new(RecordingSink::default());
        bus.register(ObserverKey::Global, global.clone());

        bus.publish(&sent("a"));
        bus.publish(&sent("b"));

        assert_eq!(global.session_ids(), vec!["a", "b"]);
    }

    #[test]
    fn test_session_sink_sees_only_its_session() {
        let bus = ObserverBus::new();
        let only_a = Arc::new(RecordingSink::default());
        bus.register(ObserverKey::Session("a".to_string()), only_a.clone());

        bus.publish(&sent("a"));
        bus.publish(&sent("b"));
        bus.publish(&ObserverEvent::SessionTerminated {
            session_id: "a".to_string(),
            reason: TerminationReason::TapOut,
        });

        assert_eq!(only_a.session_ids(), vec!["a", "a"]);
        assert_eq!(only_a.types(), vec!["instruction_sent", "session_terminated"]);
    }

    #[test]
    fn test_failing_sink_is_pruned_and_others_still_receive() {
        let bus = ObserverBus::new();
        let healthy = Arc::new(RecordingSink::default());
        bus.register(ObserverKey::Global, Arc::new(BrokenSink));
        bus.register(ObserverKey::Global, healthy.clone());
        assert_eq!(bus.sink_count(&ObserverKey::Global), 2);

        assert_eq!(bus.publish(&sent("a")), 1);
        assert_eq!(bus.sink_count(&ObserverKey::Global), 1);

        assert_eq!(bus.publish(&sent("a")), 1);
        assert_eq!(healthy.frames.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_backlogged_channel_is_disconnected() {
        let bus = ObserverBus::new();
        let (tx, mut rx) = mpsc::channel::<String>(1);
        bus.register(ObserverKey::Session("a".to_string()), Arc::new(tx));

        assert_eq!(bus.publish(&sent("a")), 1);
        // Buffer full: second push fails and the sink is dropped
        assert_eq!(bus.publish(&sent("a")), 0);
        assert_eq!(bus.sink_count(&ObserverKey::Session("a".to_string())), 0);

        assert!(rx.try_recv().is_ok());
        // Sender went away with the pruned sink
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_closed_channel_is_pruned() {
        let bus = ObserverBus::new();
        let (tx, rx) = mpsc::channel::<String>(4);
        drop(rx);
        bus.register(ObserverKey::Global, Arc::new(tx));

        assert_eq!(bus.publish(&sent("a")), 0);
        assert_eq!(bus.sink_count(&ObserverKey::Global), 0);
    }

    #[test]
    fn test_deregister_removes_membership() {
        let bus = ObserverBus::new();
        let sink = Arc::new(RecordingSink::default());
        let id = bus.register(ObserverKey::Global, sink.clone());

        assert!(bus.deregister(&ObserverKey::Global, id));
        assert!(!bus.deregister(&ObserverKey::Global, id));

        bus.publish(&sent("a"));
        assert!(sink.frames.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_membership_churn_during_publish() {
        let bus = Arc::new(ObserverBus::new());
        let key = ObserverKey::Session("a".to_string());
        let steady = Arc::new(RecordingSink::default());
        let steady_id = bus.register(key.clone(), steady.clone());

        let churn = {
            let bus = bus.clone();
            let key = key.clone();
            tokio::spawn(async move {
                for _ in 0..500 {
                    let id = bus.register(key.clone(), Arc::new(RecordingSink::default()));
                    tokio::task::yield_now().await;
                    assert!(bus.deregister(&key, id));
                }
            })
        };
        let publisher = {
            let bus = bus.clone();
            tokio::spawn(async move {
                for _ in 0..500 {
                    assert!(bus.publish(&sent("a")) >= 1);
                    tokio::task::yield_now().await;
                }
            })
        };

        churn.await.unwrap();
        publisher.await.unwrap();

        assert_eq!(steady.frames.lock().unwrap().len(), 500);
        assert_eq!(bus.sink_count(&key), 1);
        assert!(bus.deregister(&key, steady_id));
        assert_eq!(bus.sink_count(&key), 0);
    }

    #[test]
    fn test_publish_without_observers_is_a_no_op() {
        let bus = ObserverBus::new();
        assert_eq!(bus.publish(&sent("a")), 0);
    }
}
