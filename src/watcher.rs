//! Watch-event relays
//!
//! The extension manager calls [`SimpleWatcher::handle`] for every event on
//! its watch stream; the watcher hands the event to a sink that synchronous
//! test code can assert on.

use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::{Stream, StreamExt};
use k8s_openapi::api::core::v1::Pod;
use kube::api::WatchEvent;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::manager::ManagerOptions;

/// Cluster change event delivered by the manager's watch stream
pub type Event = WatchEvent<Pod>;

/// Ordered, unbounded log of received events.
///
/// Clones share the same log, so one handle can live in the watcher while
/// the test keeps another for assertions.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Event>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, event: Event) {
        self.lock().push(event);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of everything received so far, in arrival order
    pub fn snapshot(&self) -> Vec<Event> {
        self.lock().clone()
    }

    /// `(type, object name)` per event, handy for assertions
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        self.lock().iter().map(describe).collect()
    }
}

/// Sending half of a relay channel
#[derive(Debug, Clone)]
pub enum RelaySender {
    Bounded(mpsc::Sender<Event>),
    Unbounded(mpsc::UnboundedSender<Event>),
}

impl From<mpsc::Sender<Event>> for RelaySender {
    fn from(tx: mpsc::Sender<Event>) -> Self {
        RelaySender::Bounded(tx)
    }
}

impl From<mpsc::UnboundedSender<Event>> for RelaySender {
    fn from(tx: mpsc::UnboundedSender<Event>) -> Self {
        RelaySender::Unbounded(tx)
    }
}

/// Watcher handed to the extension manager
#[derive(Debug, Clone)]
pub enum SimpleWatcher {
    /// Append every event to an in-memory log
    Accumulator(EventLog),
    /// Forward every event onto a channel
    Relay(RelaySender),
}

impl SimpleWatcher {
    pub fn accumulator() -> Self {
        SimpleWatcher::Accumulator(EventLog::new())
    }

    pub fn relay(tx: impl Into<RelaySender>) -> Self {
        SimpleWatcher::Relay(tx.into())
    }

    /// The accumulated log, if this is an accumulator
    pub fn log(&self) -> Option<&EventLog> {
        match self {
            SimpleWatcher::Accumulator(log) => Some(log),
            SimpleWatcher::Relay(_) => None,
        }
    }

    /// Receive one event from the manager.
    ///
    /// A relay on a full bounded channel waits here until the receiver makes
    /// room. If the receiver is gone the event is dropped.
    pub async fn handle(&self, manager: &ManagerOptions, event: Event) {
        let (kind, name) = describe(&event);
        debug!(kind, name = %name, namespace = %manager.namespace, "Handling watch event");

        match self {
            SimpleWatcher::Accumulator(log) => log.push(event),
            SimpleWatcher::Relay(RelaySender::Bounded(tx)) => {
                if tx.send(event).await.is_err() {
                    warn!(kind, name = %name, "Relay receiver dropped, discarding event");
                }
            }
            SimpleWatcher::Relay(RelaySender::Unbounded(tx)) => {
                if tx.send(event).is_err() {
                    warn!(kind, name = %name, "Relay receiver dropped, discarding event");
                }
            }
        }
    }
}

/// Feed a watch stream into `watcher`, one event at a time and in order.
///
/// Stream errors are logged and skipped. Returns the number of events handled
/// once the stream ends.
pub async fn dispatch<S, E>(watcher: &SimpleWatcher, manager: &ManagerOptions, stream: S) -> usize
where
    S: Stream<Item = Result<Event, E>>,
    E: Display,
{
    futures::pin_mut!(stream);
    let mut handled = 0;

    while let Some(item) = stream.next().await {
        match item {
            Ok(event) => {
                watcher.handle(manager, event).await;
                handled += 1;
            }
            Err(e) => {
                error!("Watch stream error: {}", e);
            }
        }
    }

    info!(handled, "Watch stream ended");
    handled
}

/// Event type and object name
pub fn describe(event: &Event) -> (&'static str, String) {
    let name_of = |pod: &Pod| pod.metadata.name.clone().unwrap_or_default();
    match event {
        WatchEvent::Added(pod) => ("ADDED", name_of(pod)),
        WatchEvent::Modified(pod) => ("MODIFIED", name_of(pod)),
        WatchEvent::Deleted(pod) => ("DELETED", name_of(pod)),
        WatchEvent::Bookmark(bookmark) => ("BOOKMARK", bookmark.metadata.resource_version.clone()),
        WatchEvent::Error(e) => ("ERROR", e.message.clone()),
    }
}
