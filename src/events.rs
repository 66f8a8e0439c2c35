//! Document lifecycle events fanned out to subscribers over channels

use std::path::PathBuf;

use flume::{Receiver, Sender};
use log::debug;

use crate::fingerprint::Fingerprint;
use crate::pdf::Metadata;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReaderEvent {
    DocumentLoaded {
        path: PathBuf,
        fingerprint: Fingerprint,
        total_pages: usize,
        metadata: Metadata,
        cached: bool,
    },
    DocumentClosed,
    CacheRebuilt {
        fingerprint: Fingerprint,
    },
}

/// Delivers each published event to every live subscriber, in the order
/// they subscribed.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<ReaderEvent>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber. Dropping the receiver unsubscribes it.
    pub fn subscribe(&mut self) -> Receiver<ReaderEvent> {
        let (tx, rx) = flume::unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub fn publish(&mut self, event: ReaderEvent) {
        debug!("Publishing {event:?} to {} subscribers", self.subscribers.len());
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}
