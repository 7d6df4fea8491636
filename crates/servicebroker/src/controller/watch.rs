//! Seams between the controller and its collaborators.
//!
//! A [`ResourceWatch`] delivers [`WatchEvent`]s through an [`EventSink`] and
//! reports when its initial listing is complete. A [`StatusWriter`] persists
//! the status subresource.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use super::error::{StatusWriteError, WatchError};
use super::resource::{DynamicObject, ServiceBrokerConfig};

/// A change to a watched object.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    Created(DynamicObject),
    Updated {
        old: DynamicObject,
        new: DynamicObject,
    },
    Deleted(DynamicObject),
}

impl WatchEvent {
    /// Returns the object the event is about; the new one for updates.
    pub fn object(&self) -> &DynamicObject {
        match self {
            WatchEvent::Created(object) | WatchEvent::Deleted(object) => object,
            WatchEvent::Updated { new, .. } => new,
        }
    }

    /// Short name of the event type, for logging.
    pub fn action(&self) -> &'static str {
        match self {
            WatchEvent::Created(_) => "created",
            WatchEvent::Updated { .. } => "updated",
            WatchEvent::Deleted(_) => "deleted",
        }
    }
}

/// What travels over the event queue.
#[derive(Debug)]
pub(crate) enum Envelope {
    Event(WatchEvent),
    /// Acknowledged by the router once every earlier event has been applied.
    Barrier(oneshot::Sender<()>),
}

/// Sending half of the ordered event queue, handed to a [`ResourceWatch`].
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: mpsc::Sender<Envelope>,
}

impl EventSink {
    pub(crate) fn new(sender: mpsc::Sender<Envelope>) -> Self {
        Self { sender }
    }

    /// Queues an event, waiting for capacity.
    pub async fn send(&self, event: WatchEvent) -> Result<(), WatchError> {
        self.sender
            .send(Envelope::Event(event))
            .await
            .map_err(|_| WatchError::ChannelClosed)
    }

    /// Queues an event from a blocking thread.
    ///
    /// Must not be called from inside an async context.
    pub fn blocking_send(&self, event: WatchEvent) -> Result<(), WatchError> {
        self.sender
            .blocking_send(Envelope::Event(event))
            .map_err(|_| WatchError::ChannelClosed)
    }

    pub(crate) async fn barrier(&self) -> Result<oneshot::Receiver<()>, WatchError> {
        let (ack, done) = oneshot::channel();
        self.sender
            .send(Envelope::Barrier(ack))
            .await
            .map_err(|_| WatchError::ChannelClosed)?;
        Ok(done)
    }

    /// Returns true once the consuming side has gone away.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Delivers change notifications for configuration resources.
#[async_trait::async_trait]
pub trait ResourceWatch: Send + Sync + 'static {
    /// Runs until `stop` turns true or the sink is closed.
    ///
    /// The initial listing is delivered as `Created` events before
    /// [`ResourceWatch::has_synced`] reports true.
    async fn run(&self, sink: EventSink, stop: watch::Receiver<bool>) -> Result<(), WatchError>;

    /// Whether the initial listing has been delivered in full.
    fn has_synced(&self) -> bool;
}

/// Persists the status subresource of the configuration.
#[async_trait::async_trait]
pub trait StatusWriter: Send + Sync {
    /// Writes `config.status` back to the source of truth. Nothing else in
    /// `config` is written.
    async fn update_status(&self, config: &ServiceBrokerConfig) -> Result<(), StatusWriteError>;
}

/// Client handles shared by every reader of the store.
#[derive(Clone)]
pub struct Clients {
    pub status: Arc<dyn StatusWriter>,
}

impl Clients {
    pub fn new(status: Arc<dyn StatusWriter>) -> Self {
        Self { status }
    }
}

impl std::fmt::Debug for Clients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clients").finish_non_exhaustive()
    }
}
