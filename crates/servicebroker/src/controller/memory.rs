//! In-memory collaborators, for tests and for embedding the controller
//! without an API server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, oneshot, watch};

use super::error::{DecodeError, StatusWriteError, WatchError};
use super::resource::{DynamicObject, ServiceBrokerConfig, ServiceBrokerConfigStatus};
use super::watch::{EventSink, ResourceWatch, StatusWriter, WatchEvent};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn object_key(object: &DynamicObject) -> String {
    format!("{}/{}/{}", object.api_version, object.kind, object.name())
}

#[derive(Debug)]
enum Command {
    Event(WatchEvent),
    Flush(oneshot::Sender<()>),
}

type ObjectMap = Arc<Mutex<HashMap<String, DynamicObject>>>;

/// A [`ResourceWatch`] driven by a [`MemoryWatchHandle`].
pub struct MemoryWatch {
    initial: Vec<DynamicObject>,
    commands: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
    objects: ObjectMap,
    synced: AtomicBool,
    sync_on_start: bool,
    failure: Option<String>,
}

impl MemoryWatch {
    /// Creates an empty watch and the handle that feeds it.
    pub fn new() -> (Self, MemoryWatchHandle) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let objects = ObjectMap::default();

        let watch = Self {
            initial: Vec::new(),
            commands: Mutex::new(Some(receiver)),
            objects: Arc::clone(&objects),
            synced: AtomicBool::new(false),
            sync_on_start: true,
            failure: None,
        };

        (watch, MemoryWatchHandle { sender, objects })
    }

    /// Objects delivered as the initial listing.
    pub fn with_objects(mut self, objects: impl IntoIterator<Item = DynamicObject>) -> Self {
        let mut known = lock(&self.objects);
        for object in objects {
            known.insert(object_key(&object), object.clone());
            self.initial.push(object);
        }
        drop(known);
        self
    }

    /// Never report the initial sync as complete.
    pub fn never_sync(mut self) -> Self {
        self.sync_on_start = false;
        self
    }

    /// Make `run` fail immediately.
    pub fn fail_with(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }
}

#[async_trait::async_trait]
impl ResourceWatch for MemoryWatch {
    async fn run(&self, sink: EventSink, mut stop: watch::Receiver<bool>) -> Result<(), WatchError> {
        if let Some(message) = &self.failure {
            return Err(WatchError::Notify(message.clone()));
        }

        let taken = lock(&self.commands).take();
        let mut commands = taken
            .ok_or_else(|| WatchError::Notify("memory watch is already running".to_string()))?;

        for object in &self.initial {
            sink.send(WatchEvent::Created(object.clone())).await?;
        }
        if self.sync_on_start {
            self.synced.store(true, Ordering::Release);
        }

        loop {
            if *stop.borrow() {
                break;
            }

            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                command = commands.recv() => match command {
                    Some(Command::Event(event)) => sink.send(event).await?,
                    Some(Command::Flush(ack)) => {
                        let applied = sink.barrier().await?;
                        let _ = applied.await;
                        let _ = ack.send(());
                    }
                    // Handle dropped: nothing more will arrive, wait for stop.
                    None => {
                        while !*stop.borrow() {
                            if stop.changed().await.is_err() {
                                break;
                            }
                        }
                        break;
                    }
                },
            }
        }

        Ok(())
    }

    fn has_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }
}

/// Mutates the objects seen by a [`MemoryWatch`].
#[derive(Clone)]
pub struct MemoryWatchHandle {
    sender: mpsc::UnboundedSender<Command>,
    objects: ObjectMap,
}

impl MemoryWatchHandle {
    /// Creates or replaces an object, emitting `Created` or `Updated`.
    pub fn apply(&self, object: DynamicObject) -> Result<(), WatchError> {
        let previous = lock(&self.objects).insert(object_key(&object), object.clone());
        let event = match previous {
            Some(old) => WatchEvent::Updated { old, new: object },
            None => WatchEvent::Created(object),
        };
        self.send(event)
    }

    /// Typed form of [`MemoryWatchHandle::apply`].
    pub fn apply_config(&self, config: &ServiceBrokerConfig) -> Result<(), WatchError> {
        let object = config
            .to_dynamic()
            .map_err(|e: DecodeError| WatchError::Notify(e.to_string()))?;
        self.apply(object)
    }

    /// Removes an object. Returns false if it was not known.
    pub fn delete(&self, object: &DynamicObject) -> Result<bool, WatchError> {
        let removed = lock(&self.objects).remove(&object_key(object));
        match removed {
            Some(last) => self.send(WatchEvent::Deleted(last)).map(|_| true),
            None => Ok(false),
        }
    }

    /// Sends an event as is, bypassing the object bookkeeping.
    pub fn send(&self, event: WatchEvent) -> Result<(), WatchError> {
        self.sender
            .send(Command::Event(event))
            .map_err(|_| WatchError::ChannelClosed)
    }

    /// Waits until every event sent so far has been applied by the consumer.
    pub async fn flush(&self) -> Result<(), WatchError> {
        let (ack, done) = oneshot::channel();
        self.sender
            .send(Command::Flush(ack))
            .map_err(|_| WatchError::ChannelClosed)?;
        done.await.map_err(|_| WatchError::ChannelClosed)
    }

    /// The object as last applied, if any.
    pub fn get(&self, api_version: &str, kind: &str, name: &str) -> Option<DynamicObject> {
        lock(&self.objects)
            .get(&format!("{}/{}/{}", api_version, kind, name))
            .cloned()
    }
}

/// A [`StatusWriter`] that records every write.
#[derive(Debug, Default)]
pub struct RecordingStatusWriter {
    writes: Mutex<Vec<ServiceBrokerConfig>>,
    failure: Mutex<Option<String>>,
}

impl RecordingStatusWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects all further writes with `message`.
    pub fn fail_writes(&self, message: impl Into<String>) {
        *lock(&self.failure) = Some(message.into());
    }

    pub fn succeed_writes(&self) {
        *lock(&self.failure) = None;
    }

    /// Successful writes, oldest first.
    pub fn writes(&self) -> Vec<ServiceBrokerConfig> {
        lock(&self.writes).clone()
    }

    pub fn write_count(&self) -> usize {
        lock(&self.writes).len()
    }

    pub fn last_status(&self) -> Option<ServiceBrokerConfigStatus> {
        lock(&self.writes).last().map(|c| c.status.clone())
    }
}

#[async_trait::async_trait]
impl StatusWriter for RecordingStatusWriter {
    async fn update_status(&self, config: &ServiceBrokerConfig) -> Result<(), StatusWriteError> {
        if let Some(message) = lock(&self.failure).clone() {
            return Err(StatusWriteError::Rejected(message));
        }
        lock(&self.writes).push(config.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::resource::ObjectMeta;
    use crate::controller::watch::Envelope;

    fn object(name: &str, value: &str) -> DynamicObject {
        let mut data = serde_json::Map::new();
        data.insert("data".to_string(), serde_json::json!({ "value": value }));
        DynamicObject {
            api_version: "v1".to_string(),
            kind: "ConfigMap".to_string(),
            metadata: ObjectMeta::new(name),
            data,
        }
    }

    #[tokio::test]
    async fn test_initial_objects_then_sync() {
        let (watch, _handle) = MemoryWatch::new();
        let watch = Arc::new(watch.with_objects([object("a", "1")]));
        let (tx, mut rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = watch::channel(false);

        assert!(!watch.has_synced());
        let task = {
            let watch = Arc::clone(&watch);
            tokio::spawn(async move { watch.run(EventSink::new(tx), stop_rx).await })
        };

        match rx.recv().await {
            Some(Envelope::Event(WatchEvent::Created(o))) => assert_eq!(o.name(), "a"),
            other => panic!("unexpected {:?}", other),
        }
        while !watch.has_synced() {
            tokio::task::yield_now().await;
        }

        stop_tx.send(true).unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_handle_emits_created_updated_deleted() {
        let (watch, handle) = MemoryWatch::new();
        let (tx, mut rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(async move { watch.run(EventSink::new(tx), stop_rx).await });

        handle.apply(object("a", "1")).unwrap();
        handle.apply(object("a", "2")).unwrap();
        assert!(handle.delete(&object("a", "2")).unwrap());
        assert!(!handle.delete(&object("a", "2")).unwrap());

        assert!(matches!(
            rx.recv().await,
            Some(Envelope::Event(WatchEvent::Created(_)))
        ));
        match rx.recv().await {
            Some(Envelope::Event(WatchEvent::Updated { old, new })) => {
                assert_eq!(old, object("a", "1"));
                assert_eq!(new, object("a", "2"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            rx.recv().await,
            Some(Envelope::Event(WatchEvent::Deleted(_)))
        ));

        stop_tx.send(true).unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_failing_watch() {
        let (watch, _handle) = MemoryWatch::new();
        let watch = watch.fail_with("boom");
        let (tx, _rx) = mpsc::channel(1);
        let (_stop_tx, stop_rx) = watch::channel(false);

        let err = watch.run(EventSink::new(tx), stop_rx).await.unwrap_err();
        assert!(matches!(err, WatchError::Notify(ref m) if m == "boom"));
    }

    #[tokio::test]
    async fn test_recording_writer() {
        let writer = RecordingStatusWriter::new();
        let config = ServiceBrokerConfig::new("x", Default::default());

        writer.update_status(&config).await.unwrap();
        writer.fail_writes("nope");
        assert!(matches!(
            writer.update_status(&config).await,
            Err(StatusWriteError::Rejected(_))
        ));
        writer.succeed_writes();
        writer.update_status(&config).await.unwrap();

        assert_eq!(writer.write_count(), 2);
        assert_eq!(writer.writes()[0], config);
    }
}
