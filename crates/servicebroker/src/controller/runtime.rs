//! Controller startup and shutdown.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::Instrument;

use super::error::{ControllerError, Result, WatchError};
use super::router::EventRouter;
use super::status::StatusReconciler;
use super::store::ConfigStore;
use super::watch::{Clients, EventSink, ResourceWatch};

/// How often the initial sync predicate is polled.
const SYNC_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Tunables for [`configure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerOptions {
    /// How long to wait for the initial listing to be applied.
    pub sync_timeout: Duration,
    /// Bound of the queue between the watch and the router.
    pub event_queue_capacity: usize,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            sync_timeout: Duration::from_secs(60),
            event_queue_capacity: 256,
        }
    }
}

/// A running controller. Dropping it without [`Controller::stop`] leaves the
/// background tasks running until the runtime shuts down.
pub struct Controller {
    store: Arc<ConfigStore>,
    stop: watch::Sender<bool>,
    watch_task: Option<JoinHandle<std::result::Result<(), WatchError>>>,
    router_task: JoinHandle<()>,
}

/// Creates the configuration store and starts watching.
///
/// Returns once the watch has delivered its initial listing and the router
/// has applied it, so the store reflects the configuration as it existed at
/// startup.
pub async fn configure(
    clients: Clients,
    namespace: impl Into<String>,
    token: SecretString,
    watcher: Arc<dyn ResourceWatch>,
    options: ControllerOptions,
) -> Result<Controller> {
    let namespace = namespace.into();
    let span = tracing::info_span!("configure", namespace = %namespace);

    async move {
        let store = Arc::new(ConfigStore::new(clients.clone(), namespace, token));

        let (sender, queue) = mpsc::channel(options.event_queue_capacity.max(1));
        let sink = EventSink::new(sender);
        let (stop, stop_rx) = watch::channel(false);

        let router = EventRouter::new(
            Arc::clone(&store),
            StatusReconciler::new(Arc::clone(&clients.status)),
        );
        let router_task = tokio::spawn(router.run(queue));

        let watch_task = {
            let watcher = Arc::clone(&watcher);
            let sink = sink.clone();
            tokio::spawn(async move {
                let result = watcher.run(sink, stop_rx).await;
                match &result {
                    Ok(()) => log::debug!("Configuration watch stopped"),
                    Err(e) => log::error!("Configuration watch failed: {}", e),
                }
                result
            })
        };

        let mut controller = Controller {
            store,
            stop,
            watch_task: Some(watch_task),
            router_task,
        };

        log::info!("Waiting for service broker configuration to synchronize");
        let synced = controller
            .wait_for_sync(watcher.as_ref(), &sink, options.sync_timeout)
            .await;
        drop(sink);

        match synced {
            Ok(()) => {
                log::info!(
                    "Service broker configuration synchronized, ready: {}",
                    controller.store.is_ready().await
                );
                Ok(controller)
            }
            Err(e) => {
                controller.stop().await;
                Err(e)
            }
        }
    }
    .instrument(span)
    .await
}

impl Controller {
    /// The published configuration.
    pub fn store(&self) -> Arc<ConfigStore> {
        Arc::clone(&self.store)
    }

    /// Whether the watch is still running.
    pub fn is_running(&self) -> bool {
        self.watch_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Raises the stop signal and waits for the background tasks to end.
    pub async fn stop(self) {
        let _ = self.stop.send(true);

        if let Some(task) = self.watch_task {
            if let Err(e) = task.await {
                log::error!("Configuration watch task panicked: {}", e);
            }
        }
        if let Err(e) = self.router_task.await {
            log::error!("Event router task panicked: {}", e);
        }

        log::info!("Controller stopped");
    }

    async fn wait_for_sync(
        &mut self,
        watcher: &dyn ResourceWatch,
        sink: &EventSink,
        timeout: Duration,
    ) -> Result<()> {
        let deadline = Instant::now() + timeout;

        while !watcher.has_synced() {
            if !self.is_running() {
                let reason = match self.watch_task.take() {
                    Some(task) => match task.await {
                        Ok(Ok(())) => "watch stopped before initial sync".to_string(),
                        Ok(Err(e)) => e.to_string(),
                        Err(e) => e.to_string(),
                    },
                    None => "watch is not running".to_string(),
                };
                return Err(ControllerError::SyncFailed(reason));
            }

            if *self.stop.borrow() {
                return Err(ControllerError::SyncFailed("stop requested".to_string()));
            }

            if Instant::now() >= deadline {
                return Err(ControllerError::SyncTimeout(timeout));
            }

            tokio::time::sleep(SYNC_POLL_INTERVAL).await;
        }

        // Everything queued before the barrier is applied once it is acked.
        let applied = sink
            .barrier()
            .await
            .map_err(|e| ControllerError::SyncFailed(e.to_string()))?;

        match tokio::time::timeout_at(deadline, applied).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(ControllerError::SyncFailed(
                "event router stopped".to_string(),
            )),
            Err(_) => Err(ControllerError::SyncTimeout(timeout)),
        }
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("store", &self.store)
            .field("running", &self.is_running())
            .finish()
    }
}
