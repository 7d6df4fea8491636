//! Routes watch events for the configuration resource to the store.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::resource::{DynamicObject, ServiceBrokerConfig, API_VERSION, CONFIGURATION_NAME, KIND};
use super::status::{StatusReconciler, StatusWrite};
use super::store::ConfigStore;
use super::watch::{Envelope, WatchEvent};

/// The single writer of a [`ConfigStore`].
///
/// Events must be handled one at a time, in delivery order.
pub struct EventRouter {
    store: Arc<ConfigStore>,
    reconciler: StatusReconciler,
}

impl EventRouter {
    pub fn new(store: Arc<ConfigStore>, reconciler: StatusReconciler) -> Self {
        Self { store, reconciler }
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    /// Applies one event to the store.
    pub async fn handle(&self, event: WatchEvent) {
        match event {
            WatchEvent::Created(object) => self.apply(&object, "created").await,
            // Only the new state matters.
            WatchEvent::Updated { new, .. } => self.apply(&new, "updated").await,
            WatchEvent::Deleted(object) => self.remove(&object).await,
        }
    }

    /// Consumes the event queue until every sender is gone.
    pub(crate) async fn run(self, mut queue: mpsc::Receiver<Envelope>) {
        while let Some(envelope) = queue.recv().await {
            match envelope {
                Envelope::Event(event) => self.handle(event).await,
                Envelope::Barrier(ack) => {
                    let _ = ack.send(());
                }
            }
        }
        log::debug!("Event queue closed, router stopped");
    }

    async fn apply(&self, object: &DynamicObject, action: &str) {
        let Some(config) = self.accept(object) else {
            return;
        };

        log::debug!("Service broker configuration '{}' {}", config.name(), action);
        dump(object);

        let result = self.reconciler.reconcile(&config).await;

        if let StatusWrite::Failed(e) = &result.write {
            // Retried on the next event; the verdict stands either way.
            log::warn!(
                "Failed to update status of service broker configuration '{}': {}",
                config.name(),
                e
            );
        }

        match result.verdict {
            Ok(()) => {
                let name = config.name().to_string();
                self.store.install(config).await;
                log::info!("Service broker configuration '{}' installed, service ready", name);
            }
            Err(e) => {
                self.store.clear().await;
                log::info!(
                    "Service broker configuration '{}' invalid, see resource status for details",
                    config.name()
                );
                log::debug!("Validation of '{}' failed: {}", config.name(), e);
            }
        }
    }

    async fn remove(&self, object: &DynamicObject) {
        if !self.is_configuration(object) {
            return;
        }

        dump(object);
        self.store.clear().await;
        log::info!(
            "Service broker configuration '{}' deleted, service unready",
            object.name()
        );
    }

    /// Returns the typed configuration if the object is the configuration
    /// resource, logging why not otherwise.
    fn accept(&self, object: &DynamicObject) -> Option<ServiceBrokerConfig> {
        if !self.is_configuration(object) {
            return None;
        }

        match ServiceBrokerConfig::from_dynamic(object) {
            Ok(config) => Some(config),
            Err(e) => {
                log::error!("Dropping watch event: {}", e);
                None
            }
        }
    }

    fn is_configuration(&self, object: &DynamicObject) -> bool {
        if !object.is_kind(API_VERSION, KIND) {
            log::error!(
                "Dropping watch event for unexpected object type {}/{} '{}'",
                object.api_version,
                object.kind,
                object.name()
            );
            return false;
        }

        if object.name() != CONFIGURATION_NAME {
            log::debug!(
                "Ignoring {} '{}', only '{}' is used",
                KIND,
                object.name(),
                CONFIGURATION_NAME
            );
            return false;
        }

        true
    }
}

/// Logs the full object. May contain credentials, hence trace only.
fn dump(object: &DynamicObject) {
    if !log::log_enabled!(log::Level::Trace) {
        return;
    }
    match serde_json::to_string(object) {
        Ok(json) => log::trace!("{}", json),
        Err(e) => log::trace!("Failed to serialize '{}': {}", object.name(), e),
    }
}
