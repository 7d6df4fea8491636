//! A controller wired to in-memory collaborators.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use servicebroker::controller::{
    configure, Clients, ConfigStore, Controller, ControllerOptions, DynamicObject, MemoryWatch,
    MemoryWatchHandle, RecordingStatusWriter, ServiceBrokerConfig,
};

pub const TEST_NAMESPACE: &str = "brokers";
pub const TEST_TOKEN: &str = "test-token";

/// Test harness running a controller against a `MemoryWatch`.
pub struct ControllerHarness {
    pub controller: Controller,
    pub handle: MemoryWatchHandle,
    pub writer: Arc<RecordingStatusWriter>,
}

impl ControllerHarness {
    /// Starts a controller with an empty initial listing.
    pub async fn start() -> Self {
        Self::start_with(vec![]).await
    }

    /// Starts a controller whose watch lists `objects` initially.
    pub async fn start_with(objects: Vec<DynamicObject>) -> Self {
        let writer = Arc::new(RecordingStatusWriter::new());
        let (watch, handle) = MemoryWatch::new();

        let controller = configure(
            Clients::new(writer.clone()),
            TEST_NAMESPACE,
            SecretString::from(TEST_TOKEN),
            Arc::new(watch.with_objects(objects)),
            ControllerOptions {
                sync_timeout: Duration::from_secs(5),
                ..Default::default()
            },
        )
        .await
        .expect("controller failed to start");

        Self {
            controller,
            handle,
            writer,
        }
    }

    pub fn store(&self) -> Arc<ConfigStore> {
        self.controller.store()
    }

    /// Creates or updates the configuration and waits until it is applied.
    pub async fn apply(&self, config: &ServiceBrokerConfig) {
        self.handle.apply_config(config).unwrap();
        self.handle.flush().await.unwrap();
    }

    /// Applies the configuration with the status the source of truth now holds.
    pub async fn apply_with_recorded_status(&self, config: &ServiceBrokerConfig) {
        let mut config = config.clone();
        if let Some(status) = self.writer.last_status() {
            config.status = status;
        }
        self.apply(&config).await;
    }

    pub async fn delete(&self, config: &ServiceBrokerConfig) {
        let object = config.to_dynamic().unwrap();
        self.handle.delete(&object).unwrap();
        self.handle.flush().await.unwrap();
    }

    pub async fn is_ready(&self) -> bool {
        self.store().is_ready().await
    }

    pub async fn stop(self) {
        self.controller.stop().await;
    }
}
