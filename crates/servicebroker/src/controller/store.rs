//! The published configuration snapshot.
//!
//! Readers bracket each request with [`ConfigStore::acquire_read`] and drop
//! (or [`ConfigReadGuard::release`]) the guard when done, so one request sees
//! one configuration throughout. Only the event router writes.

use std::sync::Arc;

use secrecy::SecretString;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::error::NotReady;
use super::resource::ServiceBrokerConfig;
use super::watch::Clients;

type Snapshot = Option<Arc<ServiceBrokerConfig>>;

/// Holder for the last known-good configuration.
///
/// An empty store means the service is not ready.
pub struct ConfigStore {
    config: RwLock<Snapshot>,
    clients: Clients,
    token: SecretString,
    namespace: String,
}

impl ConfigStore {
    /// Creates an empty store.
    pub fn new(clients: Clients, namespace: impl Into<String>, token: SecretString) -> Self {
        Self {
            config: RwLock::new(None),
            clients,
            token,
            namespace: namespace.into(),
        }
    }

    /// Begins a read. Waits while the router is installing a snapshot.
    pub async fn acquire_read(&self) -> ConfigReadGuard<'_> {
        ConfigReadGuard {
            snapshot: self.config.read().await,
            store: self,
        }
    }

    /// Begins a read from synchronous code.
    ///
    /// Panics if called from within an async execution context.
    pub fn blocking_acquire_read(&self) -> ConfigReadGuard<'_> {
        ConfigReadGuard {
            snapshot: self.config.blocking_read(),
            store: self,
        }
    }

    /// Whether a valid configuration is published.
    pub async fn is_ready(&self) -> bool {
        self.config.read().await.is_some()
    }

    pub(crate) async fn acquire_write(&self) -> RwLockWriteGuard<'_, Snapshot> {
        self.config.write().await
    }

    /// Publishes a validated configuration.
    pub(crate) async fn install(&self, config: ServiceBrokerConfig) {
        *self.acquire_write().await = Some(Arc::new(config));
    }

    /// Withdraws the published configuration.
    pub(crate) async fn clear(&self) {
        *self.acquire_write().await = None;
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("namespace", &self.namespace)
            .field("clients", &self.clients)
            .finish_non_exhaustive()
    }
}

/// A consistent view of the store for the duration of one request.
pub struct ConfigReadGuard<'a> {
    snapshot: RwLockReadGuard<'a, Snapshot>,
    store: &'a ConfigStore,
}

impl<'a> ConfigReadGuard<'a> {
    /// The published configuration, or `None` when not ready.
    pub fn config(&self) -> Option<&ServiceBrokerConfig> {
        self.snapshot.as_deref()
    }

    /// The published configuration, or [`NotReady`].
    pub fn require_config(&self) -> Result<&ServiceBrokerConfig, NotReady> {
        self.config().ok_or(NotReady)
    }

    /// A shared handle to the published configuration, usable after release.
    pub fn snapshot(&self) -> Option<Arc<ServiceBrokerConfig>> {
        self.snapshot.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn clients(&self) -> &'a Clients {
        &self.store.clients
    }

    pub fn token(&self) -> &'a SecretString {
        &self.store.token
    }

    pub fn namespace(&self) -> &'a str {
        &self.store.namespace
    }

    /// Ends the read.
    pub fn release(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::memory::RecordingStatusWriter;
    use crate::controller::resource::{ServiceBrokerConfigSpec, CONFIGURATION_NAME};
    use secrecy::ExposeSecret;
    use std::time::Duration;

    fn store() -> Arc<ConfigStore> {
        let clients = Clients::new(Arc::new(RecordingStatusWriter::new()));
        Arc::new(ConfigStore::new(
            clients,
            "brokers",
            SecretString::from("s3cr3t"),
        ))
    }

    fn config() -> ServiceBrokerConfig {
        ServiceBrokerConfig::new(CONFIGURATION_NAME, ServiceBrokerConfigSpec::default())
    }

    #[tokio::test]
    async fn test_new_store_is_not_ready() {
        let store = store();
        assert!(!store.is_ready().await);

        let guard = store.acquire_read().await;
        assert!(guard.config().is_none());
        assert_eq!(guard.require_config(), Err(NotReady));
        assert_eq!(guard.namespace(), "brokers");
        assert_eq!(guard.token().expose_secret(), "s3cr3t");
    }

    #[tokio::test]
    async fn test_install_and_clear() {
        let store = store();

        store.install(config()).await;
        assert!(store.is_ready().await);
        {
            let guard = store.acquire_read().await;
            assert_eq!(guard.require_config().unwrap().name(), CONFIGURATION_NAME);
            guard.release();
        }

        store.clear().await;
        assert!(!store.is_ready().await);
    }

    #[tokio::test]
    async fn test_many_concurrent_readers() {
        let store = store();
        store.install(config()).await;

        let a = store.acquire_read().await;
        let b = store.acquire_read().await;
        assert!(a.is_ready() && b.is_ready());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_writer_waits_for_reader() {
        let store = store();
        store.install(config()).await;

        let guard = store.acquire_read().await;

        let writer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.clear().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!writer.is_finished());
        assert!(guard.is_ready());

        guard.release();
        writer.await.unwrap();
        assert!(!store.is_ready().await);
    }

    #[tokio::test]
    async fn test_snapshot_outlives_guard() {
        let store = store();
        store.install(config()).await;

        let snapshot = store.acquire_read().await.snapshot().unwrap();
        store.clear().await;
        assert_eq!(snapshot.name(), CONFIGURATION_NAME);
    }

    #[test]
    fn test_blocking_read() {
        let store = store();
        let guard = store.blocking_acquire_read();
        assert!(!guard.is_ready());
    }
}
