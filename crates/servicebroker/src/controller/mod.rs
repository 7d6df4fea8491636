//! Dynamic configuration controller for the service broker.
//!
//! Watches the `ServiceBrokerConfig` resource and keeps a validated snapshot
//! of it for request handlers:
//! - Watch adapters deliver events over an ordered queue
//! - A single router validates, records status and publishes
//! - Readers take a consistent snapshot per request from the store
//! - An invalid or deleted configuration makes the service unready

pub mod directory;
pub mod error;
pub mod memory;
pub mod resource;
pub mod router;
pub mod runtime;
pub mod status;
pub mod store;
pub mod validation;
pub mod watch;

pub use directory::{DirectoryStatusWriter, DirectoryWatch};
pub use error::{
    ControllerError, DecodeError, NotReady, Result, StatusWriteError, WatchError,
};
pub use memory::{MemoryWatch, MemoryWatchHandle, RecordingStatusWriter};
pub use resource::{
    ConditionStatus, ConditionType, ConfigurationBinding, ConfigurationTemplate, DynamicObject,
    ObjectMeta, ReadinessCheck, ReadinessCheckCondition, RegistryPlacement, RegistryScope,
    RegistryValue, ServiceBrokerConfig, ServiceBrokerConfigCondition, ServiceBrokerConfigSpec,
    ServiceBrokerConfigStatus, ServiceCatalog, ServiceOffering, ServicePlan, TemplateList,
    TemplateListStep, API_VERSION, CONFIGURATION_NAME, KIND,
};
pub use router::EventRouter;
pub use runtime::{configure, Controller, ControllerOptions};
pub use status::{
    compute_status, Reconciliation, StatusReconciler, StatusWrite, REASON_VALIDATION_FAILED,
    REASON_VALIDATION_SUCCEEDED,
};
pub use store::{ConfigReadGuard, ConfigStore};
pub use validation::{validate, ConfigValidator, Operation, ValidationError, Violation};
pub use watch::{Clients, EventSink, ResourceWatch, StatusWriter, WatchEvent};
