//! K8s-style resource types for the service broker configuration.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::DecodeError;

/// The API version of the configuration resource.
pub const API_VERSION: &str = "servicebroker.couchbase.com/v1alpha1";

/// The kind of the configuration resource.
pub const KIND: &str = "ServiceBrokerConfig";

/// The name of the one configuration resource the broker understands.
pub const CONFIGURATION_NAME: &str = "couchbase-service-broker";

/// Metadata for a resource, following K8s conventions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// The unique name of the resource within its namespace.
    pub name: String,

    /// The namespace the resource lives in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Key-value labels for organizing and selecting resources.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,

    /// Key-value annotations for storing additional metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub annotations: HashMap<String, String>,

    /// Opaque version string, bumped by the source of truth on every write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,

    /// Spec generation, bumped on spec changes only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<i64>,
}

impl ObjectMeta {
    /// Creates a new ObjectMeta with just a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

// ============================================================================
// Untyped objects
// ============================================================================

/// A watched object whose concrete type has not been checked yet.
///
/// This is what watch adapters deliver: the header fields every resource has,
/// plus everything else as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicObject {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(flatten)]
    pub data: serde_json::Map<String, Value>,
}

impl DynamicObject {
    /// Returns the name of the object.
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Returns the namespace of the object, if set.
    pub fn namespace(&self) -> Option<&str> {
        self.metadata.namespace.as_deref()
    }

    /// Returns true if the object has the given API version and kind.
    pub fn is_kind(&self, api_version: &str, kind: &str) -> bool {
        self.api_version == api_version && self.kind == kind
    }
}

// ============================================================================
// ServiceBrokerConfig
// ============================================================================

/// The user-supplied service broker configuration resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBrokerConfig {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    pub spec: ServiceBrokerConfigSpec,
    #[serde(default, skip_serializing_if = "ServiceBrokerConfigStatus::is_empty")]
    pub status: ServiceBrokerConfigStatus,
}

impl ServiceBrokerConfig {
    /// Creates a new configuration resource with an empty status.
    pub fn new(name: impl Into<String>, spec: ServiceBrokerConfigSpec) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ObjectMeta::new(name),
            spec,
            status: ServiceBrokerConfigStatus::default(),
        }
    }

    /// Returns the name of the resource.
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Decodes a typed configuration from an untyped watched object.
    ///
    /// The header is checked first so that objects of another kind are
    /// reported as such rather than as a confusing field error.
    pub fn from_dynamic(object: &DynamicObject) -> Result<Self, DecodeError> {
        if !object.is_kind(API_VERSION, KIND) {
            return Err(DecodeError::UnexpectedType {
                api_version: object.api_version.clone(),
                kind: object.kind.clone(),
            });
        }

        let value = serde_json::to_value(object).map_err(|e| DecodeError::Malformed {
            name: object.name().to_string(),
            message: e.to_string(),
        })?;

        serde_json::from_value(value).map_err(|e| DecodeError::Malformed {
            name: object.name().to_string(),
            message: e.to_string(),
        })
    }

    /// Converts the configuration into an untyped object.
    pub fn to_dynamic(&self) -> Result<DynamicObject, DecodeError> {
        serde_json::to_value(self)
            .and_then(serde_json::from_value)
            .map_err(|e| DecodeError::Malformed {
                name: self.name().to_string(),
                message: e.to_string(),
            })
    }
}

/// Top level service broker configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBrokerConfigSpec {
    /// The Open Service Broker catalog.
    pub catalog: ServiceCatalog,

    /// Resource templates that bindings may reference by name.
    #[serde(default)]
    pub templates: Vec<ConfigurationTemplate>,

    /// Links from service plans to the templates that realize them.
    #[serde(default)]
    pub bindings: Vec<ConfigurationBinding>,
}

impl ServiceBrokerConfigSpec {
    /// Looks up a declared template by name.
    pub fn template(&self, name: &str) -> Option<&ConfigurationTemplate> {
        self.templates.iter().find(|t| t.name == name)
    }

    /// Returns every binding for a service plan, in declaration order.
    pub fn bindings_for<'a>(
        &'a self,
        service: &'a str,
        plan: &'a str,
    ) -> impl Iterator<Item = &'a ConfigurationBinding> + 'a {
        self.bindings
            .iter()
            .filter(move |b| b.service == service && b.plan == plan)
    }

    /// Returns the first binding for a service plan.
    pub fn binding_for(&self, service: &str, plan: &str) -> Option<&ConfigurationBinding> {
        self.bindings
            .iter()
            .find(|b| b.service == service && b.plan == plan)
    }

    /// Looks up a service offering by name.
    pub fn service(&self, name: &str) -> Option<&ServiceOffering> {
        self.catalog.services.iter().find(|s| s.name == name)
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// The service catalog presented to API consumers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceCatalog {
    #[serde(default)]
    pub services: Vec<ServiceOffering>,
}

/// A service offering and its plans.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOffering {
    pub name: String,

    pub id: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Permissions the user must grant: syslog_drain, route_forwarding, volume_mount.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,

    /// Default bindability for every plan of this offering.
    #[serde(default)]
    pub bindable: bool,

    /// Opaque metadata, passed through to the platform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard_client: Option<DashboardClient>,

    #[serde(default)]
    pub plan_updatable: bool,

    #[serde(default)]
    pub plans: Vec<ServicePlan>,
}

impl ServiceOffering {
    /// Looks up a plan by name.
    pub fn plan(&self, name: &str) -> Option<&ServicePlan> {
        self.plans.iter().find(|p| p.name == name)
    }
}

/// Dashboard SSO client details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardClient {
    pub id: String,
    pub secret: String,
    #[serde(
        rename = "redirectedURI",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub redirected_uri: Option<String>,
}

/// A plan of a service offering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePlan {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,

    #[serde(default)]
    pub free: bool,

    /// Overrides the offering's bindability when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bindable: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schemas: Option<Schemas>,
}

impl ServicePlan {
    /// Returns whether the plan is bindable: the plan override if present,
    /// otherwise the offering default.
    pub fn is_bindable(&self, offering: &ServiceOffering) -> bool {
        self.bindable.unwrap_or(offering.bindable)
    }
}

/// Parameter schemas for instances and bindings of a plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schemas {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_instance: Option<ServiceInstanceSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_binding: Option<ServiceBindingSchema>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceInstanceSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create: Option<InputParametersSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<InputParametersSchema>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceBindingSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create: Option<InputParametersSchema>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputParametersSchema {
    /// JSON schema of the input parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

// ============================================================================
// Templates and bindings
// ============================================================================

/// A named resource template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationTemplate {
    pub name: String,

    /// The resource body to render.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<Value>,

    /// Singleton resources are looked up before creation instead of being
    /// created under a generated name.
    #[serde(default)]
    pub singleton: bool,
}

/// Sets a registry key from a templated value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryValue {
    pub name: String,
    pub value: String,
}

/// Where the registry of a service instance or binding is provisioned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistryScope {
    /// In a prefixed namespace chosen from the requesting organization.
    Prefixed,
    /// In an explicitly named namespace.
    Explicit,
    /// In the broker's own namespace.
    #[default]
    BrokerLocal,
    /// In the namespace of the service instance.
    InstanceLocal,
}

impl std::fmt::Display for RegistryScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryScope::Prefixed => write!(f, "Prefixed"),
            RegistryScope::Explicit => write!(f, "Explicit"),
            RegistryScope::BrokerLocal => write!(f, "BrokerLocal"),
            RegistryScope::InstanceLocal => write!(f, "InstanceLocal"),
        }
    }
}

/// A registry scope together with the fields that scope requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryPlacement<'a> {
    TenantPrefixed {
        prefix: &'a str,
        organizations: &'a [String],
    },
    Explicit {
        namespace: &'a str,
    },
    BrokerLocal,
    InstanceLocal,
}

/// Binds a service plan to the templates required to realize it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationBinding {
    pub name: String,

    #[serde(default)]
    pub registry_scope: RegistryScope,

    /// Only used by the `Explicit` scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_namespace: Option<String>,

    /// Only used by the `Prefixed` scope.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub registry_enabled_organizations: Vec<String>,

    /// Only used by the `Prefixed` scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_prefix: Option<String>,

    /// Name of the service offering.
    pub service: String,

    /// Name of the service plan.
    pub plan: String,

    /// What to do when a service instance is created.
    pub service_instance: TemplateList,

    /// What to do when a service binding is created. Present exactly when
    /// the plan is bindable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_binding: Option<TemplateList>,
}

impl ConfigurationBinding {
    /// Resolves the registry scope into a placement, or `None` when a field
    /// the scope requires is missing or empty.
    pub fn registry_placement(&self) -> Option<RegistryPlacement<'_>> {
        match self.registry_scope {
            RegistryScope::Prefixed => {
                let prefix = self.registry_prefix.as_deref().filter(|p| !p.is_empty())?;
                if self.registry_enabled_organizations.is_empty() {
                    return None;
                }
                Some(RegistryPlacement::TenantPrefixed {
                    prefix,
                    organizations: &self.registry_enabled_organizations,
                })
            }
            RegistryScope::Explicit => {
                let namespace = self
                    .registry_namespace
                    .as_deref()
                    .filter(|n| !n.is_empty())?;
                Some(RegistryPlacement::Explicit { namespace })
            }
            RegistryScope::BrokerLocal => Some(RegistryPlacement::BrokerLocal),
            RegistryScope::InstanceLocal => Some(RegistryPlacement::InstanceLocal),
        }
    }
}

/// Ordered instructions for one provisioning operation.
///
/// Either flat (`templates` + `readinessChecks`) or stepped (`steps`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateList {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub registry: Vec<RegistryValue>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub readiness_checks: Vec<ReadinessCheck>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<TemplateListStep>,
}

impl TemplateList {
    /// All referenced template names, flat ones first, then step by step.
    pub fn template_names(&self) -> impl Iterator<Item = &str> {
        self.templates
            .iter()
            .chain(self.steps.iter().flat_map(|s| s.templates.iter()))
            .map(String::as_str)
    }

    /// A degenerate list has neither registry entries nor templates.
    pub fn is_degenerate(&self) -> bool {
        self.registry.is_empty() && self.template_names().next().is_none()
    }
}

/// One step of a stepped template list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateListStep {
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub readiness_checks: Vec<ReadinessCheck>,
}

/// A check that must pass before an instance or binding is reported ready.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadinessCheck {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ReadinessCheckCondition>,

    /// Duration string, e.g. "1m".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

/// Polls a status condition on some resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessCheckCondition {
    pub api_version: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: String,
}

// ============================================================================
// Status
// ============================================================================

/// Status recorded on the configuration by the controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceBrokerConfigStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<ServiceBrokerConfigCondition>,
}

impl ServiceBrokerConfigStatus {
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Returns the first condition of the given type.
    pub fn condition(&self, condition_type: ConditionType) -> Option<&ServiceBrokerConfigCondition> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
    }
}

/// The type of a status condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionType {
    /// Whether the configuration passed validation.
    ConfigurationValid,
}

/// The value of a status condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
}

impl From<bool> for ConditionStatus {
    fn from(value: bool) -> Self {
        if value {
            ConditionStatus::True
        } else {
            ConditionStatus::False
        }
    }
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionStatus::True => write!(f, "True"),
            ConditionStatus::False => write!(f, "False"),
        }
    }
}

/// A single status fact about the configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBrokerConfigCondition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,

    pub status: ConditionStatus,

    /// When the status last changed value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,

    /// One word CamelCase reason for the last transition.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,

    /// Human readable details.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_yaml() -> &'static str {
        r#"
apiVersion: servicebroker.couchbase.com/v1alpha1
kind: ServiceBrokerConfig
metadata:
  name: couchbase-service-broker
  namespace: default
spec:
  catalog:
    services:
      - name: postgres
        id: 6b7ff1a6-1f0d-4bfa-9a7e-5f2a0d1c2e01
        description: PostgreSQL
        bindable: true
        plans:
          - name: small
            id: 1a4e5c1e-2b19-4b33-8b5a-0c7f9e0b2d11
            description: Small instance
            bindable: false
  templates:
    - name: pg-instance
      template:
        apiVersion: v1
        kind: Secret
  bindings:
    - name: postgres-small
      registryScope: Explicit
      registryNamespace: brokers
      service: postgres
      plan: small
      serviceInstance:
        registry:
          - name: password
            value: '{{ generatePassword 32 nil }}'
        steps:
          - name: create
            templates:
              - pg-instance
"#
    }

    #[test]
    fn test_deserialize_configuration() {
        let config: ServiceBrokerConfig = serde_yaml::from_str(minimal_yaml()).unwrap();

        assert_eq!(config.name(), CONFIGURATION_NAME);
        assert_eq!(config.metadata.namespace.as_deref(), Some("default"));
        assert!(config.status.is_empty());

        let offering = config.spec.service("postgres").unwrap();
        let plan = offering.plan("small").unwrap();
        assert!(!plan.is_bindable(offering));

        let binding = config.spec.binding_for("postgres", "small").unwrap();
        assert_eq!(binding.registry_scope, RegistryScope::Explicit);
        assert_eq!(
            binding.registry_placement(),
            Some(RegistryPlacement::Explicit {
                namespace: "brokers"
            })
        );
        assert_eq!(
            binding.service_instance.template_names().collect::<Vec<_>>(),
            vec!["pg-instance"]
        );
        assert!(binding.service_binding.is_none());
    }

    #[test]
    fn test_plan_bindable_defaults_to_offering() {
        let offering = ServiceOffering {
            name: "redis".to_string(),
            bindable: true,
            ..Default::default()
        };
        let plan = ServicePlan {
            name: "tiny".to_string(),
            ..Default::default()
        };
        assert!(plan.is_bindable(&offering));

        let plan = ServicePlan {
            bindable: Some(false),
            ..plan
        };
        assert!(!plan.is_bindable(&offering));
    }

    #[test]
    fn test_registry_scope_defaults_to_broker_local() {
        let binding: ConfigurationBinding = serde_json::from_value(json!({
            "name": "b",
            "service": "s",
            "plan": "p",
            "serviceInstance": { "templates": ["t"] }
        }))
        .unwrap();

        assert_eq!(binding.registry_scope, RegistryScope::BrokerLocal);
        assert_eq!(
            binding.registry_placement(),
            Some(RegistryPlacement::BrokerLocal)
        );
    }

    #[test]
    fn test_registry_placement_requires_scope_fields() {
        let mut binding = ConfigurationBinding {
            name: "b".to_string(),
            registry_scope: RegistryScope::Prefixed,
            registry_prefix: Some("tnt-".to_string()),
            ..Default::default()
        };
        assert_eq!(binding.registry_placement(), None);

        binding.registry_enabled_organizations = vec!["acme".to_string()];
        assert!(matches!(
            binding.registry_placement(),
            Some(RegistryPlacement::TenantPrefixed { prefix: "tnt-", .. })
        ));

        binding.registry_scope = RegistryScope::Explicit;
        assert_eq!(binding.registry_placement(), None);
    }

    #[test]
    fn test_template_list_degenerate() {
        assert!(TemplateList::default().is_degenerate());

        let registry_only = TemplateList {
            registry: vec![RegistryValue {
                name: "k".to_string(),
                value: "v".to_string(),
            }],
            ..Default::default()
        };
        assert!(!registry_only.is_degenerate());

        let empty_step = TemplateList {
            steps: vec![TemplateListStep {
                name: "noop".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(empty_step.is_degenerate());
    }

    #[test]
    fn test_from_dynamic_rejects_other_kinds() {
        let object: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": CONFIGURATION_NAME },
            "data": {}
        }))
        .unwrap();

        let err = ServiceBrokerConfig::from_dynamic(&object).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedType { ref kind, .. } if kind == "ConfigMap"));
    }

    #[test]
    fn test_from_dynamic_rejects_malformed_spec() {
        let object: DynamicObject = serde_json::from_value(json!({
            "apiVersion": API_VERSION,
            "kind": KIND,
            "metadata": { "name": CONFIGURATION_NAME },
            "spec": { "catalog": { "services": "not-a-list" } }
        }))
        .unwrap();

        let err = ServiceBrokerConfig::from_dynamic(&object).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { .. }));
    }

    #[test]
    fn test_dynamic_round_trip_keeps_status() {
        let mut config: ServiceBrokerConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        config.status.conditions.push(ServiceBrokerConfigCondition {
            condition_type: ConditionType::ConfigurationValid,
            status: ConditionStatus::True,
            last_transition_time: None,
            reason: "ValidationSucceeded".to_string(),
            message: String::new(),
        });

        let object = config.to_dynamic().unwrap();
        assert!(object.data.contains_key("spec"));
        assert!(object.data.contains_key("status"));

        let decoded = ServiceBrokerConfig::from_dynamic(&object).unwrap();
        assert_eq!(decoded, config);
    }

    #[test]
    fn test_condition_status_serialization() {
        assert_eq!(
            serde_json::to_string(&ConditionStatus::from(true)).unwrap(),
            "\"True\""
        );
        assert_eq!(
            serde_json::to_string(&ConditionType::ConfigurationValid).unwrap(),
            "\"ConfigurationValid\""
        );
    }
}
