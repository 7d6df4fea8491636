//! Builder patterns for creating test configurations programmatically.

#![allow(dead_code)]

use servicebroker::controller::{
    ConfigurationBinding, ConfigurationTemplate, DynamicObject, RegistryScope, RegistryValue,
    ServiceBrokerConfig, ServiceBrokerConfigSpec, ServiceCatalog, ServiceOffering, ServicePlan,
    TemplateList, TemplateListStep, CONFIGURATION_NAME,
};

/// Builder for creating `ServiceBrokerConfig` instances.
pub struct ConfigBuilder {
    name: String,
    namespace: Option<String>,
    services: Vec<ServiceOffering>,
    templates: Vec<ConfigurationTemplate>,
    bindings: Vec<ConfigurationBinding>,
}

impl ConfigBuilder {
    /// Create a builder for the singleton configuration with nothing in it.
    pub fn new() -> Self {
        Self {
            name: CONFIGURATION_NAME.to_string(),
            namespace: None,
            services: vec![],
            templates: vec![],
            bindings: vec![],
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }

    /// Add a service offering to the catalog.
    pub fn service(mut self, offering: ServiceOffering) -> Self {
        self.services.push(offering);
        self
    }

    /// Declare templates by name.
    pub fn templates(mut self, names: &[&str]) -> Self {
        self.templates.extend(names.iter().map(|name| ConfigurationTemplate {
            name: name.to_string(),
            template: Some(serde_json::json!({ "apiVersion": "v1", "kind": "Secret" })),
            singleton: false,
        }));
        self
    }

    pub fn binding(mut self, binding: ConfigurationBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn build_spec(self) -> ServiceBrokerConfigSpec {
        ServiceBrokerConfigSpec {
            catalog: ServiceCatalog {
                services: self.services,
            },
            templates: self.templates,
            bindings: self.bindings,
        }
    }

    pub fn build(self) -> ServiceBrokerConfig {
        let name = self.name.clone();
        let namespace = self.namespace.clone();
        let mut config = ServiceBrokerConfig::new(name, self.build_spec());
        config.metadata.namespace = namespace;
        config
    }

    /// Build and convert to the untyped form watch adapters deliver.
    pub fn build_object(self) -> DynamicObject {
        self.build().to_dynamic().unwrap()
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A service offering whose plans inherit its bindability.
pub fn offering(name: &str, bindable: bool, plans: &[&str]) -> ServiceOffering {
    ServiceOffering {
        name: name.to_string(),
        id: format!("{}-id", name),
        description: format!("{} service", name),
        bindable,
        plans: plans.iter().map(|p| plan(name, p)).collect(),
        ..Default::default()
    }
}

pub fn plan(service: &str, name: &str) -> ServicePlan {
    ServicePlan {
        id: format!("{}-{}-id", service, name),
        name: name.to_string(),
        description: format!("{} plan", name),
        ..Default::default()
    }
}

/// Builder for creating `ConfigurationBinding` instances.
pub struct BindingBuilder {
    binding: ConfigurationBinding,
}

impl BindingBuilder {
    pub fn new(name: &str, service: &str, plan: &str) -> Self {
        Self {
            binding: ConfigurationBinding {
                name: name.to_string(),
                service: service.to_string(),
                plan: plan.to_string(),
                ..Default::default()
            },
        }
    }

    /// Templates rendered when an instance is created.
    pub fn instance_templates(mut self, names: &[&str]) -> Self {
        self.binding.service_instance.templates = to_strings(names);
        self
    }

    /// Registry entries computed when an instance is created.
    pub fn instance_registry(mut self, key: &str, value: &str) -> Self {
        self.binding.service_instance.registry.push(RegistryValue {
            name: key.to_string(),
            value: value.to_string(),
        });
        self
    }

    /// Adds a step to the instance template list.
    pub fn instance_step(mut self, name: &str, templates: &[&str]) -> Self {
        self.binding.service_instance.steps.push(TemplateListStep {
            name: name.to_string(),
            templates: to_strings(templates),
            readiness_checks: vec![],
        });
        self
    }

    /// Templates rendered when a binding is created.
    pub fn binding_templates(mut self, names: &[&str]) -> Self {
        self.binding.service_binding = Some(TemplateList {
            templates: to_strings(names),
            ..Default::default()
        });
        self
    }

    /// Declares an empty service binding template list.
    pub fn empty_binding_list(mut self) -> Self {
        self.binding.service_binding = Some(TemplateList::default());
        self
    }

    pub fn explicit_registry(mut self, namespace: &str) -> Self {
        self.binding.registry_scope = RegistryScope::Explicit;
        self.binding.registry_namespace = Some(namespace.to_string());
        self
    }

    pub fn scope(mut self, scope: RegistryScope) -> Self {
        self.binding.registry_scope = scope;
        self
    }

    pub fn build(self) -> ConfigurationBinding {
        self.binding
    }
}

fn to_strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// postgres/small, bindable, with instance and binding templates declared.
pub fn postgres_builder() -> ConfigBuilder {
    ConfigBuilder::new()
        .service(offering("postgres", true, &["small"]))
        .templates(&["pg-instance", "pg-binding"])
        .binding(
            BindingBuilder::new("postgres-small", "postgres", "small")
                .instance_templates(&["pg-instance"])
                .binding_templates(&["pg-binding"])
                .build(),
        )
}

pub fn postgres_config() -> ServiceBrokerConfig {
    postgres_builder().build()
}
