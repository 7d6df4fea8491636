//! Cross-reference validation for the service broker configuration.
//!
//! The CRD schema only checks field shapes. Everything that relates one part of
//! the configuration to another is checked here, and any violation invalidates
//! the whole configuration: template rendering assumes referential integrity.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use super::resource::{
    ConfigurationBinding, RegistryScope, ServiceBrokerConfig, ServiceBrokerConfigSpec,
    TemplateList,
};

static RE_DNS_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").unwrap());

static RE_DNS_LABEL_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][-a-z0-9]*$").unwrap());

const MAX_DNS_LABEL_LENGTH: usize = 63;

/// The provisioning operation a template list belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ServiceInstance,
    ServiceBinding,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::ServiceInstance => write!(f, "service instance"),
            Operation::ServiceBinding => write!(f, "service binding"),
        }
    }
}

/// A single violated invariant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    #[error("service plan {plan} for offering {service} does not have a configuration binding")]
    MissingBinding { service: String, plan: String },

    #[error(
        "service plan {plan} for offering {service} has multiple configuration bindings: {}",
        .bindings.join(", ")
    )]
    DuplicateBinding {
        service: String,
        plan: String,
        bindings: Vec<String>,
    },

    #[error(
        "configuration binding {binding} references service plan {plan} for offering {service}, which is not in the catalog"
    )]
    UnknownServicePlan {
        binding: String,
        service: String,
        plan: String,
    },

    #[error(
        "service plan {plan} for offering {service} not bindable, but configuration binding {binding} defines service binding configuration"
    )]
    UnexpectedServiceBinding {
        binding: String,
        service: String,
        plan: String,
    },

    #[error(
        "service plan {plan} for offering {service} bindable, but configuration binding {binding} does not define service binding configuration"
    )]
    MissingServiceBinding {
        binding: String,
        service: String,
        plan: String,
    },

    #[error("configuration binding {binding} does nothing for {operation}s")]
    EmptyTemplateList {
        binding: String,
        operation: Operation,
    },

    #[error("template {template} referenced by configuration binding {binding} {operation} must exist")]
    UnknownTemplate {
        template: String,
        binding: String,
        operation: Operation,
    },

    #[error("configuration binding {binding} with registry scope {scope} {reason}")]
    InvalidRegistryScope {
        binding: String,
        scope: RegistryScope,
        reason: String,
    },

    #[error("configuration binding name {0} is not unique")]
    DuplicateBindingName(String),

    #[error("template name {0} is not unique")]
    DuplicateTemplateName(String),
}

/// All invariants violated by a configuration, in check order.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", join_violations(.violations))]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validates a configuration resource.
pub fn validate(config: &ServiceBrokerConfig) -> Result<(), ValidationError> {
    ConfigValidator::new().validate(&config.spec)
}

/// Validator for service broker configuration.
#[derive(Debug, Default)]
pub struct ConfigValidator {
    /// Collected violations.
    violations: Vec<Violation>,
}

impl ConfigValidator {
    /// Creates a new validator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the violations found by the last call to `validate`.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Validates the entire configuration, collecting every violation.
    pub fn validate(&mut self, spec: &ServiceBrokerConfigSpec) -> Result<(), ValidationError> {
        self.violations.clear();

        self.validate_catalog_coverage(spec);
        self.validate_binding_targets(spec);

        for binding in &spec.bindings {
            self.validate_template_list(spec, binding, Operation::ServiceInstance);
            self.validate_template_list(spec, binding, Operation::ServiceBinding);
            self.validate_registry_scope(binding);
        }

        self.validate_unique_names(spec);

        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                violations: self.violations.clone(),
            })
        }
    }

    /// Every catalog plan has exactly one binding, and the binding declares
    /// service binding templates exactly when the plan is bindable.
    fn validate_catalog_coverage(&mut self, spec: &ServiceBrokerConfigSpec) {
        for service in &spec.catalog.services {
            for plan in &service.plans {
                let bindings: Vec<&ConfigurationBinding> =
                    spec.bindings_for(&service.name, &plan.name).collect();

                let binding = match bindings.as_slice() {
                    [] => {
                        self.violations.push(Violation::MissingBinding {
                            service: service.name.clone(),
                            plan: plan.name.clone(),
                        });
                        continue;
                    }
                    [binding] => binding,
                    [binding, ..] => {
                        self.violations.push(Violation::DuplicateBinding {
                            service: service.name.clone(),
                            plan: plan.name.clone(),
                            bindings: bindings.iter().map(|b| b.name.clone()).collect(),
                        });
                        binding
                    }
                };

                let bindable = plan.is_bindable(service);

                if !bindable && binding.service_binding.is_some() {
                    self.violations.push(Violation::UnexpectedServiceBinding {
                        binding: binding.name.clone(),
                        service: service.name.clone(),
                        plan: plan.name.clone(),
                    });
                }

                if bindable && binding.service_binding.is_none() {
                    self.violations.push(Violation::MissingServiceBinding {
                        binding: binding.name.clone(),
                        service: service.name.clone(),
                        plan: plan.name.clone(),
                    });
                }
            }
        }
    }

    /// Every binding points at a plan that exists.
    fn validate_binding_targets(&mut self, spec: &ServiceBrokerConfigSpec) {
        for binding in &spec.bindings {
            let exists = spec
                .service(&binding.service)
                .and_then(|s| s.plan(&binding.plan))
                .is_some();

            if !exists {
                self.violations.push(Violation::UnknownServicePlan {
                    binding: binding.name.clone(),
                    service: binding.service.clone(),
                    plan: binding.plan.clone(),
                });
            }
        }
    }

    /// A template list must do something, and everything it names must exist.
    fn validate_template_list(
        &mut self,
        spec: &ServiceBrokerConfigSpec,
        binding: &ConfigurationBinding,
        operation: Operation,
    ) {
        let list: &TemplateList = match operation {
            Operation::ServiceInstance => &binding.service_instance,
            Operation::ServiceBinding => match &binding.service_binding {
                Some(list) => list,
                None => return,
            },
        };

        // Registry-only lists pass: pre-computing registry values is work.
        if list.is_degenerate() {
            self.violations.push(Violation::EmptyTemplateList {
                binding: binding.name.clone(),
                operation,
            });
        }

        for template in list.template_names() {
            if spec.template(template).is_none() {
                self.violations.push(Violation::UnknownTemplate {
                    template: template.to_string(),
                    binding: binding.name.clone(),
                    operation,
                });
            }
        }
    }

    /// Scope-specific registry fields are present and usable as namespaces.
    fn validate_registry_scope(&mut self, binding: &ConfigurationBinding) {
        let scope = binding.registry_scope;
        let invalid = |reason: String| Violation::InvalidRegistryScope {
            binding: binding.name.clone(),
            scope,
            reason,
        };

        let violation = match scope {
            RegistryScope::Explicit => match binding.registry_namespace.as_deref() {
                None | Some("") => Some(invalid("requires registryNamespace".to_string())),
                Some(namespace) if !is_dns_label(namespace) => Some(invalid(format!(
                    "has invalid registryNamespace '{}'",
                    namespace
                ))),
                Some(_) => None,
            },
            RegistryScope::Prefixed => match binding.registry_prefix.as_deref() {
                None | Some("") => Some(invalid("requires registryPrefix".to_string())),
                Some(prefix) if !is_dns_label_prefix(prefix) => Some(invalid(format!(
                    "has invalid registryPrefix '{}'",
                    prefix
                ))),
                Some(_) if binding.registry_enabled_organizations.is_empty() => Some(invalid(
                    "requires at least one registryEnabledOrganizations entry".to_string(),
                )),
                Some(_) => None,
            },
            RegistryScope::BrokerLocal | RegistryScope::InstanceLocal => None,
        };

        if let Some(violation) = violation {
            self.violations.push(violation);
        }
    }

    /// Binding and template names are unique.
    fn validate_unique_names(&mut self, spec: &ServiceBrokerConfigSpec) {
        let mut binding_names: HashSet<&str> = HashSet::new();
        for binding in &spec.bindings {
            if !binding_names.insert(binding.name.as_str()) {
                self.violations
                    .push(Violation::DuplicateBindingName(binding.name.clone()));
            }
        }

        let mut template_names: HashSet<&str> = HashSet::new();
        for template in &spec.templates {
            if !template_names.insert(template.name.as_str()) {
                self.violations
                    .push(Violation::DuplicateTemplateName(template.name.clone()));
            }
        }
    }
}

pub(crate) fn is_dns_label(value: &str) -> bool {
    value.len() <= MAX_DNS_LABEL_LENGTH && RE_DNS_LABEL.is_match(value)
}

fn is_dns_label_prefix(value: &str) -> bool {
    value.len() < MAX_DNS_LABEL_LENGTH && RE_DNS_LABEL_PREFIX.is_match(value)
}

// ============================================================================
// Tests
// ============================================================================
