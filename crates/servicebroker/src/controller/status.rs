//! Status reconciliation: validate → derive the validity condition → write back.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use tracing::Instrument;

use super::error::StatusWriteError;
use super::resource::{
    ConditionStatus, ConditionType, ServiceBrokerConfig, ServiceBrokerConfigCondition,
    ServiceBrokerConfigStatus,
};
use super::validation::{validate, ValidationError};
use super::watch::StatusWriter;

/// Reason recorded when the configuration passed validation.
pub const REASON_VALIDATION_SUCCEEDED: &str = "ValidationSucceeded";

/// Reason recorded when the configuration failed validation.
pub const REASON_VALIDATION_FAILED: &str = "ValidationFailed";

/// Derives the status for `config` from a validation outcome.
///
/// The transition time is carried over from the recorded condition of the
/// same type when its value is unchanged, so repeated reconciliation with the
/// same verdict produces an identical status.
pub fn compute_status(
    config: &ServiceBrokerConfig,
    outcome: &Result<(), ValidationError>,
    now: DateTime<Utc>,
) -> ServiceBrokerConfigStatus {
    let mut condition = ServiceBrokerConfigCondition {
        condition_type: ConditionType::ConfigurationValid,
        status: ConditionStatus::True,
        last_transition_time: Some(now.trunc_subsecs(0)),
        reason: REASON_VALIDATION_SUCCEEDED.to_string(),
        message: String::new(),
    };

    if let Err(e) = outcome {
        condition.status = ConditionStatus::False;
        condition.reason = REASON_VALIDATION_FAILED.to_string();
        condition.message = e.to_string();
    }

    if let Some(previous) = config.status.condition(ConditionType::ConfigurationValid) {
        if previous.status == condition.status {
            condition.last_transition_time = previous.last_transition_time;
        }
    }

    ServiceBrokerConfigStatus {
        conditions: vec![condition],
    }
}

/// What happened to the remote status write.
#[derive(Debug)]
pub enum StatusWrite {
    /// The recorded status already matched; nothing was written.
    Unchanged,
    Written,
    /// The write failed. Local state is unaffected.
    Failed(StatusWriteError),
}

/// Outcome of one reconciliation.
#[derive(Debug)]
pub struct Reconciliation {
    /// The validation verdict. This alone decides readiness.
    pub verdict: Result<(), ValidationError>,
    pub write: StatusWrite,
}

impl Reconciliation {
    pub fn is_valid(&self) -> bool {
        self.verdict.is_ok()
    }
}

/// Validates configurations and records the verdict on their status.
#[derive(Clone)]
pub struct StatusReconciler {
    writer: Arc<dyn StatusWriter>,
}

impl StatusReconciler {
    pub fn new(writer: Arc<dyn StatusWriter>) -> Self {
        Self { writer }
    }

    /// Reconciles against the current wall clock.
    pub async fn reconcile(&self, config: &ServiceBrokerConfig) -> Reconciliation {
        self.reconcile_at(config, Utc::now()).await
    }

    /// Reconciles with an explicit notion of "now".
    pub async fn reconcile_at(
        &self,
        config: &ServiceBrokerConfig,
        now: DateTime<Utc>,
    ) -> Reconciliation {
        let span = tracing::info_span!("reconcile", name = %config.name());

        async move {
            let verdict = validate(config);
            let status = compute_status(config, &verdict, now);

            if status == config.status {
                log::debug!("Status of '{}' unchanged, skipping update", config.name());
                return Reconciliation {
                    verdict,
                    write: StatusWrite::Unchanged,
                };
            }

            let mut updated = config.clone();
            updated.status = status;

            let write = match self.writer.update_status(&updated).await {
                Ok(()) => StatusWrite::Written,
                Err(e) => StatusWrite::Failed(e),
            };

            Reconciliation { verdict, write }
        }
        .instrument(span)
        .await
    }
}
