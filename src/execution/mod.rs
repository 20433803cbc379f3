//! Execution controller — bounded-autonomy gate between decisions and actuators
//!
//! The controller owns every status transition after `Pending`. Whatever the
//! policy recommends, nothing reaches an actuator without clearing the mode
//! gate (auto threshold or operator approval) and then the safety envelope.
//! Actuator faults are absorbed here: the recommendation is marked `Failed`
//! with a reason and the loop carries on.

mod safety;

pub use safety::{verify_action, SafetyViolation};

use crate::config::{ExecutionConfig, SafetyConfig};
use crate::types::{
    ExecutionMode, OptimizationAction, OptimizationRecommendation, RecommendationStatus,
    SensorAggregates,
};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ActuationError {
    #[error("actuator rejected the command: {0}")]
    Rejected(String),

    #[error("actuator did not acknowledge in time")]
    Timeout,
}

/// Boundary to the physical line. Implementations talk PLC, OPC-UA, or a
/// simulator; the loop only sees this trait.
#[async_trait]
pub trait Actuator: Send + Sync {
    async fn apply_action(&self, action: &OptimizationAction) -> Result<(), ActuationError>;
}

/// What the ACT phase did with a recommendation.
#[derive(Debug, Clone, PartialEq)]
pub enum ActOutcome {
    /// Action went to the actuator; status is `Applied`
    Applied,
    /// Awaiting approval or below the auto threshold; status stays `Pending`
    Held,
    /// Safety or actuator failure; status is `Failed` with a reason
    Failed(String),
}

pub struct ExecutionController {
    actuator: std::sync::Arc<dyn Actuator>,
    execution: ExecutionConfig,
    safety: SafetyConfig,
}

impl ExecutionController {
    pub fn new(
        actuator: std::sync::Arc<dyn Actuator>,
        execution: ExecutionConfig,
        safety: SafetyConfig,
    ) -> Self {
        Self {
            actuator,
            execution,
            safety,
        }
    }

    /// Mode gate for a fresh recommendation. Only auto mode with confidence
    /// at or above the threshold proceeds to actuation; everything else is
    /// held pending.
    pub async fn act(
        &self,
        recommendation: &mut OptimizationRecommendation,
        current: &SensorAggregates,
    ) -> ActOutcome {
        match self.execution.mode {
            ExecutionMode::Auto
                if recommendation.confidence >= self.execution.auto_apply_threshold =>
            {
                self.apply(recommendation, current).await
            }
            ExecutionMode::Auto => {
                info!(
                    recommendation_id = %recommendation.id,
                    confidence = recommendation.confidence,
                    threshold = self.execution.auto_apply_threshold,
                    "Confidence below auto-apply threshold — holding for approval"
                );
                ActOutcome::Held
            }
            ExecutionMode::SemiAuto => {
                info!(
                    recommendation_id = %recommendation.id,
                    "Holding recommendation for operator approval"
                );
                ActOutcome::Held
            }
            ExecutionMode::Monitoring => {
                info!(
                    recommendation_id = %recommendation.id,
                    "Monitoring mode — recommendation recorded, not applied"
                );
                ActOutcome::Held
            }
        }
    }

    /// Safety-check and actuate. Used by the auto path and by explicit
    /// operator approval. Failures land on the recommendation, never on the
    /// caller.
    pub async fn apply(
        &self,
        recommendation: &mut OptimizationRecommendation,
        current: &SensorAggregates,
    ) -> ActOutcome {
        if let Err(violation) = verify_action(&recommendation.action, &self.safety, current) {
            let reason = format!("safety check failed: {violation}");
            warn!(recommendation_id = %recommendation.id, %violation, "Action blocked by safety envelope");
            recommendation.status = RecommendationStatus::Failed;
            recommendation.failure_reason = Some(reason.clone());
            return ActOutcome::Failed(reason);
        }

        recommendation.status = RecommendationStatus::Approved;
        match self.actuator.apply_action(&recommendation.action).await {
            Ok(()) => {
                recommendation.status = RecommendationStatus::Applied;
                info!(recommendation_id = %recommendation.id, "Action applied to the line");
                ActOutcome::Applied
            }
            Err(e) => {
                let reason = format!("actuation failed: {e}");
                warn!(recommendation_id = %recommendation.id, error = %e, "Actuator fault");
                recommendation.status = RecommendationStatus::Failed;
                recommendation.failure_reason = Some(reason.clone());
                ActOutcome::Failed(reason)
            }
        }
    }
}
