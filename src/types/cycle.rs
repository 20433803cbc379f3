//! Cycle result types
//!
//! One `CycleResult` is produced per SENSE→DECIDE→ACT pass, with a per-phase
//! breakdown so operators can see exactly where a cycle stopped.

use super::action::OptimizationAction;
use super::recommendation::OptimizationRecommendation;
use super::state::SensorState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// SENSE phase outcome.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SensePhase {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// DECIDE phase outcome.
///
/// `success` with `recommendation: None` is a normal quiet cycle — either no
/// opportunity was found or a prior recommendation still occupies the pending
/// slot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DecidePhase {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<OptimizationRecommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// ACT phase outcome.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActPhase {
    pub success: bool,
    /// The action reached the actuator
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// LEARN phase outcome. Learning is deferred past the observation window, so
/// within a cycle this only records whether a learning obligation was issued.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LearnPhase {
    pub success: bool,
    pub deferred: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Deferred learning obligation issued when an action is applied.
///
/// The caller holds the token for the observation window, captures an after
/// snapshot, and redeems it through the orchestrator exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningToken {
    pub recommendation_id: Uuid,
    pub before_state: SensorState,
    pub action: OptimizationAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub based_on_pattern_id: Option<Uuid>,
    pub applied_at: DateTime<Utc>,
}

/// Full record of one optimization cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleResult {
    pub cycle_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub sense: SensePhase,
    pub decide: DecidePhase,
    pub act: ActPhase,
    pub learn: LearnPhase,
    /// False only when a phase failed abnormally; quiet cycles are successful
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learning_insight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Present when the cycle applied an action and learning is now owed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_learning: Option<LearningToken>,
}

impl CycleResult {
    pub(crate) fn begin() -> Self {
        Self {
            cycle_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            sense: SensePhase::default(),
            decide: DecidePhase::default(),
            act: ActPhase::default(),
            learn: LearnPhase::default(),
            success: false,
            learning_insight: None,
            error: None,
            pending_learning: None,
        }
    }
}
