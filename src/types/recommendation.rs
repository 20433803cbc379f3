//! Recommendation types and the status state machine

use super::action::OptimizationAction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How autonomously the controller is allowed to act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Apply automatically when confidence clears the auto-apply threshold
    Auto,
    /// Hold every recommendation for explicit operator approval
    #[default]
    SemiAuto,
    /// Record recommendations for visibility only — never actuate
    Monitoring,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Auto => write!(f, "auto"),
            ExecutionMode::SemiAuto => write!(f, "semi_auto"),
            ExecutionMode::Monitoring => write!(f, "monitoring"),
        }
    }
}

/// Lifecycle of a recommendation.
///
/// `Pending → {Approved → Applied, Rejected, Expired}`. `Applied`,
/// `Rejected`, `Expired`, and `Failed` are terminal for execution purposes;
/// `Completed` is reached only once the Learning Unit has processed the
/// corresponding experience. Superseded recommendations are marked terminal,
/// never erased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStatus {
    #[default]
    Pending,
    Approved,
    Applied,
    Rejected,
    Expired,
    Failed,
    Completed,
}

impl RecommendationStatus {
    /// True once the recommendation can no longer be applied.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RecommendationStatus::Rejected
                | RecommendationStatus::Expired
                | RecommendationStatus::Failed
                | RecommendationStatus::Completed
        )
    }
}

impl std::fmt::Display for RecommendationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecommendationStatus::Pending => "pending",
            RecommendationStatus::Approved => "approved",
            RecommendationStatus::Applied => "applied",
            RecommendationStatus::Rejected => "rejected",
            RecommendationStatus::Expired => "expired",
            RecommendationStatus::Failed => "failed",
            RecommendationStatus::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

/// Optimization target category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationCategory {
    #[default]
    Energy,
    Quality,
    Throughput,
}

/// Recommendation priority, derived from confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// Predicted effect of applying the recommended action.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictedEffect {
    /// Expected energy saving rate (%)
    pub energy_saving_rate: f64,
    /// Expected output quality (0–100)
    pub quality_score: f64,
    /// Expected throughput change (%)
    pub throughput_change: f64,
    /// Expected time to re-stabilize after the change (minutes)
    pub stabilization_time_min: f64,
}

/// A proposed control action with provenance and confidence.
///
/// Created by the Decision Policy with `status = Pending`; only the Execution
/// Controller mutates the status afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRecommendation {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub category: RecommendationCategory,
    pub priority: Priority,
    pub title: String,
    /// Human-readable rationale: pattern-based vs exploratory
    pub rationale: String,
    pub action: OptimizationAction,
    pub predicted_effect: PredictedEffect,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Pattern this recommendation came from, if exploiting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub based_on_pattern_id: Option<Uuid>,
    pub status: RecommendationStatus,
    pub execution_mode: ExecutionMode,
    /// Recorded reason when `status == Failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(!RecommendationStatus::Pending.is_terminal());
        assert!(!RecommendationStatus::Approved.is_terminal());
        assert!(!RecommendationStatus::Applied.is_terminal());
        assert!(RecommendationStatus::Rejected.is_terminal());
        assert!(RecommendationStatus::Expired.is_terminal());
        assert!(RecommendationStatus::Failed.is_terminal());
        assert!(RecommendationStatus::Completed.is_terminal());
    }

    #[test]
    fn execution_mode_serde() {
        let json = serde_json::to_string(&ExecutionMode::SemiAuto).unwrap();
        assert_eq!(json, "\"semi_auto\"");
        let mode: ExecutionMode = serde_json::from_str("\"monitoring\"").unwrap();
        assert_eq!(mode, ExecutionMode::Monitoring);
    }
}
