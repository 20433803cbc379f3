//! Learning types: experiences, patterns, and aggregate model state

use super::action::OptimizationAction;
use super::state::SensorState;
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;
use uuid::Uuid;

// ============================================================================
// Outcome metrics
// ============================================================================

/// Derived comparison of before/after aggregates over one observation window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutcomeMetrics {
    /// Absolute energy saved over the window (kWh, positive = saved)
    pub energy_saved_kwh: f64,
    /// Energy saving as a percentage of the before consumption
    pub energy_saving_rate: f64,
    /// Output quality after the action (0–100)
    pub quality_score: f64,
    /// Process stability score (0–100, higher = more stable)
    pub stability_score: f64,
    /// Throughput change (%)
    pub throughput_change_percent: f64,
}

// ============================================================================
// Learning experience
// ============================================================================

/// Execution provenance attached to an experience.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExperienceMetadata {
    /// An operator explicitly approved the action
    pub operator_approved: bool,
    /// The controller applied the action autonomously
    pub auto_applied: bool,
    /// Typed extension map for ambient conditions (string key → scalar)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, f64>,
}

/// Write-once record of one applied action and its observed outcome.
///
/// The permanent audit and training record — never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningExperience {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub before_state: SensorState,
    pub action: OptimizationAction,
    pub after_state: SensorState,
    /// Observation window between the states
    pub observation_duration: Duration,
    pub outcome: OutcomeMetrics,
    /// Scalar reward; positive = net improvement
    pub reward: f64,
    pub metadata: ExperienceMetadata,
}

// ============================================================================
// Pattern conditions
// ============================================================================

/// Closed numeric interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Symmetric window around a center value.
    pub fn around(center: f64, half_width: f64) -> Self {
        Self {
            min: center - half_width,
            max: center + half_width,
        }
    }
}

/// Season, derived from the snapshot month for seasonal patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    pub fn from_month(month: u32) -> Self {
        match month {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Autumn,
            _ => Season::Winter,
        }
    }
}

/// Point probe used to find patterns whose conditions contain the current
/// operating point. Unspecified pattern dimensions are wildcards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternQuery {
    pub temperature_in: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub hour_of_day: u8,
    pub season: Season,
}

impl PatternQuery {
    /// Build the probe from a sensor snapshot.
    pub fn from_state(state: &SensorState) -> Self {
        Self {
            temperature_in: state.aggregates.temperature_in,
            humidity: state.aggregates.humidity,
            pressure: state.aggregates.pressure,
            hour_of_day: state.timestamp.hour() as u8,
            season: Season::from_month(state.timestamp.month()),
        }
    }
}

/// Numeric-range conditions under which a pattern applies.
///
/// `None` on a dimension means "any value" on that dimension.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PatternConditions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_range: Option<ValueRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity_range: Option<ValueRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure_range: Option<ValueRange>,
    /// Inclusive hour window (start, end); wraps midnight when start > end
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hour_range: Option<(u8, u8)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<Season>,
    /// Typed extension map for forward-compatible conditions
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, f64>,
}

impl PatternConditions {
    /// Range containment on every specified dimension.
    pub fn matches(&self, query: &PatternQuery) -> bool {
        if let Some(r) = &self.temperature_range {
            if !r.contains(query.temperature_in) {
                return false;
            }
        }
        if let Some(r) = &self.humidity_range {
            if !r.contains(query.humidity) {
                return false;
            }
        }
        if let Some(r) = &self.pressure_range {
            if !r.contains(query.pressure) {
                return false;
            }
        }
        if let Some((start, end)) = self.hour_range {
            let h = query.hour_of_day;
            let inside = if start <= end {
                h >= start && h <= end
            } else {
                h >= start || h <= end
            };
            if !inside {
                return false;
            }
        }
        if let Some(season) = self.season {
            if season != query.season {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// Learned pattern
// ============================================================================

/// Running statistics for one pattern.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PatternStats {
    pub total_applications: u64,
    pub success_count: u64,
    pub failure_count: u64,
    /// Lifetime success rate
    pub success_rate: f64,
    /// Outcomes of the most recent applications (bounded window)
    #[serde(default)]
    pub recent_outcomes: VecDeque<bool>,
    /// Success rate over `recent_outcomes`
    pub recent_success_rate: f64,
    pub avg_reward: f64,
    pub avg_energy_saving_rate: f64,
    pub avg_quality_score: f64,
}

/// A learned condition→action pattern with a confidence score.
///
/// Starts as an inactive candidate; the Learning Unit promotes it to active
/// once enough applications succeed, and may retire it when the recent
/// success rate degrades. `confidence` and `stats` are only ever updated
/// through the Learning Unit, never directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningPattern {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub conditions: PatternConditions,
    pub recommended_action: OptimizationAction,
    pub stats: PatternStats,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub is_active: bool,
}

impl LearningPattern {
    /// New inactive candidate seeded with its discovery application.
    pub fn candidate(
        name: String,
        conditions: PatternConditions,
        action: OptimizationAction,
        outcome: &OutcomeMetrics,
        reward: f64,
        initial_confidence: f64,
    ) -> Self {
        let success = reward > 0.0;
        let now = Utc::now();
        let mut recent_outcomes = VecDeque::new();
        recent_outcomes.push_back(success);
        Self {
            id: Uuid::new_v4(),
            name,
            created_at: now,
            updated_at: now,
            conditions,
            recommended_action: action,
            stats: PatternStats {
                total_applications: 1,
                success_count: u64::from(success),
                failure_count: u64::from(!success),
                success_rate: if success { 1.0 } else { 0.0 },
                recent_outcomes,
                recent_success_rate: if success { 1.0 } else { 0.0 },
                avg_reward: reward,
                avg_energy_saving_rate: outcome.energy_saving_rate,
                avg_quality_score: outcome.quality_score,
            },
            confidence: initial_confidence.clamp(0.0, 1.0),
            is_active: false,
        }
    }
}

// ============================================================================
// Model state
// ============================================================================

/// Direction of recent learning performance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceTrend {
    Improving,
    #[default]
    Stable,
    Declining,
}

impl std::fmt::Display for PerformanceTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PerformanceTrend::Improving => write!(f, "improving"),
            PerformanceTrend::Stable => write!(f, "stable"),
            PerformanceTrend::Declining => write!(f, "declining"),
        }
    }
}

/// Lazily recomputed summary of the learned model. Read-only to every
/// component except the Pattern Store that derives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    pub version: String,
    pub last_updated_at: DateTime<Utc>,
    pub total_experiences: u64,
    pub active_patterns: u64,
    /// Mean lifetime success rate across active patterns
    pub avg_prediction_accuracy: f64,
    pub performance_trend: PerformanceTrend,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(temp: f64, humidity: f64) -> PatternQuery {
        PatternQuery {
            temperature_in: temp,
            humidity,
            pressure: 1.0,
            hour_of_day: 12,
            season: Season::Summer,
        }
    }

    #[test]
    fn wildcard_conditions_match_anything() {
        let conditions = PatternConditions::default();
        assert!(conditions.matches(&probe(85.0, 40.0)));
        assert!(conditions.matches(&probe(-10.0, 99.0)));
    }

    #[test]
    fn range_containment_per_dimension() {
        let conditions = PatternConditions {
            temperature_range: Some(ValueRange::new(80.0, 90.0)),
            humidity_range: Some(ValueRange::new(30.0, 50.0)),
            ..Default::default()
        };
        assert!(conditions.matches(&probe(85.0, 40.0)));
        assert!(!conditions.matches(&probe(79.9, 40.0)));
        assert!(!conditions.matches(&probe(85.0, 50.1)));
    }

    #[test]
    fn hour_window_wraps_midnight() {
        let conditions = PatternConditions {
            hour_range: Some((22, 4)),
            ..Default::default()
        };
        let mut q = probe(85.0, 40.0);
        q.hour_of_day = 23;
        assert!(conditions.matches(&q));
        q.hour_of_day = 2;
        assert!(conditions.matches(&q));
        q.hour_of_day = 12;
        assert!(!conditions.matches(&q));
    }

    #[test]
    fn season_from_month() {
        assert_eq!(Season::from_month(1), Season::Winter);
        assert_eq!(Season::from_month(4), Season::Spring);
        assert_eq!(Season::from_month(7), Season::Summer);
        assert_eq!(Season::from_month(10), Season::Autumn);
        assert_eq!(Season::from_month(12), Season::Winter);
    }

    #[test]
    fn candidate_pattern_seeds_stats_from_first_application() {
        let outcome = OutcomeMetrics {
            energy_saved_kwh: 10.0,
            energy_saving_rate: 10.0,
            quality_score: 88.0,
            stability_score: 90.0,
            throughput_change_percent: 0.0,
        };
        let p = LearningPattern::candidate(
            "test".into(),
            PatternConditions::default(),
            OptimizationAction::new(),
            &outcome,
            0.7,
            0.3,
        );
        assert_eq!(p.stats.total_applications, 1);
        assert_eq!(p.stats.success_count, 1);
        assert_eq!(p.stats.failure_count, 0);
        assert!((p.stats.success_rate - 1.0).abs() < f64::EPSILON);
        assert!((p.confidence - 0.3).abs() < f64::EPSILON);
        assert!(!p.is_active);
    }
}
