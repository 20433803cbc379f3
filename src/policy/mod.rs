//! Decision policy — pattern exploitation vs exploration
//!
//! ## Strategy
//!
//! Query the store for active patterns containing the current operating
//! point. With no match, explore. With matches, take the highest-confidence
//! pattern but still explore with probability `exploration_rate * (1 -
//! confidence)` — well-trusted patterns are rarely second-guessed, shaky
//! ones often are. Exploited patterns below the minimum confidence produce
//! no recommendation at all.

use crate::config::LearningConfig;
use crate::error::OptimizerError;
use crate::store::PatternStore;
use crate::types::{
    ExecutionMode, OptimizationAction, OptimizationRecommendation, PatternQuery, PredictedEffect,
    Priority, RecommendationCategory, RecommendationStatus, SensorState,
};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;
use uuid::Uuid;

/// Confidence above which a recommendation is flagged high priority.
const HIGH_PRIORITY_CONFIDENCE: f64 = 0.7;
/// Predicted effect defaults for exploratory recommendations.
const DEFAULT_PREDICTED_SAVING_RATE: f64 = 5.0;
const DEFAULT_PREDICTED_QUALITY: f64 = 85.0;
const DEFAULT_STABILIZATION_MIN: f64 = 10.0;
/// Throughput above which the exploratory fan setpoint backs off.
const HIGH_THROUGHPUT_KG_H: f64 = 100.0;

/// Probability of exploring given the best available confidence.
/// Monotonically decreasing in confidence: full trust means (almost) no
/// second-guessing.
pub fn explore_probability(confidence: f64, exploration_rate: f64) -> f64 {
    (exploration_rate * (1.0 - confidence)).clamp(0.0, 1.0)
}

pub struct DecisionPolicy {
    cfg: LearningConfig,
    execution_mode: ExecutionMode,
    rng: StdRng,
}

impl DecisionPolicy {
    pub fn new(cfg: LearningConfig, execution_mode: ExecutionMode) -> Self {
        Self {
            cfg,
            execution_mode,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic policy for tests and replay.
    pub fn with_seed(cfg: LearningConfig, execution_mode: ExecutionMode, seed: u64) -> Self {
        Self {
            cfg,
            execution_mode,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// One decision. `Ok(None)` is a normal quiet outcome: no pattern is
    /// trustworthy enough and the exploration draw came up negative.
    pub async fn decide(
        &mut self,
        state: &SensorState,
        energy_history: &[f64],
        store: &dyn PatternStore,
    ) -> Result<Option<OptimizationRecommendation>, OptimizerError> {
        let query = PatternQuery::from_state(state);
        let matches = store.find_matching_patterns(&query).await?;

        if matches.is_empty() {
            debug!("No matching patterns — exploring");
            return Ok(Some(self.exploratory(state, energy_history)));
        }

        let best = &matches[0];
        let p = explore_probability(best.confidence, self.cfg.exploration_rate);
        if self.rng.gen::<f64>() < p {
            debug!(
                pattern_id = %best.id,
                confidence = best.confidence,
                explore_probability = p,
                "Exploration draw overrides best pattern"
            );
            return Ok(Some(self.exploratory(state, energy_history)));
        }

        if best.confidence < self.cfg.min_confidence_threshold {
            debug!(
                pattern_id = %best.id,
                confidence = best.confidence,
                "Best pattern below minimum confidence — no recommendation"
            );
            return Ok(None);
        }

        Ok(Some(self.exploit(best)))
    }

    /// Recommendation reusing a trusted pattern's action verbatim.
    fn exploit(&self, pattern: &crate::types::LearningPattern) -> OptimizationRecommendation {
        let stats = &pattern.stats;
        let predicted_effect = PredictedEffect {
            energy_saving_rate: if stats.total_applications > 0 {
                stats.avg_energy_saving_rate
            } else {
                DEFAULT_PREDICTED_SAVING_RATE
            },
            quality_score: if stats.total_applications > 0 {
                stats.avg_quality_score
            } else {
                DEFAULT_PREDICTED_QUALITY
            },
            throughput_change: 0.0,
            stabilization_time_min: DEFAULT_STABILIZATION_MIN,
        };
        self.build(
            format!("Pattern-based optimization: {}", pattern.name),
            format!(
                "Reapplying a learned pattern ({} applications, {:.0}% success rate)",
                stats.total_applications,
                stats.success_rate * 100.0
            ),
            pattern.recommended_action.clone(),
            predicted_effect,
            pattern.confidence,
            Some(pattern.id),
        )
    }

    /// Low-confidence exploratory recommendation probing a nearby operating
    /// point. The temperature step doubles when recent energy consumption
    /// is trending above the longer average, to probe harder for savings.
    fn exploratory(
        &self,
        state: &SensorState,
        energy_history: &[f64],
    ) -> OptimizationRecommendation {
        let agg = &state.aggregates;
        let mut step = self.cfg.exploration_temperature_step;
        if energy_trending_up(energy_history) {
            step *= 2.0;
        }

        let mut action = OptimizationAction::new();
        action.target_temperature = Some(agg.temperature_out - step);
        action.fan_speed = Some(if agg.throughput > HIGH_THROUGHPUT_KG_H {
            90.0
        } else {
            100.0
        });
        action.feed_rate = Some(agg.throughput);

        let predicted_effect = PredictedEffect {
            energy_saving_rate: DEFAULT_PREDICTED_SAVING_RATE,
            quality_score: DEFAULT_PREDICTED_QUALITY,
            throughput_change: 0.0,
            stabilization_time_min: DEFAULT_STABILIZATION_MIN,
        };
        self.build(
            "Exploratory optimization".to_string(),
            format!(
                "Probing a lower temperature setpoint ({:.1}°C, step {:.1}°C) to find savings",
                agg.temperature_out - step,
                step
            ),
            action,
            predicted_effect,
            self.cfg.initial_confidence,
            None,
        )
    }

    fn build(
        &self,
        title: String,
        rationale: String,
        action: OptimizationAction,
        predicted_effect: PredictedEffect,
        confidence: f64,
        based_on_pattern_id: Option<Uuid>,
    ) -> OptimizationRecommendation {
        OptimizationRecommendation {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            category: RecommendationCategory::Energy,
            priority: if confidence > HIGH_PRIORITY_CONFIDENCE {
                Priority::High
            } else {
                Priority::Medium
            },
            title,
            rationale,
            action,
            predicted_effect,
            confidence,
            based_on_pattern_id,
            status: RecommendationStatus::Pending,
            execution_mode: self.execution_mode,
            failure_reason: None,
        }
    }
}

/// True when the mean of the most recent quarter of the history sits above
/// the mean of the whole history. Short histories never trend.
fn energy_trending_up(history: &[f64]) -> bool {
    if history.len() < 8 {
        return false;
    }
    let recent_len = (history.len() / 4).max(1);
    let recent = &history[history.len() - recent_len..];
    let mean = |xs: &[f64]| xs.iter().sum::<f64>() / xs.len() as f64;
    mean(recent) > mean(history)
}
