//! Learning unit — turns an observed before/after pair into model updates
//!
//! ## Responsibilities
//!
//! - compute outcome metrics and the scalar reward
//! - persist the immutable experience record
//! - fold the outcome into the source pattern's stats, confidence, and
//!   active/retired lifecycle (atomically, inside the store's update)
//! - seed a new candidate pattern from a strongly rewarded exploration

use super::outcome::{AggregateOutcome, OutcomeFunction};
use super::reward::{RewardBreakdown, RewardFunction, WeightedReward};
use crate::config::LearningConfig;
use crate::store::{PatternStore, StoreError};
use crate::types::{
    ExecutionMode, ExperienceMetadata, LearningExperience, LearningPattern, OptimizationAction,
    PatternConditions, SensorState, ValueRange,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Result of one learning pass.
#[derive(Debug, Clone)]
pub struct LearningOutcome {
    pub experience_id: Uuid,
    pub reward: RewardBreakdown,
    /// Human-readable summary for operators
    pub insight: String,
    /// Set when this pass seeded a new candidate pattern
    pub new_pattern_id: Option<Uuid>,
}

pub struct LearningUnit {
    store: Arc<dyn PatternStore>,
    cfg: LearningConfig,
    execution_mode: ExecutionMode,
    observation_window: std::time::Duration,
    outcome_fn: Box<dyn OutcomeFunction>,
    reward_fn: Box<dyn RewardFunction>,
}

impl LearningUnit {
    pub fn new(
        store: Arc<dyn PatternStore>,
        cfg: LearningConfig,
        execution_mode: ExecutionMode,
        observation_window: std::time::Duration,
    ) -> Self {
        Self {
            store,
            cfg,
            execution_mode,
            observation_window,
            outcome_fn: Box::new(AggregateOutcome),
            reward_fn: Box::new(WeightedReward::default()),
        }
    }

    /// Swap in a plant-specific outcome model.
    pub fn with_outcome_fn(mut self, outcome_fn: Box<dyn OutcomeFunction>) -> Self {
        self.outcome_fn = outcome_fn;
        self
    }

    /// Swap in a plant-specific reward weighting.
    pub fn with_reward_fn(mut self, reward_fn: Box<dyn RewardFunction>) -> Self {
        self.reward_fn = reward_fn;
        self
    }

    /// One full learning pass over an applied action.
    pub async fn learn(
        &self,
        before: &SensorState,
        action: &OptimizationAction,
        after: &SensorState,
        pattern_id: Option<Uuid>,
    ) -> Result<LearningOutcome, StoreError> {
        let outcome = self.outcome_fn.compute(before, after);
        let reward = self.reward_fn.compute(&outcome);
        let success = reward.total > 0.0;

        let experience = LearningExperience {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            before_state: before.clone(),
            action: action.clone(),
            after_state: after.clone(),
            observation_duration: self.observation_window,
            outcome,
            reward: reward.total,
            metadata: ExperienceMetadata {
                operator_approved: self.execution_mode == ExecutionMode::SemiAuto,
                auto_applied: self.execution_mode == ExecutionMode::Auto,
                environment: Default::default(),
            },
        };
        self.store.save_experience(&experience).await?;

        let mut new_pattern_id = None;
        if let Some(id) = pattern_id {
            // Counters, averages, confidence, and the promotion/retirement
            // flip all fold inside the store's locked update, so concurrent
            // learners on the same pattern cannot lose each other's writes.
            let pattern = self
                .store
                .update_pattern_stats(id, success, reward.total, &outcome)
                .await?;
            debug!(
                pattern_id = %pattern.id,
                confidence = pattern.confidence,
                is_active = pattern.is_active,
                "Pattern reinforced"
            );
        } else if reward.total > self.cfg.new_pattern_reward_threshold {
            let pattern = self.seed_candidate(before, action, &outcome, reward.total);
            info!(
                pattern_id = %pattern.id,
                reward = reward.total,
                "Seeded new candidate pattern from exploration"
            );
            new_pattern_id = Some(pattern.id);
            self.store.save_pattern(&pattern).await?;
        }

        let insight = build_insight(&reward, success, new_pattern_id.is_some());
        debug!(
            experience_id = %experience.id,
            reward = reward.total,
            success,
            "Learning pass complete"
        );

        Ok(LearningOutcome {
            experience_id: experience.id,
            reward,
            insight,
            new_pattern_id,
        })
    }

    fn seed_candidate(
        &self,
        before: &SensorState,
        action: &OptimizationAction,
        outcome: &crate::types::OutcomeMetrics,
        reward: f64,
    ) -> LearningPattern {
        let agg = &before.aggregates;
        let conditions = PatternConditions {
            temperature_range: Some(ValueRange::around(
                agg.temperature_in,
                self.cfg.condition_window_temperature,
            )),
            humidity_range: Some(ValueRange::around(
                agg.humidity,
                self.cfg.condition_window_humidity,
            )),
            ..Default::default()
        };
        let name = format!(
            "Temp {:.0}°C / humidity {:.0}%",
            agg.temperature_in, agg.humidity
        );
        LearningPattern::candidate(
            name,
            conditions,
            action.clone(),
            outcome,
            reward,
            self.cfg.initial_confidence,
        )
    }
}

fn build_insight(reward: &RewardBreakdown, success: bool, seeded_pattern: bool) -> String {
    let quality = if reward.total > 0.5 {
        "Excellent outcome"
    } else if success {
        "Good outcome"
    } else if reward.total > -0.3 {
        "Slightly negative outcome"
    } else {
        "Poor outcome"
    };
    let mut insight = format!("{quality} (reward {:+.2}): {}", reward.total, reward.explanation);
    if seeded_pattern {
        insight.push_str("; registered as a new candidate pattern");
    }
    insight
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryPatternStore;
    use crate::types::{PatternStats, SensorAggregates};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn state(energy: f64, quality: f64) -> SensorState {
        SensorState::new(
            BTreeMap::new(),
            SensorAggregates {
                temperature_in: 120.0,
                temperature_out: 70.0,
                humidity: 40.0,
                pressure: 2.0,
                energy_consumption: energy,
                throughput: 500.0,
                quality_index: quality,
            },
        )
    }

    fn unit_with_store() -> (LearningUnit, Arc<MemoryPatternStore>) {
        let store = Arc::new(MemoryPatternStore::default());
        let unit = LearningUnit::new(
            store.clone(),
            LearningConfig::default(),
            ExecutionMode::Auto,
            Duration::from_secs(300),
        );
        (unit, store)
    }

    #[tokio::test]
    async fn strong_exploration_seeds_a_candidate() {
        let (unit, store) = unit_with_store();
        // 10% saving + quality 88 + full stability → reward well above 0.5
        let result = unit
            .learn(
                &state(100.0, 88.0),
                &OptimizationAction::new(),
                &state(90.0, 88.0),
                None,
            )
            .await
            .unwrap();

        let id = result.new_pattern_id.expect("candidate expected");
        let pattern = store.get_pattern(id).await.unwrap().unwrap();
        assert!(!pattern.is_active);
        assert!((pattern.confidence - 0.3).abs() < f64::EPSILON);
        assert!(pattern
            .conditions
            .temperature_range
            .unwrap()
            .contains(120.0));
        assert!(result.insight.contains("candidate pattern"));
    }

    #[tokio::test]
    async fn weak_exploration_seeds_nothing() {
        let (unit, store) = unit_with_store();
        // no energy change, quality 82, stable → small positive reward
        let result = unit
            .learn(
                &state(100.0, 82.0),
                &OptimizationAction::new(),
                &state(100.0, 82.0),
                None,
            )
            .await
            .unwrap();
        assert!(result.new_pattern_id.is_none());
        // the experience is still recorded
        let experience = store.get_experience(result.experience_id).await.unwrap();
        assert!(experience.is_some());
    }

    #[tokio::test]
    async fn pattern_promotion_after_enough_successes() {
        let (unit, store) = unit_with_store();
        let pattern = LearningPattern {
            id: Uuid::new_v4(),
            name: "candidate".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            conditions: PatternConditions::default(),
            recommended_action: OptimizationAction::new(),
            stats: PatternStats::default(),
            confidence: 0.3,
            is_active: false,
        };
        store.save_pattern(&pattern).await.unwrap();

        for _ in 0..5 {
            unit.learn(
                &state(100.0, 88.0),
                &OptimizationAction::new(),
                &state(90.0, 88.0),
                Some(pattern.id),
            )
            .await
            .unwrap();
        }

        let promoted = store.get_pattern(pattern.id).await.unwrap().unwrap();
        assert!(promoted.is_active);
        assert_eq!(promoted.stats.total_applications, 5);
        assert!(promoted.confidence > 0.3);
    }

    #[tokio::test]
    async fn degraded_pattern_is_retired() {
        let (unit, store) = unit_with_store();
        let pattern = LearningPattern {
            id: Uuid::new_v4(),
            name: "fading".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            conditions: PatternConditions::default(),
            recommended_action: OptimizationAction::new(),
            stats: PatternStats::default(),
            confidence: 0.8,
            is_active: true,
        };
        store.save_pattern(&pattern).await.unwrap();

        // energy rises and quality drops: negative reward every time
        for _ in 0..10 {
            unit.learn(
                &state(100.0, 88.0),
                &OptimizationAction::new(),
                &state(115.0, 70.0),
                Some(pattern.id),
            )
            .await
            .unwrap();
        }

        let retired = store.get_pattern(pattern.id).await.unwrap().unwrap();
        assert!(!retired.is_active);
        assert!(retired.confidence < 0.8);
    }

    #[tokio::test]
    async fn concurrent_learners_never_lose_a_reinforcement() {
        let store = Arc::new(MemoryPatternStore::default());
        let unit_a = LearningUnit::new(
            store.clone(),
            LearningConfig::default(),
            ExecutionMode::Auto,
            Duration::from_secs(300),
        );
        let unit_b = LearningUnit::new(
            store.clone(),
            LearningConfig::default(),
            ExecutionMode::Auto,
            Duration::from_secs(300),
        );
        let pattern = LearningPattern {
            id: Uuid::new_v4(),
            name: "shared".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            conditions: PatternConditions::default(),
            recommended_action: OptimizationAction::new(),
            stats: PatternStats::default(),
            confidence: 0.5,
            is_active: true,
        };
        store.save_pattern(&pattern).await.unwrap();

        let before_a = state(100.0, 88.0);
        let action_a = OptimizationAction::new();
        let after_a = state(90.0, 88.0);
        let before_b = state(100.0, 88.0);
        let action_b = OptimizationAction::new();
        let after_b = state(90.0, 88.0);
        let (a, b) = tokio::join!(
            unit_a.learn(&before_a, &action_a, &after_a, Some(pattern.id)),
            unit_b.learn(&before_b, &action_b, &after_b, Some(pattern.id)),
        );
        a.unwrap();
        b.unwrap();

        let reinforced = store.get_pattern(pattern.id).await.unwrap().unwrap();
        assert_eq!(reinforced.stats.total_applications, 2);
        assert_eq!(reinforced.stats.success_count, 2);
        assert!((reinforced.stats.avg_quality_score - 88.0).abs() < 1e-9);
        assert!((reinforced.stats.avg_energy_saving_rate - 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn experience_records_execution_provenance() {
        let store = Arc::new(MemoryPatternStore::default());
        let unit = LearningUnit::new(
            store.clone(),
            LearningConfig::default(),
            ExecutionMode::SemiAuto,
            Duration::from_secs(300),
        );
        let result = unit
            .learn(
                &state(100.0, 88.0),
                &OptimizationAction::new(),
                &state(95.0, 88.0),
                None,
            )
            .await
            .unwrap();
        let experience = store
            .get_experience(result.experience_id)
            .await
            .unwrap()
            .unwrap();
        assert!(experience.metadata.operator_approved);
        assert!(!experience.metadata.auto_applied);
    }
}
