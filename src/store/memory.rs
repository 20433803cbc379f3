//! In-memory pattern store for tests and ephemeral runs

use super::{
    apply_stat_update, derive_model_state, sort_matches, PatternStore, StoreError, StoreTuning,
};
use crate::types::{
    LearningExperience, LearningPattern, ModelState, OutcomeMetrics, PatternQuery,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    patterns: BTreeMap<Uuid, LearningPattern>,
    experiences: BTreeMap<Uuid, LearningExperience>,
    /// Insertion order, oldest first
    experience_order: Vec<Uuid>,
}

/// Map-backed store with the same observable behavior as the sled store.
pub struct MemoryPatternStore {
    inner: Mutex<Inner>,
    tuning: StoreTuning,
}

impl MemoryPatternStore {
    pub fn new(tuning: StoreTuning) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            tuning,
        }
    }
}

impl Default for MemoryPatternStore {
    fn default() -> Self {
        Self::new(StoreTuning::default())
    }
}

#[async_trait]
impl PatternStore for MemoryPatternStore {
    async fn find_matching_patterns(
        &self,
        query: &PatternQuery,
    ) -> Result<Vec<LearningPattern>, StoreError> {
        let inner = self.inner.lock().await;
        let mut matches: Vec<LearningPattern> = inner
            .patterns
            .values()
            .filter(|p| p.is_active && p.conditions.matches(query))
            .cloned()
            .collect();
        sort_matches(&mut matches);
        Ok(matches)
    }

    async fn save_pattern(&self, pattern: &LearningPattern) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.patterns.insert(pattern.id, pattern.clone());
        Ok(())
    }

    async fn get_pattern(&self, id: Uuid) -> Result<Option<LearningPattern>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.patterns.get(&id).cloned())
    }

    async fn update_pattern_stats(
        &self,
        id: Uuid,
        success: bool,
        reward: f64,
        outcome: &OutcomeMetrics,
    ) -> Result<LearningPattern, StoreError> {
        let mut inner = self.inner.lock().await;
        let pattern = inner
            .patterns
            .get_mut(&id)
            .ok_or(StoreError::PatternNotFound(id))?;
        apply_stat_update(pattern, success, reward, outcome, &self.tuning);
        Ok(pattern.clone())
    }

    async fn save_experience(&self, experience: &LearningExperience) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner
            .experiences
            .insert(experience.id, experience.clone())
            .is_none()
        {
            inner.experience_order.push(experience.id);
        }
        Ok(())
    }

    async fn get_experience(&self, id: Uuid) -> Result<Option<LearningExperience>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.experiences.get(&id).cloned())
    }

    async fn recent_experiences(
        &self,
        limit: usize,
    ) -> Result<Vec<LearningExperience>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .experience_order
            .iter()
            .rev()
            .take(limit)
            .filter_map(|id| inner.experiences.get(id).cloned())
            .collect())
    }

    async fn get_model_state(&self) -> Result<ModelState, StoreError> {
        let inner = self.inner.lock().await;
        let active: Vec<LearningPattern> = inner
            .patterns
            .values()
            .filter(|p| p.is_active)
            .cloned()
            .collect();
        let rewards: Vec<f64> = inner
            .experience_order
            .iter()
            .rev()
            .take(20)
            .filter_map(|id| inner.experiences.get(id).map(|e| e.reward))
            .collect();
        Ok(derive_model_state(
            inner.experiences.len() as u64,
            &active,
            &rewards,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        ExperienceMetadata, OptimizationAction, OutcomeMetrics, PatternConditions, Season,
        SensorAggregates, SensorState, ValueRange,
    };
    use std::collections::BTreeMap as Map;
    use std::time::Duration;

    fn make_aggregates(temp_in: f64) -> SensorAggregates {
        SensorAggregates {
            temperature_in: temp_in,
            temperature_out: 70.0,
            humidity: 40.0,
            pressure: 2.0,
            energy_consumption: 100.0,
            throughput: 500.0,
            quality_index: 88.0,
        }
    }

    fn make_pattern(temp_range: (f64, f64), confidence: f64, active: bool) -> LearningPattern {
        let now = chrono::Utc::now();
        LearningPattern {
            id: Uuid::new_v4(),
            name: "test".into(),
            created_at: now,
            updated_at: now,
            conditions: PatternConditions {
                temperature_range: Some(ValueRange::new(temp_range.0, temp_range.1)),
                ..Default::default()
            },
            recommended_action: OptimizationAction::new(),
            stats: Default::default(),
            confidence,
            is_active: active,
        }
    }

    fn make_outcome() -> OutcomeMetrics {
        OutcomeMetrics {
            energy_saved_kwh: 10.0,
            energy_saving_rate: 10.0,
            quality_score: 88.0,
            stability_score: 90.0,
            throughput_change_percent: 0.0,
        }
    }

    fn make_experience(reward: f64) -> LearningExperience {
        let state = SensorState::new(Map::new(), make_aggregates(85.0));
        LearningExperience {
            id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            before_state: state.clone(),
            action: OptimizationAction::new(),
            after_state: state,
            observation_duration: Duration::from_secs(300),
            outcome: make_outcome(),
            reward,
            metadata: ExperienceMetadata::default(),
        }
    }

    fn probe(temp: f64) -> PatternQuery {
        PatternQuery {
            temperature_in: temp,
            humidity: 40.0,
            pressure: 2.0,
            hour_of_day: 12,
            season: Season::Summer,
        }
    }

    #[tokio::test]
    async fn query_returns_only_active_matches_sorted() {
        let store = MemoryPatternStore::default();
        let low = make_pattern((80.0, 90.0), 0.4, true);
        let high = make_pattern((80.0, 90.0), 0.9, true);
        let inactive = make_pattern((80.0, 90.0), 0.99, false);
        let elsewhere = make_pattern((10.0, 20.0), 0.9, true);
        for p in [&low, &high, &inactive, &elsewhere] {
            store.save_pattern(p).await.unwrap();
        }

        let matches = store.find_matching_patterns(&probe(85.0)).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, high.id);
        assert_eq!(matches[1].id, low.id);
    }

    #[tokio::test]
    async fn stat_update_is_persisted() {
        let store = MemoryPatternStore::default();
        let p = make_pattern((80.0, 90.0), 0.5, true);
        store.save_pattern(&p).await.unwrap();

        let updated = store
            .update_pattern_stats(p.id, true, 0.8, &make_outcome())
            .await
            .unwrap();
        assert_eq!(updated.stats.total_applications, 1);
        assert!(updated.confidence > 0.5);
        assert!((updated.stats.avg_quality_score - 88.0).abs() < 1e-9);

        let reloaded = store.get_pattern(p.id).await.unwrap().unwrap();
        assert_eq!(reloaded.stats.total_applications, 1);
    }

    #[tokio::test]
    async fn unknown_pattern_update_is_an_error() {
        let store = MemoryPatternStore::default();
        let err = store
            .update_pattern_stats(Uuid::new_v4(), true, 0.5, &make_outcome())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PatternNotFound(_)));
    }

    #[tokio::test]
    async fn recent_experiences_newest_first() {
        let store = MemoryPatternStore::default();
        let first = make_experience(0.1);
        let second = make_experience(0.2);
        store.save_experience(&first).await.unwrap();
        store.save_experience(&second).await.unwrap();

        let recent = store.recent_experiences(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, second.id);
        assert_eq!(recent[1].id, first.id);
    }

    #[tokio::test]
    async fn model_state_counts_active_patterns() {
        let store = MemoryPatternStore::default();
        store
            .save_pattern(&make_pattern((80.0, 90.0), 0.7, true))
            .await
            .unwrap();
        store
            .save_pattern(&make_pattern((80.0, 90.0), 0.7, false))
            .await
            .unwrap();
        store.save_experience(&make_experience(0.5)).await.unwrap();

        let model = store.get_model_state().await.unwrap();
        assert_eq!(model.active_patterns, 1);
        assert_eq!(model.total_experiences, 1);
    }
}
