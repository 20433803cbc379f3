//! Sled-backed pattern store
//!
//! Layout:
//! - tree `patterns`: key = pattern UUID bytes, value = JSON pattern
//! - tree `experiences`: key = timestamp millis (big-endian) + UUID bytes,
//!   value = JSON experience — so a reverse scan yields newest first
//! - tree `experience_index`: key = UUID bytes, value = primary key, for
//!   direct lookup by id

use super::{
    apply_stat_update, derive_model_state, sort_matches, PatternStore, StoreError, StoreTuning,
};
use crate::types::{
    LearningExperience, LearningPattern, ModelState, OutcomeMetrics, PatternQuery,
};
use async_trait::async_trait;
use sled::Tree;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

pub struct SledPatternStore {
    _db: sled::Db,
    patterns: Tree,
    experiences: Tree,
    experience_index: Tree,
    tuning: StoreTuning,
    /// Serializes read-modify-write stat updates
    update_lock: Mutex<()>,
}

impl SledPatternStore {
    pub fn open(path: &Path, tuning: StoreTuning) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Self::from_db(db, tuning)
    }

    /// Temporary on-disk store, removed when dropped. For tests.
    pub fn open_temp(tuning: StoreTuning) -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db, tuning)
    }

    fn from_db(db: sled::Db, tuning: StoreTuning) -> Result<Self, StoreError> {
        let patterns = db.open_tree("patterns")?;
        let experiences = db.open_tree("experiences")?;
        let experience_index = db.open_tree("experience_index")?;
        debug!(
            patterns = patterns.len(),
            experiences = experiences.len(),
            "Opened pattern store"
        );
        Ok(Self {
            _db: db,
            patterns,
            experiences,
            experience_index,
            tuning,
            update_lock: Mutex::new(()),
        })
    }

    fn experience_key(experience: &LearningExperience) -> [u8; 24] {
        let mut key = [0u8; 24];
        let millis = experience.timestamp.timestamp_millis().max(0) as u64;
        key[..8].copy_from_slice(&millis.to_be_bytes());
        key[8..].copy_from_slice(experience.id.as_bytes());
        key
    }

    /// Full pattern scan. Pattern counts are small (tens, not millions), so
    /// a scan per query is simpler than maintaining condition indexes.
    fn all_patterns(&self) -> Result<Vec<LearningPattern>, StoreError> {
        let mut out = Vec::new();
        for item in self.patterns.iter() {
            let (_, value) = item?;
            out.push(serde_json::from_slice(&value)?);
        }
        Ok(out)
    }
}

#[async_trait]
impl PatternStore for SledPatternStore {
    async fn find_matching_patterns(
        &self,
        query: &PatternQuery,
    ) -> Result<Vec<LearningPattern>, StoreError> {
        let mut matches: Vec<LearningPattern> = self
            .all_patterns()?
            .into_iter()
            .filter(|p| p.is_active && p.conditions.matches(query))
            .collect();
        sort_matches(&mut matches);
        Ok(matches)
    }

    async fn save_pattern(&self, pattern: &LearningPattern) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(pattern)?;
        self.patterns.insert(pattern.id.as_bytes(), bytes)?;
        Ok(())
    }

    async fn get_pattern(&self, id: Uuid) -> Result<Option<LearningPattern>, StoreError> {
        match self.patterns.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn update_pattern_stats(
        &self,
        id: Uuid,
        success: bool,
        reward: f64,
        outcome: &OutcomeMetrics,
    ) -> Result<LearningPattern, StoreError> {
        let _guard = self.update_lock.lock().await;
        let mut pattern = match self.patterns.get(id.as_bytes())? {
            Some(bytes) => serde_json::from_slice::<LearningPattern>(&bytes)?,
            None => return Err(StoreError::PatternNotFound(id)),
        };
        apply_stat_update(&mut pattern, success, reward, outcome, &self.tuning);
        let bytes = serde_json::to_vec(&pattern)?;
        self.patterns.insert(id.as_bytes(), bytes)?;
        Ok(pattern)
    }

    async fn save_experience(&self, experience: &LearningExperience) -> Result<(), StoreError> {
        let key = Self::experience_key(experience);
        let bytes = serde_json::to_vec(experience)?;
        self.experiences.insert(key, bytes)?;
        self.experience_index
            .insert(experience.id.as_bytes(), key.to_vec())?;
        Ok(())
    }

    async fn get_experience(&self, id: Uuid) -> Result<Option<LearningExperience>, StoreError> {
        let Some(key) = self.experience_index.get(id.as_bytes())? else {
            return Ok(None);
        };
        match self.experiences.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn recent_experiences(
        &self,
        limit: usize,
    ) -> Result<Vec<LearningExperience>, StoreError> {
        let mut out = Vec::with_capacity(limit);
        for item in self.experiences.iter().rev().take(limit) {
            let (_, value) = item?;
            out.push(serde_json::from_slice(&value)?);
        }
        Ok(out)
    }

    async fn get_model_state(&self) -> Result<ModelState, StoreError> {
        let active: Vec<LearningPattern> = self
            .all_patterns()?
            .into_iter()
            .filter(|p| p.is_active)
            .collect();
        let mut rewards = Vec::with_capacity(20);
        for item in self.experiences.iter().rev().take(20) {
            let (_, value) = item?;
            let experience: LearningExperience = serde_json::from_slice(&value)?;
            rewards.push(experience.reward);
        }
        Ok(derive_model_state(
            self.experiences.len() as u64,
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
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn make_pattern(confidence: f64, active: bool) -> LearningPattern {
        let now = Utc::now();
        LearningPattern {
            id: Uuid::new_v4(),
            name: "sled test".into(),
            created_at: now,
            updated_at: now,
            conditions: PatternConditions {
                temperature_range: Some(ValueRange::new(80.0, 90.0)),
                ..Default::default()
            },
            recommended_action: OptimizationAction::new(),
            stats: Default::default(),
            confidence,
            is_active: active,
        }
    }

    fn make_experience_at(secs: i64, reward: f64) -> LearningExperience {
        let aggregates = SensorAggregates {
            temperature_in: 85.0,
            temperature_out: 70.0,
            humidity: 40.0,
            pressure: 2.0,
            energy_consumption: 100.0,
            throughput: 500.0,
            quality_index: 88.0,
        };
        let timestamp = Utc.timestamp_opt(secs, 0).single().unwrap();
        let state = SensorState::at(timestamp, BTreeMap::new(), aggregates);
        LearningExperience {
            id: Uuid::new_v4(),
            timestamp,
            before_state: state.clone(),
            action: OptimizationAction::new(),
            after_state: state,
            observation_duration: Duration::from_secs(300),
            outcome: OutcomeMetrics {
                energy_saved_kwh: 10.0,
                energy_saving_rate: 10.0,
                quality_score: 88.0,
                stability_score: 90.0,
                throughput_change_percent: 0.0,
            },
            reward,
            metadata: ExperienceMetadata::default(),
        }
    }

    #[tokio::test]
    async fn pattern_roundtrip_and_query() {
        let store = SledPatternStore::open_temp(StoreTuning::default()).unwrap();
        let p = make_pattern(0.7, true);
        store.save_pattern(&p).await.unwrap();

        let loaded = store.get_pattern(p.id).await.unwrap().unwrap();
        assert_eq!(loaded, p);

        let query = PatternQuery {
            temperature_in: 85.0,
            humidity: 40.0,
            pressure: 2.0,
            hour_of_day: 12,
            season: Season::Summer,
        };
        let matches = store.find_matching_patterns(&query).await.unwrap();
        assert_eq!(matches.len(), 1);
    }

    #[tokio::test]
    async fn stat_update_survives_reload() {
        let store = SledPatternStore::open_temp(StoreTuning::default()).unwrap();
        let p = make_pattern(0.5, true);
        store.save_pattern(&p).await.unwrap();

        let outcome = OutcomeMetrics {
            energy_saved_kwh: 10.0,
            energy_saving_rate: 10.0,
            quality_score: 88.0,
            stability_score: 90.0,
            throughput_change_percent: 0.0,
        };
        store
            .update_pattern_stats(p.id, true, 0.8, &outcome)
            .await
            .unwrap();
        store
            .update_pattern_stats(p.id, false, -0.2, &outcome)
            .await
            .unwrap();

        let loaded = store.get_pattern(p.id).await.unwrap().unwrap();
        assert_eq!(loaded.stats.total_applications, 2);
        assert_eq!(loaded.stats.success_count, 1);
    }

    #[tokio::test]
    async fn experiences_scan_newest_first() {
        let store = SledPatternStore::open_temp(StoreTuning::default()).unwrap();
        let old = make_experience_at(1_700_000_000, 0.1);
        let new = make_experience_at(1_700_000_600, 0.2);
        // insert out of order; the key encodes the timestamp
        store.save_experience(&new).await.unwrap();
        store.save_experience(&old).await.unwrap();

        let recent = store.recent_experiences(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, new.id);
        assert_eq!(recent[1].id, old.id);

        let by_id = store.get_experience(old.id).await.unwrap().unwrap();
        assert_eq!(by_id.id, old.id);
    }

    #[tokio::test]
    async fn data_survives_a_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = make_pattern(0.7, true);
        {
            let store = SledPatternStore::open(dir.path(), StoreTuning::default()).unwrap();
            store.save_pattern(&pattern).await.unwrap();
            store
                .save_experience(&make_experience_at(1_700_000_000, 0.5))
                .await
                .unwrap();
        }
        let store = SledPatternStore::open(dir.path(), StoreTuning::default()).unwrap();
        assert!(store.get_pattern(pattern.id).await.unwrap().is_some());
        assert_eq!(store.recent_experiences(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn model_state_over_persisted_data() {
        let store = SledPatternStore::open_temp(StoreTuning::default()).unwrap();
        store.save_pattern(&make_pattern(0.7, true)).await.unwrap();
        store.save_pattern(&make_pattern(0.4, false)).await.unwrap();
        for i in 0..3 {
            store
                .save_experience(&make_experience_at(1_700_000_000 + i * 60, 0.5))
                .await
                .unwrap();
        }

        let model = store.get_model_state().await.unwrap();
        assert_eq!(model.active_patterns, 1);
        assert_eq!(model.total_experiences, 3);
    }
}
