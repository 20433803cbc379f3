//! Pattern store — persistence boundary for patterns, experiences, and model state
//!
//! ## Design
//!
//! Two implementations behind one async trait: an in-memory store for tests
//! and ephemeral runs, and a sled-backed store for deployments. Stat updates
//! go through `update_pattern_stats` so the read-modify-write is atomic with
//! respect to concurrent learners.

mod memory;
mod sled_store;

pub use memory::MemoryPatternStore;
pub use sled_store::SledPatternStore;

use crate::config::LearningConfig;
use crate::learning::confidence::update_confidence;
use crate::types::{
    LearningExperience, LearningPattern, ModelState, OutcomeMetrics, PatternQuery,
    PerformanceTrend,
};
use async_trait::async_trait;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Rewards in the last N experiences drive the trend; fewer than this many
/// experiences always reads as stable.
const TREND_MIN_EXPERIENCES: usize = 10;
/// Half-to-half mean reward delta below which the trend is flat.
const TREND_FLAT_BAND: f64 = 0.05;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("pattern not found: {0}")]
    PatternNotFound(Uuid),
}

/// Stat-update tunables, copied from `LearningConfig` at store construction.
#[derive(Debug, Clone, Copy)]
pub struct StoreTuning {
    /// Bounded window of most recent outcomes per pattern
    pub recent_window: usize,
    /// Step size for the confidence update
    pub confidence_learning_rate: f64,
    /// Applications required before a candidate can be promoted to active
    pub min_applications_for_activation: u64,
    /// Lifetime success rate required for promotion
    pub activation_success_rate: f64,
    /// Retire an active pattern when its recent success rate drops below this
    pub retirement_recent_success_rate: f64,
}

impl Default for StoreTuning {
    fn default() -> Self {
        Self {
            recent_window: 10,
            confidence_learning_rate: 0.1,
            min_applications_for_activation: 5,
            activation_success_rate: 0.6,
            retirement_recent_success_rate: 0.3,
        }
    }
}

impl From<&LearningConfig> for StoreTuning {
    fn from(cfg: &LearningConfig) -> Self {
        Self {
            recent_window: cfg.recent_window,
            confidence_learning_rate: cfg.confidence_learning_rate,
            min_applications_for_activation: cfg.min_applications_for_activation,
            activation_success_rate: cfg.activation_success_rate,
            retirement_recent_success_rate: cfg.retirement_recent_success_rate,
        }
    }
}

/// Persistence boundary for the learning loop.
#[async_trait]
pub trait PatternStore: Send + Sync {
    /// Active patterns whose conditions contain the query point, ordered by
    /// confidence descending (most recently updated first on ties).
    async fn find_matching_patterns(
        &self,
        query: &PatternQuery,
    ) -> Result<Vec<LearningPattern>, StoreError>;

    /// Insert or replace a pattern.
    async fn save_pattern(&self, pattern: &LearningPattern) -> Result<(), StoreError>;

    async fn get_pattern(&self, id: Uuid) -> Result<Option<LearningPattern>, StoreError>;

    /// Atomically fold one application outcome into a pattern's stats,
    /// confidence, outcome averages, and active/retired lifecycle, returning
    /// the updated pattern. The entire read-modify-write happens under the
    /// store's per-update lock so concurrent learners cannot interleave.
    async fn update_pattern_stats(
        &self,
        id: Uuid,
        success: bool,
        reward: f64,
        outcome: &OutcomeMetrics,
    ) -> Result<LearningPattern, StoreError>;

    /// Append one immutable experience record.
    async fn save_experience(&self, experience: &LearningExperience) -> Result<(), StoreError>;

    async fn get_experience(&self, id: Uuid) -> Result<Option<LearningExperience>, StoreError>;

    /// Most recent experiences, newest first.
    async fn recent_experiences(
        &self,
        limit: usize,
    ) -> Result<Vec<LearningExperience>, StoreError>;

    /// Summary of the learned model, recomputed on read.
    async fn get_model_state(&self) -> Result<ModelState, StoreError>;
}

/// Fold one application outcome into a pattern in place: counters, running
/// means, confidence, and the candidate→active / active→retired lifecycle.
/// Shared by both store implementations so the math cannot drift between
/// them, and only ever called under the store's update lock.
pub(crate) fn apply_stat_update(
    pattern: &mut LearningPattern,
    success: bool,
    reward: f64,
    outcome: &OutcomeMetrics,
    tuning: &StoreTuning,
) {
    let stats = &mut pattern.stats;
    stats.total_applications += 1;
    if success {
        stats.success_count += 1;
    } else {
        stats.failure_count += 1;
    }
    stats.success_rate = stats.success_count as f64 / stats.total_applications as f64;

    // Running means over all applications
    let n = stats.total_applications as f64;
    stats.avg_reward += (reward - stats.avg_reward) / n;
    stats.avg_energy_saving_rate += (outcome.energy_saving_rate - stats.avg_energy_saving_rate) / n;
    stats.avg_quality_score += (outcome.quality_score - stats.avg_quality_score) / n;

    stats.recent_outcomes.push_back(success);
    while stats.recent_outcomes.len() > tuning.recent_window.max(1) {
        stats.recent_outcomes.pop_front();
    }
    let recent_successes = stats.recent_outcomes.iter().filter(|s| **s).count();
    stats.recent_success_rate = recent_successes as f64 / stats.recent_outcomes.len() as f64;

    pattern.confidence =
        update_confidence(pattern.confidence, reward, tuning.confidence_learning_rate);
    pattern.updated_at = chrono::Utc::now();

    if !pattern.is_active
        && pattern.stats.total_applications >= tuning.min_applications_for_activation
        && pattern.stats.success_rate >= tuning.activation_success_rate
    {
        pattern.is_active = true;
        info!(
            pattern_id = %pattern.id,
            success_rate = pattern.stats.success_rate,
            "Promoted candidate pattern to active"
        );
    } else if pattern.is_active
        && pattern.stats.recent_outcomes.len() >= tuning.recent_window
        && pattern.stats.recent_success_rate < tuning.retirement_recent_success_rate
    {
        pattern.is_active = false;
        info!(
            pattern_id = %pattern.id,
            recent_success_rate = pattern.stats.recent_success_rate,
            "Retired degraded pattern"
        );
    }
}

/// Trend over recent rewards, newest first: compare the mean of the newer
/// half against the older half.
pub(crate) fn compute_trend(rewards_newest_first: &[f64]) -> PerformanceTrend {
    if rewards_newest_first.len() < TREND_MIN_EXPERIENCES {
        return PerformanceTrend::Stable;
    }
    let mid = rewards_newest_first.len() / 2;
    let newer = &rewards_newest_first[..mid];
    let older = &rewards_newest_first[mid..];
    let mean = |xs: &[f64]| xs.iter().sum::<f64>() / xs.len() as f64;
    let delta = mean(newer) - mean(older);
    if delta > TREND_FLAT_BAND {
        PerformanceTrend::Improving
    } else if delta < -TREND_FLAT_BAND {
        PerformanceTrend::Declining
    } else {
        PerformanceTrend::Stable
    }
}

/// Model state derived from a full scan of patterns and experiences.
pub(crate) fn derive_model_state(
    total_experiences: u64,
    active: &[LearningPattern],
    recent_rewards_newest_first: &[f64],
) -> ModelState {
    let avg_prediction_accuracy = if active.is_empty() {
        0.0
    } else {
        active.iter().map(|p| p.stats.success_rate).sum::<f64>() / active.len() as f64
    };
    ModelState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        last_updated_at: chrono::Utc::now(),
        total_experiences,
        active_patterns: active.len() as u64,
        avg_prediction_accuracy,
        performance_trend: compute_trend(recent_rewards_newest_first),
    }
}

/// Sort for query results: confidence descending, then most recently updated.
pub(crate) fn sort_matches(patterns: &mut [LearningPattern]) {
    patterns.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.updated_at.cmp(&a.updated_at))
    });
}
