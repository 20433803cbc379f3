//! Line optimizer — orchestrates the SENSE → DECIDE → ACT → LEARN cycle
//!
//! ## Cycle contract
//!
//! One call to [`LineOptimizer::run_optimization_cycle`] per sensor snapshot.
//! A quiet cycle (no opportunity, or a recommendation already pending) is a
//! *successful* cycle; `success = false` only when a phase failed abnormally,
//! and the loop is always ready for the next snapshot afterwards.
//!
//! ## Pending slot
//!
//! At most one recommendation is in flight per line. While it awaits
//! approval, DECIDE is skipped entirely; the slot frees on approval,
//! rejection, or expiry.
//!
//! ## Deferred learning
//!
//! Applying an action yields a [`LearningToken`] instead of learning
//! immediately. The caller's scheduler waits out the observation window,
//! captures an after snapshot, and redeems the token through
//! [`LineOptimizer::learn_from_token`].

use crate::config::OptimizerConfig;
use crate::error::OptimizerError;
use crate::execution::{ActOutcome, Actuator, ExecutionController};
use crate::learning::{LearningOutcome, LearningUnit};
use crate::policy::DecisionPolicy;
use crate::store::PatternStore;
use crate::types::{
    CycleResult, LearningToken, ModelState, OptimizationRecommendation, RecommendationStatus,
    SensorState,
};
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// The one in-flight recommendation, with the snapshot it was decided under.
struct PendingSlot {
    recommendation: OptimizationRecommendation,
    before_state: SensorState,
}

pub struct LineOptimizer {
    config: OptimizerConfig,
    store: Arc<dyn PatternStore>,
    policy: DecisionPolicy,
    controller: ExecutionController,
    learner: LearningUnit,
    current_state: Option<SensorState>,
    pending: Option<PendingSlot>,
    pending_learning: Option<LearningToken>,
    last_recommendation: Option<OptimizationRecommendation>,
    energy_history: VecDeque<f64>,
}

impl LineOptimizer {
    pub fn new(
        config: OptimizerConfig,
        store: Arc<dyn PatternStore>,
        actuator: Arc<dyn Actuator>,
    ) -> Self {
        let policy = DecisionPolicy::new(config.learning.clone(), config.execution.mode);
        let controller = ExecutionController::new(
            actuator,
            config.execution.clone(),
            config.safety.clone(),
        );
        let learner = LearningUnit::new(
            store.clone(),
            config.learning.clone(),
            config.execution.mode,
            config.execution.observation_window(),
        );
        Self {
            config,
            store,
            policy,
            controller,
            learner,
            current_state: None,
            pending: None,
            pending_learning: None,
            last_recommendation: None,
            energy_history: VecDeque::new(),
        }
    }

    /// Deterministic exploration draws for tests and replay.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.policy = DecisionPolicy::with_seed(
            self.config.learning.clone(),
            self.config.execution.mode,
            seed,
        );
        self
    }

    /// One full SENSE → DECIDE → ACT pass over a fresh snapshot.
    pub async fn run_optimization_cycle(
        &mut self,
        state: SensorState,
    ) -> Result<CycleResult, OptimizerError> {
        let mut result = CycleResult::begin();

        // ---- SENSE ----
        if let Err(reason) = self.config.safety.sensor.check(&state.aggregates) {
            let error = OptimizerError::Validation { reason };
            warn!(line = %self.config.line.id, %error, "Rejected implausible sensor snapshot");
            result.sense.error = Some(error.to_string());
            result.error = Some(error.to_string());
            return Ok(result);
        }
        result.sense.success = true;
        result.sense.state_id = Some(state.id);

        self.energy_history
            .push_back(state.aggregates.energy_consumption);
        while self.energy_history.len() > self.config.history_buffer_size {
            self.energy_history.pop_front();
        }
        self.expire_stale_pending();
        self.current_state = Some(state.clone());

        // ---- DECIDE ----
        if let Some(slot) = &self.pending {
            // Slot occupied: quiet cycle, no new decision until it resolves
            info!(
                line = %self.config.line.id,
                recommendation_id = %slot.recommendation.id,
                "Recommendation pending approval — skipping decision"
            );
            result.decide.success = true;
            result.act.success = true;
            result.learn.success = true;
            result.success = true;
            return Ok(result);
        }

        let energy_history: Vec<f64> = self.energy_history.iter().copied().collect();
        let decision = match self.policy.decide(&state, &energy_history, &*self.store).await {
            Ok(d) => d,
            Err(e) => {
                result.decide.error = Some(e.to_string());
                result.error = Some(format!("decide failed: {e}"));
                return Ok(result);
            }
        };
        result.decide.success = true;

        let Some(mut recommendation) = decision else {
            // Quiet cycle: nothing worth recommending
            result.act.success = true;
            result.learn.success = true;
            result.success = true;
            return Ok(result);
        };

        // ---- ACT ----
        let outcome = self
            .controller
            .act(&mut recommendation, &state.aggregates)
            .await;
        result.act.success = true;
        match outcome {
            ActOutcome::Applied => {
                result.act.applied = true;
                let token = LearningToken {
                    recommendation_id: recommendation.id,
                    before_state: state,
                    action: recommendation.action.clone(),
                    based_on_pattern_id: recommendation.based_on_pattern_id,
                    applied_at: Utc::now(),
                };
                self.pending_learning = Some(token.clone());
                result.pending_learning = Some(token);
                result.learn.success = true;
                result.learn.deferred = true;
                result.learning_insight =
                    Some("Action applied; learning runs after the observation window".to_string());
            }
            ActOutcome::Held => {
                self.pending = Some(PendingSlot {
                    recommendation: recommendation.clone(),
                    before_state: state,
                });
                result.learn.success = true;
            }
            ActOutcome::Failed(reason) => {
                // Recorded on the recommendation; the cycle itself is fine
                result.act.error = Some(reason);
                result.learn.success = true;
            }
        }
        result.decide.recommendation = Some(recommendation.clone());
        self.last_recommendation = Some(recommendation);
        result.success = true;
        Ok(result)
    }

    /// Approve or reject the pending recommendation. Returns whether the
    /// action was actually applied.
    pub async fn approve_recommendation(
        &mut self,
        recommendation_id: Uuid,
        approved: bool,
    ) -> Result<bool, OptimizerError> {
        // An expired recommendation must not be approvable, even when no
        // cycle has run since it lapsed
        self.expire_stale_pending();
        // The slot frees on approval or rejection; a mismatched id puts it back
        let Some(mut slot) = self.pending.take() else {
            return Err(OptimizerError::Policy {
                reason: "no recommendation is pending approval".to_string(),
            });
        };
        if slot.recommendation.id != recommendation_id {
            let pending_id = slot.recommendation.id;
            self.pending = Some(slot);
            return Err(OptimizerError::Policy {
                reason: format!(
                    "recommendation {recommendation_id} is not the pending one ({pending_id})"
                ),
            });
        }

        if !approved {
            slot.recommendation.status = RecommendationStatus::Rejected;
            info!(recommendation_id = %recommendation_id, "Recommendation rejected by operator");
            self.last_recommendation = Some(slot.recommendation);
            return Ok(false);
        }

        // Re-check against the most recent snapshot, not the decision-time one
        let current = self
            .current_state
            .as_ref()
            .unwrap_or(&slot.before_state)
            .aggregates;
        let outcome = self
            .controller
            .apply(&mut slot.recommendation, &current)
            .await;
        let applied = matches!(outcome, ActOutcome::Applied);
        if applied {
            self.pending_learning = Some(LearningToken {
                recommendation_id: slot.recommendation.id,
                before_state: slot.before_state.clone(),
                action: slot.recommendation.action.clone(),
                based_on_pattern_id: slot.recommendation.based_on_pattern_id,
                applied_at: Utc::now(),
            });
        }
        self.last_recommendation = Some(slot.recommendation);
        Ok(applied)
    }

    /// Redeem a learning token once the observation window has elapsed.
    pub async fn learn_from_token(
        &mut self,
        token: &LearningToken,
        after_state: &SensorState,
    ) -> Result<LearningOutcome, OptimizerError> {
        let outcome = self
            .learner
            .learn(
                &token.before_state,
                &token.action,
                after_state,
                token.based_on_pattern_id,
            )
            .await?;

        if self
            .pending_learning
            .as_ref()
            .is_some_and(|t| t.recommendation_id == token.recommendation_id)
        {
            self.pending_learning = None;
        }
        if let Some(rec) = &mut self.last_recommendation {
            if rec.id == token.recommendation_id {
                rec.status = RecommendationStatus::Completed;
            }
        }
        info!(
            recommendation_id = %token.recommendation_id,
            reward = outcome.reward.total,
            "Deferred learning complete"
        );
        Ok(outcome)
    }

    /// Learn directly from a before/after pair without a token. For offline
    /// replay of historical actions.
    pub async fn learn(
        &mut self,
        before: &SensorState,
        action: &crate::types::OptimizationAction,
        after: &SensorState,
        pattern_id: Option<Uuid>,
    ) -> Result<LearningOutcome, OptimizerError> {
        Ok(self.learner.learn(before, action, after, pattern_id).await?)
    }

    pub async fn get_model_state(&self) -> Result<ModelState, OptimizerError> {
        Ok(self.store.get_model_state().await?)
    }

    pub fn pending_recommendation(&self) -> Option<&OptimizationRecommendation> {
        self.pending.as_ref().map(|s| &s.recommendation)
    }

    pub fn pending_learning(&self) -> Option<&LearningToken> {
        self.pending_learning.as_ref()
    }

    pub fn last_recommendation(&self) -> Option<&OptimizationRecommendation> {
        self.last_recommendation.as_ref()
    }

    pub fn current_state(&self) -> Option<&SensorState> {
        self.current_state.as_ref()
    }

    /// Expire a pending recommendation past the approval window, freeing the
    /// slot for the next decision.
    fn expire_stale_pending(&mut self) {
        let expiry = chrono::Duration::seconds(self.config.execution.pending_expiry_secs as i64);
        let expired = self
            .pending
            .as_ref()
            .is_some_and(|slot| Utc::now() - slot.recommendation.created_at >= expiry);
        if expired {
            if let Some(mut slot) = self.pending.take() {
                slot.recommendation.status = RecommendationStatus::Expired;
                info!(
                    recommendation_id = %slot.recommendation.id,
                    "Pending recommendation expired without approval"
                );
                self.last_recommendation = Some(slot.recommendation);
            }
        }
    }
}
