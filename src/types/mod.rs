//! Core value types for the optimization loop
//!
//! Immutable data carried between phases. Behavior lives in the policy,
//! execution, and learning modules — these types only hold state and enforce
//! construction-time invariants.

mod action;
mod cycle;
mod learning;
mod recommendation;
mod state;

pub use action::OptimizationAction;
pub use cycle::{
    ActPhase, CycleResult, DecidePhase, LearnPhase, LearningToken, SensePhase,
};
pub use learning::{
    ExperienceMetadata, LearningExperience, LearningPattern, ModelState, OutcomeMetrics,
    PatternConditions, PatternQuery, PatternStats, PerformanceTrend, Season, ValueRange,
};
pub use recommendation::{
    ExecutionMode, OptimizationRecommendation, PredictedEffect, Priority,
    RecommendationCategory, RecommendationStatus,
};
pub use state::{SensorAggregates, SensorState};
