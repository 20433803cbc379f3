//! DRYLINE: Adaptive Drying-Line Optimization
//!
//! Closed-loop controller for industrial sludge drying lines. Each monitored
//! line runs a SENSE → DECIDE → ACT → LEARN cycle per sensor snapshot:
//!
//! - **Decision Policy**: exploit the best matching learned pattern or explore
//!   a bounded perturbation of the current operating point
//! - **Execution Controller**: bounded-autonomy actuation (auto / semi-auto /
//!   monitoring) with safety-limit enforcement at the boundary
//! - **Learning Unit**: reward computation, experience persistence, pattern
//!   statistics and confidence updates, candidate-pattern discovery
//! - **Pattern Store**: repository for learned condition→action patterns
//!
//! Learning is deferred: applying an action yields a [`LearningToken`], and a
//! scheduler supplies the post-observation state to `learn` once the
//! observation window has elapsed.

pub mod config;
pub mod error;
pub mod execution;
pub mod learning;
pub mod orchestrator;
pub mod policy;
pub mod store;
pub mod types;

// Re-export configuration
pub use config::{ConfigError, OptimizerConfig};

// Re-export commonly used types
pub use types::{
    CycleResult, ExecutionMode, LearningExperience, LearningPattern, LearningToken, ModelState,
    OptimizationAction, OptimizationRecommendation, OutcomeMetrics, RecommendationStatus,
    SensorAggregates, SensorState,
};

// Re-export the orchestrator
pub use orchestrator::LineOptimizer;

// Re-export store components
pub use store::{MemoryPatternStore, PatternStore, SledPatternStore, StoreError};

// Re-export the actuation boundary
pub use execution::{ActuationError, Actuator};

// Re-export error taxonomy
pub use error::OptimizerError;

// Re-export learning extension points
pub use learning::{LearningOutcome, OutcomeFunction, RewardBreakdown, RewardFunction};
