//! Learning — outcome evaluation, reward, confidence, and pattern lifecycle

pub mod confidence;
mod outcome;
mod reward;
mod unit;

pub use outcome::{AggregateOutcome, OutcomeFunction};
pub use reward::{RewardBreakdown, RewardFunction, WeightedReward};
pub use unit::{LearningOutcome, LearningUnit};
