//! Reward computation — scalar signal driving confidence and pattern stats

use crate::types::OutcomeMetrics;

/// Per-component reward breakdown, kept for explainability. `total` is the
/// value the learning math consumes; the components and explanation feed
/// logs and the audit record.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardBreakdown {
    pub energy: f64,
    pub quality: f64,
    pub stability: f64,
    pub throughput: f64,
    /// Weighted sum, in [-1, 1]
    pub total: f64,
    pub explanation: String,
}

/// Maps an outcome to a reward. A trait seam so deployments can re-weight
/// objectives without touching the learning plumbing.
pub trait RewardFunction: Send + Sync {
    fn compute(&self, outcome: &OutcomeMetrics) -> RewardBreakdown;
}

/// Default weighting: energy 0.4, quality 0.3, stability 0.2, throughput 0.1.
///
/// Each component is normalized to [-1, 1] before weighting:
/// - energy: saving rate of +10% scores 1.0, -10% scores -1.0
/// - quality: 80 is neutral, 100 scores 1.0, 60 scores -1.0
/// - stability: 50 is neutral, 100 scores 1.0, 0 scores -1.0
/// - throughput: +10% scores 1.0, -10% scores -1.0
#[derive(Debug, Clone, Copy)]
pub struct WeightedReward {
    pub energy_weight: f64,
    pub quality_weight: f64,
    pub stability_weight: f64,
    pub throughput_weight: f64,
}

impl Default for WeightedReward {
    fn default() -> Self {
        Self {
            energy_weight: 0.4,
            quality_weight: 0.3,
            stability_weight: 0.2,
            throughput_weight: 0.1,
        }
    }
}

impl RewardFunction for WeightedReward {
    fn compute(&self, outcome: &OutcomeMetrics) -> RewardBreakdown {
        let energy = (outcome.energy_saving_rate / 10.0).clamp(-1.0, 1.0);
        let quality = ((outcome.quality_score - 80.0) / 20.0).clamp(-1.0, 1.0);
        let stability = ((outcome.stability_score - 50.0) / 50.0).clamp(-1.0, 1.0);
        let throughput = (outcome.throughput_change_percent / 10.0).clamp(-1.0, 1.0);

        let total = self.energy_weight * energy
            + self.quality_weight * quality
            + self.stability_weight * stability
            + self.throughput_weight * throughput;

        let explanation = format!(
            "energy {:+.2} ({:.1}% saving), quality {:+.2} (score {:.1}), stability {:+.2} (score {:.1}), throughput {:+.2} ({:+.1}%)",
            energy,
            outcome.energy_saving_rate,
            quality,
            outcome.quality_score,
            stability,
            outcome.stability_score,
            throughput,
            outcome.throughput_change_percent,
        );

        RewardBreakdown {
            energy,
            quality,
            stability,
            throughput,
            total,
            explanation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(saving: f64, quality: f64, stability: f64, throughput: f64) -> OutcomeMetrics {
        OutcomeMetrics {
            energy_saved_kwh: saving,
            energy_saving_rate: saving,
            quality_score: quality,
            stability_score: stability,
            throughput_change_percent: throughput,
        }
    }

    #[test]
    fn energy_saving_with_held_quality_is_positive() {
        // 10% saving, quality 88, neutral stability and throughput
        let reward = WeightedReward::default().compute(&outcome(10.0, 88.0, 50.0, 0.0));
        assert!(reward.total > 0.0);
        assert!((reward.energy - 1.0).abs() < 1e-9);
        assert!((reward.quality - 0.4).abs() < 1e-9);
        assert!((reward.total - 0.52).abs() < 1e-9);
    }

    #[test]
    fn quality_collapse_outweighs_energy_saving() {
        let reward = WeightedReward::default().compute(&outcome(10.0, 55.0, 50.0, 0.0));
        // energy +0.4, quality -0.3 (clamped at -1), net barely positive
        assert!(reward.quality < 0.0);
        assert!(reward.total < 0.2);
    }

    #[test]
    fn components_are_clamped() {
        let reward = WeightedReward::default().compute(&outcome(500.0, 100.0, 100.0, 500.0));
        assert!((reward.total - 1.0).abs() < 1e-9);
        let reward = WeightedReward::default().compute(&outcome(-500.0, 0.0, 0.0, -500.0));
        assert!((reward.total + 1.0).abs() < 1e-9);
    }

    #[test]
    fn explanation_names_every_component() {
        let reward = WeightedReward::default().compute(&outcome(5.0, 90.0, 80.0, 2.0));
        for needle in ["energy", "quality", "stability", "throughput"] {
            assert!(reward.explanation.contains(needle));
        }
    }
}
