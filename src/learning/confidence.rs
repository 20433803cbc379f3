//! Confidence update rule
//!
//! Confidence moves exponentially toward 1.0 on positive reward and toward
//! 0.0 on negative reward, with the step scaled by the reward magnitude. A
//! long run of good outcomes is needed to reach high confidence; a single
//! bad outcome pulls it down proportionally but never below zero.

/// One confidence step. `reward` magnitude is capped at 1.0 so outsized
/// rewards cannot saturate confidence in a single update.
pub fn update_confidence(current: f64, reward: f64, learning_rate: f64) -> f64 {
    let target = if reward > 0.0 { 1.0 } else { 0.0 };
    let step = learning_rate * (target - current) * reward.abs().min(1.0);
    (current + step).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_reward_raises_confidence() {
        let updated = update_confidence(0.5, 0.8, 0.1);
        assert!(updated > 0.5);
        assert!(updated < 1.0);
    }

    #[test]
    fn negative_reward_lowers_confidence() {
        let updated = update_confidence(0.5, -0.8, 0.1);
        assert!(updated < 0.5);
        assert!(updated > 0.0);
    }

    #[test]
    fn confidence_stays_within_unit_interval() {
        let mut c = 0.5;
        for _ in 0..1000 {
            c = update_confidence(c, 1.0, 0.5);
        }
        assert!(c <= 1.0);
        let mut c = 0.5;
        for _ in 0..1000 {
            c = update_confidence(c, -1.0, 0.5);
        }
        assert!(c >= 0.0);
    }

    #[test]
    fn reward_magnitude_scales_the_step() {
        let small = update_confidence(0.5, 0.1, 0.1);
        let large = update_confidence(0.5, 0.9, 0.1);
        assert!(large > small);
        // magnitudes beyond 1.0 are capped
        let capped = update_confidence(0.5, 5.0, 0.1);
        let unit = update_confidence(0.5, 1.0, 0.1);
        assert!((capped - unit).abs() < 1e-12);
    }

    #[test]
    fn zero_reward_counts_as_failure_but_moves_nothing() {
        let updated = update_confidence(0.5, 0.0, 0.1);
        assert!((updated - 0.5).abs() < 1e-12);
    }
}
