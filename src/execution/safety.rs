//! Safety envelope checks run immediately before actuation

use crate::config::{SafetyConfig, SafetyLimit};
use crate::types::{OptimizationAction, SensorAggregates};

/// One violated constraint. The first violation found aborts the action.
#[derive(Debug, Clone, PartialEq)]
pub enum SafetyViolation {
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    StepTooLarge {
        field: &'static str,
        delta: f64,
        max_step: f64,
    },
}

impl std::fmt::Display for SafetyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SafetyViolation::OutOfRange {
                field,
                value,
                min,
                max,
            } => write!(f, "{field} = {value} outside safe range [{min}, {max}]"),
            SafetyViolation::StepTooLarge {
                field,
                delta,
                max_step,
            } => write!(
                f,
                "{field} change of {delta:.1} exceeds max step {max_step:.1}"
            ),
        }
    }
}

fn check_limit(
    field: &'static str,
    value: Option<f64>,
    current: Option<f64>,
    limit: &SafetyLimit,
) -> Result<(), SafetyViolation> {
    let Some(value) = value else {
        return Ok(());
    };
    if !value.is_finite() || value < limit.min || value > limit.max {
        return Err(SafetyViolation::OutOfRange {
            field,
            value,
            min: limit.min,
            max: limit.max,
        });
    }
    if let Some(current) = current {
        let delta = value - current;
        if delta.abs() > limit.max_step {
            return Err(SafetyViolation::StepTooLarge {
                field,
                delta,
                max_step: limit.max_step,
            });
        }
    }
    Ok(())
}

/// Verify every setpoint in the action against the hard limits and against
/// the current operating point. Runs at apply time so a stale recommendation
/// is re-checked against current conditions, not the ones it was decided
/// under.
pub fn verify_action(
    action: &OptimizationAction,
    safety: &SafetyConfig,
    current: &SensorAggregates,
) -> Result<(), SafetyViolation> {
    check_limit(
        "target_temperature",
        action.target_temperature,
        Some(current.temperature_out),
        &safety.target_temperature,
    )?;
    // No fan speed aggregate is sensed; range check only
    check_limit("fan_speed", action.fan_speed, None, &safety.fan_speed)?;
    check_limit(
        "feed_rate",
        action.feed_rate,
        Some(current.throughput),
        &safety.feed_rate,
    )?;
    check_limit(
        "pressure_setpoint",
        action.pressure_setpoint,
        Some(current.pressure),
        &safety.pressure_setpoint,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current() -> SensorAggregates {
        SensorAggregates {
            temperature_in: 120.0,
            temperature_out: 70.0,
            humidity: 40.0,
            pressure: 2.0,
            energy_consumption: 100.0,
            throughput: 500.0,
            quality_index: 88.0,
        }
    }

    #[test]
    fn empty_action_is_always_safe() {
        let action = OptimizationAction::new();
        assert!(verify_action(&action, &SafetyConfig::default(), &current()).is_ok());
    }

    #[test]
    fn out_of_range_temperature_is_rejected() {
        let mut action = OptimizationAction::new();
        action.target_temperature = Some(300.0);
        let violation =
            verify_action(&action, &SafetyConfig::default(), &current()).unwrap_err();
        assert!(matches!(
            violation,
            SafetyViolation::OutOfRange {
                field: "target_temperature",
                ..
            }
        ));
    }

    #[test]
    fn oversized_step_is_rejected_even_in_range() {
        // 85°C is inside [40, 95] but 15°C above the current 70°C outlet,
        // beyond the 10°C max step
        let mut action = OptimizationAction::new();
        action.target_temperature = Some(85.0);
        let violation =
            verify_action(&action, &SafetyConfig::default(), &current()).unwrap_err();
        assert!(matches!(violation, SafetyViolation::StepTooLarge { .. }));
    }

    #[test]
    fn step_within_limit_passes() {
        let mut action = OptimizationAction::new();
        action.target_temperature = Some(65.0);
        action.fan_speed = Some(90.0);
        action.feed_rate = Some(450.0);
        assert!(verify_action(&action, &SafetyConfig::default(), &current()).is_ok());
    }

    #[test]
    fn non_finite_setpoint_is_rejected() {
        let mut action = OptimizationAction::new();
        action.fan_speed = Some(f64::NAN);
        assert!(verify_action(&action, &SafetyConfig::default(), &current()).is_err());
    }
}
