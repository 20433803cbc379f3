//! Control action type

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bounded set of control setpoints for the drying line.
///
/// Every field is an optional setpoint — `None` means "leave unchanged".
/// Safety limits (min/max, max-change-per-step) are enforced by the
/// Execution Controller immediately before actuation, not by this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationAction {
    pub id: Uuid,
    /// Target dryer temperature (°C)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_temperature: Option<f64>,
    /// Exhaust fan speed (%)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fan_speed: Option<f64>,
    /// Sludge feed rate (kg/h)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_rate: Option<f64>,
    /// Chamber pressure setpoint (bar)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure_setpoint: Option<f64>,
}

impl OptimizationAction {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            target_temperature: None,
            fan_speed: None,
            feed_rate: None,
            pressure_setpoint: None,
        }
    }

    /// True when no setpoint is present.
    pub fn is_empty(&self) -> bool {
        self.target_temperature.is_none()
            && self.fan_speed.is_none()
            && self.feed_rate.is_none()
            && self.pressure_setpoint.is_none()
    }

    /// Iterate over the setpoints that are present, with field names for
    /// diagnostics.
    pub fn setpoints(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        [
            ("target_temperature", self.target_temperature),
            ("fan_speed", self.fan_speed),
            ("feed_rate", self.feed_rate),
            ("pressure_setpoint", self.pressure_setpoint),
        ]
        .into_iter()
        .filter_map(|(name, v)| v.map(|v| (name, v)))
    }
}

impl Default for OptimizationAction {
    fn default() -> Self {
        Self::new()
    }
}
