//! Outcome computation — before/after comparison over the observation window

use crate::types::{OutcomeMetrics, SensorState};

/// Computes outcome metrics from a before/after pair. A trait seam so
/// deployments can plug in plant-specific quality and stability models.
pub trait OutcomeFunction: Send + Sync {
    fn compute(&self, before: &SensorState, after: &SensorState) -> OutcomeMetrics;
}

/// Default outcome model over the built-in aggregates.
///
/// Stability is scored from how far the after snapshot drifted from the
/// before snapshot on temperature, pressure, and humidity: zero drift scores
/// 100, drift at or beyond the full-deviation scale scores 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregateOutcome;

/// Drift magnitudes treated as a full stability loss per variable.
const TEMP_FULL_DRIFT: f64 = 10.0;
const PRESSURE_FULL_DRIFT: f64 = 1.0;
const HUMIDITY_FULL_DRIFT: f64 = 15.0;

impl OutcomeFunction for AggregateOutcome {
    fn compute(&self, before: &SensorState, after: &SensorState) -> OutcomeMetrics {
        let b = &before.aggregates;
        let a = &after.aggregates;

        let energy_saved_kwh = b.energy_consumption - a.energy_consumption;
        let energy_saving_rate = if b.energy_consumption.abs() > f64::EPSILON {
            energy_saved_kwh / b.energy_consumption * 100.0
        } else {
            0.0
        };

        let temp_drift = ((a.temperature_out - b.temperature_out).abs() / TEMP_FULL_DRIFT).min(1.0);
        let pressure_drift = ((a.pressure - b.pressure).abs() / PRESSURE_FULL_DRIFT).min(1.0);
        let humidity_drift = ((a.humidity - b.humidity).abs() / HUMIDITY_FULL_DRIFT).min(1.0);
        let mean_drift = (temp_drift + pressure_drift + humidity_drift) / 3.0;
        let stability_score = (1.0 - mean_drift) * 100.0;

        let throughput_change_percent = if b.throughput.abs() > f64::EPSILON {
            (a.throughput - b.throughput) / b.throughput * 100.0
        } else {
            0.0
        };

        OutcomeMetrics {
            energy_saved_kwh,
            energy_saving_rate,
            quality_score: a.quality_index,
            stability_score,
            throughput_change_percent,
        }
    }
}
