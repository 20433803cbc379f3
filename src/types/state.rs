//! Sensor state snapshot types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Derived process variables for one observation tick.
///
/// Computed once from the raw readings by the sensing boundary and never
/// recomputed in place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorAggregates {
    /// Inlet air temperature (°C)
    pub temperature_in: f64,
    /// Dryer outlet temperature (°C)
    pub temperature_out: f64,
    /// Exhaust humidity (%RH)
    pub humidity: f64,
    /// Chamber pressure (bar)
    pub pressure: f64,
    /// Energy consumed over the tick (kWh)
    pub energy_consumption: f64,
    /// Throughput (kg/h wet sludge)
    pub throughput: f64,
    /// Output quality indicator (0–100, dryness/consistency composite)
    pub quality_index: f64,
}

/// Immutable snapshot of a drying line at one observation tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorState {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Raw per-sensor readings, keyed by sensor id
    pub raw_readings: BTreeMap<String, f64>,
    /// Aggregates derived from `raw_readings` at creation time
    pub aggregates: SensorAggregates,
}

impl SensorState {
    /// Build a snapshot from raw readings and the aggregates derived from
    /// them. The caller (the sensing boundary) is responsible for the
    /// derivation — aggregates are frozen from this point on.
    pub fn new(raw_readings: BTreeMap<String, f64>, aggregates: SensorAggregates) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            raw_readings,
            aggregates,
        }
    }

    /// Snapshot with an explicit timestamp (replay and tests).
    pub fn at(
        timestamp: DateTime<Utc>,
        raw_readings: BTreeMap<String, f64>,
        aggregates: SensorAggregates,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            raw_readings,
            aggregates,
        }
    }
}
