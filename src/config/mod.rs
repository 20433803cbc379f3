//! Optimizer configuration — all tunables as operator-editable TOML values
//!
//! Every threshold the loop depends on lives here with a `Default` impl, so
//! behavior is fully defined when no config file is present. Configuration is
//! injected into each optimizer instance at construction; there is no process
//! global, so two lines with different configs can run in one process.

use crate::types::SensorAggregates;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one drying line deployment.
///
/// Load with `OptimizerConfig::load()` which searches:
/// 1. `$DRYLINE_CONFIG` env var
/// 2. `./optimizer_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Line identification
    #[serde(default)]
    pub line: LineInfo,

    /// Execution mode and autonomy thresholds
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Pattern learning parameters
    #[serde(default)]
    pub learning: LearningConfig,

    /// Actuation safety limits and sensor plausibility ranges
    #[serde(default)]
    pub safety: SafetyConfig,

    /// In-memory energy history ring size (cycles)
    #[serde(default = "default_history_buffer_size")]
    pub history_buffer_size: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            line: LineInfo::default(),
            execution: ExecutionConfig::default(),
            learning: LearningConfig::default(),
            safety: SafetyConfig::default(),
            history_buffer_size: default_history_buffer_size(),
        }
    }
}

impl OptimizerConfig {
    /// Load configuration using the standard search order:
    /// 1. `$DRYLINE_CONFIG` environment variable
    /// 2. `./optimizer_config.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("DRYLINE_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), line = %config.line.name, "Loaded optimizer config from DRYLINE_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from DRYLINE_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "DRYLINE_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from("optimizer_config.toml");
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(line = %config.line.name, "Loaded optimizer config from ./optimizer_config.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./optimizer_config.toml, using defaults");
                }
            }
        }

        info!("No optimizer_config.toml found — using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path and validate.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Cross-field sanity checks. Collects every problem rather than
    /// stopping at the first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        Self::check_unit_interval(
            self.execution.auto_apply_threshold,
            "execution.auto_apply_threshold",
            &mut errors,
        );
        Self::check_unit_interval(
            self.learning.exploration_rate,
            "learning.exploration_rate",
            &mut errors,
        );
        Self::check_unit_interval(
            self.learning.min_confidence_threshold,
            "learning.min_confidence_threshold",
            &mut errors,
        );
        Self::check_unit_interval(
            self.learning.initial_confidence,
            "learning.initial_confidence",
            &mut errors,
        );
        Self::check_unit_interval(
            self.learning.confidence_learning_rate,
            "learning.confidence_learning_rate",
            &mut errors,
        );
        Self::check_unit_interval(
            self.learning.activation_success_rate,
            "learning.activation_success_rate",
            &mut errors,
        );
        Self::check_unit_interval(
            self.learning.retirement_recent_success_rate,
            "learning.retirement_recent_success_rate",
            &mut errors,
        );

        for (name, limit) in [
            ("safety.target_temperature", &self.safety.target_temperature),
            ("safety.fan_speed", &self.safety.fan_speed),
            ("safety.feed_rate", &self.safety.feed_rate),
            ("safety.pressure_setpoint", &self.safety.pressure_setpoint),
        ] {
            if limit.min > limit.max {
                errors.push(format!(
                    "{name}: min ({}) exceeds max ({})",
                    limit.min, limit.max
                ));
            }
            if limit.max_step <= 0.0 {
                errors.push(format!("{name}.max_step must be positive"));
            }
        }

        if self.history_buffer_size == 0 {
            errors.push("history_buffer_size must be at least 1".to_string());
        }
        if self.learning.recent_window == 0 {
            errors.push("learning.recent_window must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_unit_interval(value: f64, name: &str, errors: &mut Vec<String>) {
        if !(0.0..=1.0).contains(&value) {
            errors.push(format!("{name} = {value} must be within [0, 1]"));
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {e}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Line Info
// ============================================================================

/// Identification metadata — not used for logic, but appears in logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineInfo {
    #[serde(default = "default_line_id")]
    pub id: String,
    #[serde(default = "default_line_name")]
    pub name: String,
}

impl Default for LineInfo {
    fn default() -> Self {
        Self {
            id: default_line_id(),
            name: default_line_name(),
        }
    }
}

fn default_line_id() -> String {
    "line-1".to_string()
}

fn default_line_name() -> String {
    "Drying Line 1".to_string()
}

// ============================================================================
// Execution
// ============================================================================

use crate::types::ExecutionMode;

/// Autonomy mode and the thresholds that govern it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// auto | semi_auto | monitoring
    #[serde(default)]
    pub mode: ExecutionMode,

    /// In auto mode, apply without approval at or above this confidence
    #[serde(default = "default_auto_apply_threshold")]
    pub auto_apply_threshold: f64,

    /// Pending recommendations expire after this many seconds
    #[serde(default = "default_pending_expiry_secs")]
    pub pending_expiry_secs: u64,

    /// Observation window between applying an action and learning from it
    #[serde(default = "default_observation_window_secs")]
    pub observation_window_secs: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            auto_apply_threshold: default_auto_apply_threshold(),
            pending_expiry_secs: default_pending_expiry_secs(),
            observation_window_secs: default_observation_window_secs(),
        }
    }
}

impl ExecutionConfig {
    pub fn pending_expiry(&self) -> Duration {
        Duration::from_secs(self.pending_expiry_secs)
    }

    pub fn observation_window(&self) -> Duration {
        Duration::from_secs(self.observation_window_secs)
    }
}

fn default_auto_apply_threshold() -> f64 {
    0.8
}
fn default_pending_expiry_secs() -> u64 {
    1800
}
fn default_observation_window_secs() -> u64 {
    300
}

// ============================================================================
// Learning
// ============================================================================

/// Pattern learning and exploration tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Base exploration probability, scaled down as confidence grows
    #[serde(default = "default_exploration_rate")]
    pub exploration_rate: f64,

    /// Patterns below this confidence are never exploited
    #[serde(default = "default_min_confidence_threshold")]
    pub min_confidence_threshold: f64,

    /// Confidence assigned to exploratory recommendations and new patterns
    #[serde(default = "default_initial_confidence")]
    pub initial_confidence: f64,

    /// Minimum reward for an unpatterned experience to seed a new pattern
    #[serde(default = "default_new_pattern_reward_threshold")]
    pub new_pattern_reward_threshold: f64,

    /// Half-width of the temperature condition window for new patterns (°C)
    #[serde(default = "default_condition_window")]
    pub condition_window_temperature: f64,

    /// Half-width of the humidity condition window for new patterns (%RH)
    #[serde(default = "default_condition_window")]
    pub condition_window_humidity: f64,

    /// Step size of the confidence update toward the reward target
    #[serde(default = "default_confidence_learning_rate")]
    pub confidence_learning_rate: f64,

    /// Number of most recent outcomes tracked per pattern
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,

    /// Applications required before a candidate can be promoted to active
    #[serde(default = "default_min_applications_for_activation")]
    pub min_applications_for_activation: u64,

    /// Lifetime success rate required for promotion
    #[serde(default = "default_activation_success_rate")]
    pub activation_success_rate: f64,

    /// Retire an active pattern when its recent success rate drops below this
    #[serde(default = "default_retirement_recent_success_rate")]
    pub retirement_recent_success_rate: f64,

    /// Temperature decrement used by exploratory actions (°C)
    #[serde(default = "default_exploration_temperature_step")]
    pub exploration_temperature_step: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            exploration_rate: default_exploration_rate(),
            min_confidence_threshold: default_min_confidence_threshold(),
            initial_confidence: default_initial_confidence(),
            new_pattern_reward_threshold: default_new_pattern_reward_threshold(),
            condition_window_temperature: default_condition_window(),
            condition_window_humidity: default_condition_window(),
            confidence_learning_rate: default_confidence_learning_rate(),
            recent_window: default_recent_window(),
            min_applications_for_activation: default_min_applications_for_activation(),
            activation_success_rate: default_activation_success_rate(),
            retirement_recent_success_rate: default_retirement_recent_success_rate(),
            exploration_temperature_step: default_exploration_temperature_step(),
        }
    }
}

fn default_exploration_rate() -> f64 {
    0.1
}
fn default_min_confidence_threshold() -> f64 {
    0.5
}
fn default_initial_confidence() -> f64 {
    0.3
}
fn default_new_pattern_reward_threshold() -> f64 {
    0.5
}
fn default_condition_window() -> f64 {
    5.0
}
fn default_confidence_learning_rate() -> f64 {
    0.1
}
fn default_recent_window() -> usize {
    10
}
fn default_min_applications_for_activation() -> u64 {
    5
}
fn default_activation_success_rate() -> f64 {
    0.6
}
fn default_retirement_recent_success_rate() -> f64 {
    0.3
}
fn default_exploration_temperature_step() -> f64 {
    5.0
}
fn default_history_buffer_size() -> usize {
    120
}

// ============================================================================
// Safety
// ============================================================================

/// Hard limit for one actuator: absolute range plus max change per step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SafetyLimit {
    pub min: f64,
    pub max: f64,
    /// Largest allowed change relative to the current value in one action
    pub max_step: f64,
}

impl SafetyLimit {
    pub const fn new(min: f64, max: f64, max_step: f64) -> Self {
        Self { min, max, max_step }
    }
}

/// Actuation limits plus sensor plausibility ranges. These are hard
/// constraints — no recommendation may violate them regardless of confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    #[serde(default = "default_temperature_limit")]
    pub target_temperature: SafetyLimit,
    #[serde(default = "default_fan_speed_limit")]
    pub fan_speed: SafetyLimit,
    #[serde(default = "default_feed_rate_limit")]
    pub feed_rate: SafetyLimit,
    #[serde(default = "default_pressure_limit")]
    pub pressure_setpoint: SafetyLimit,
    #[serde(default)]
    pub sensor: SensorValidation,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            target_temperature: default_temperature_limit(),
            fan_speed: default_fan_speed_limit(),
            feed_rate: default_feed_rate_limit(),
            pressure_setpoint: default_pressure_limit(),
            sensor: SensorValidation::default(),
        }
    }
}

fn default_temperature_limit() -> SafetyLimit {
    SafetyLimit::new(40.0, 95.0, 10.0)
}
fn default_fan_speed_limit() -> SafetyLimit {
    SafetyLimit::new(40.0, 100.0, 20.0)
}
fn default_feed_rate_limit() -> SafetyLimit {
    SafetyLimit::new(0.0, 2000.0, 200.0)
}
fn default_pressure_limit() -> SafetyLimit {
    SafetyLimit::new(0.5, 10.0, 1.0)
}

/// Plausible range for one sensor aggregate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlausibleRange {
    pub min: f64,
    pub max: f64,
}

impl PlausibleRange {
    const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    fn check(&self, name: &str, value: f64, errors: &mut Vec<String>) {
        if !value.is_finite() {
            errors.push(format!("{name} is not a finite number"));
        } else if value < self.min || value > self.max {
            errors.push(format!(
                "{name} = {value} outside plausible range [{}, {}]",
                self.min, self.max
            ));
        }
    }
}

/// Physical plausibility bounds for incoming sensor aggregates. A snapshot
/// outside these bounds fails the SENSE phase instead of driving a decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorValidation {
    #[serde(default = "default_temperature_range")]
    pub temperature: PlausibleRange,
    #[serde(default = "default_humidity_range")]
    pub humidity: PlausibleRange,
    #[serde(default = "default_pressure_range")]
    pub pressure: PlausibleRange,
    #[serde(default = "default_energy_range")]
    pub energy_consumption: PlausibleRange,
    #[serde(default = "default_throughput_range")]
    pub throughput: PlausibleRange,
    #[serde(default = "default_quality_range")]
    pub quality_index: PlausibleRange,
}

impl Default for SensorValidation {
    fn default() -> Self {
        Self {
            temperature: default_temperature_range(),
            humidity: default_humidity_range(),
            pressure: default_pressure_range(),
            energy_consumption: default_energy_range(),
            throughput: default_throughput_range(),
            quality_index: default_quality_range(),
        }
    }
}

impl SensorValidation {
    /// Validate one snapshot's aggregates, collecting every violation.
    pub fn check(&self, agg: &SensorAggregates) -> Result<(), String> {
        let mut errors = Vec::new();
        self.temperature
            .check("temperature_in", agg.temperature_in, &mut errors);
        self.temperature
            .check("temperature_out", agg.temperature_out, &mut errors);
        self.humidity.check("humidity", agg.humidity, &mut errors);
        self.pressure.check("pressure", agg.pressure, &mut errors);
        self.energy_consumption
            .check("energy_consumption", agg.energy_consumption, &mut errors);
        self.throughput
            .check("throughput", agg.throughput, &mut errors);
        self.quality_index
            .check("quality_index", agg.quality_index, &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("; "))
        }
    }
}

fn default_temperature_range() -> PlausibleRange {
    PlausibleRange::new(-20.0, 250.0)
}
fn default_humidity_range() -> PlausibleRange {
    PlausibleRange::new(0.0, 100.0)
}
fn default_pressure_range() -> PlausibleRange {
    PlausibleRange::new(0.0, 60.0)
}
fn default_energy_range() -> PlausibleRange {
    PlausibleRange::new(0.0, 1_000_000.0)
}
fn default_throughput_range() -> PlausibleRange {
    PlausibleRange::new(0.0, 100_000.0)
}
fn default_quality_range() -> PlausibleRange {
    PlausibleRange::new(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        let config = OptimizerConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.execution.auto_apply_threshold - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.execution.pending_expiry_secs, 1800);
        assert_eq!(config.learning.recent_window, 10);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let toml = r#"
            [line]
            name = "Line B"

            [execution]
            mode = "auto"
            auto_apply_threshold = 0.9
        "#;
        let config: OptimizerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.line.name, "Line B");
        assert_eq!(config.execution.mode, ExecutionMode::Auto);
        assert!((config.execution.auto_apply_threshold - 0.9).abs() < f64::EPSILON);
        // untouched sections keep defaults
        assert!((config.learning.exploration_rate - 0.1).abs() < f64::EPSILON);
        assert!((config.safety.target_temperature.max - 95.0).abs() < f64::EPSILON);
    }

    #[test]
    fn out_of_range_threshold_fails_validation() {
        let mut config = OptimizerConfig::default();
        config.execution.auto_apply_threshold = 1.4;
        config.learning.exploration_rate = -0.1;
        let err = config.validate().unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn implausible_sensor_values_are_rejected() {
        let validation = SensorValidation::default();
        let mut agg = SensorAggregates {
            temperature_in: 120.0,
            temperature_out: 85.0,
            humidity: 45.0,
            pressure: 2.0,
            energy_consumption: 100.0,
            throughput: 500.0,
            quality_index: 90.0,
        };
        assert!(validation.check(&agg).is_ok());

        agg.humidity = 150.0;
        let err = validation.check(&agg).unwrap_err();
        assert!(err.contains("humidity"));

        agg.humidity = f64::NAN;
        assert!(validation.check(&agg).is_err());
    }
}
