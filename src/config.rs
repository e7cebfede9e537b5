//! # Smoother Configuration
//!
//! Every tunable of the smoothing strategies lives in one TOML file.
//! Missing sections and fields fall back to the documented defaults.
//!
//! ## Example
//!
//! ```toml
//! group = "manipulator"
//! strategy = "segment_chained"
//!
//! [limits]
//! batch_default_jerk = 20.0
//!
//! [batch]
//! velocity_scale = 0.5
//! max_duration_extension_attempts = 5
//!
//! [seam]
//! mode = "adaptive"
//!
//! [[joints]]
//! name = "wrist_roll"
//! kind = "continuous"
//! bounds = { max_velocity = 2.0 }
//! ```

// src/config.rs - Single configuration file
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::limits::{JointBounds, LimitDefaults};
use crate::trajectory::{JointKind, Trajectory};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which smoother a trajectory is run through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Replay every waypoint as one control cycle of the streaming smoother
    Streaming,
    /// Chain segment corrections with duration extension on failure
    #[default]
    SegmentChained,
    /// Independent dense segments followed by the seam filter
    Segmentwise,
}

impl FromStr for StrategyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "streaming" => Ok(StrategyKind::Streaming),
            "segment_chained" | "batch" => Ok(StrategyKind::SegmentChained),
            "segmentwise" => Ok(StrategyKind::Segmentwise),
            other => Err(ConfigError::Invalid(format!("Unknown strategy '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeamMode {
    /// Count bound violations without correcting them
    #[default]
    DetectOnly,
    /// Raise the filter coefficient until violations disappear
    Adaptive,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StreamingConfig {
    /// Control cycle period (seconds)
    #[serde(default = "default_update_period")]
    pub update_period: f64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            update_period: default_update_period(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BatchConfig {
    #[serde(default = "default_scale")]
    pub velocity_scale: f64,
    #[serde(default = "default_scale")]
    pub acceleration_scale: f64,
    /// Waypoints closer than this (Euclidean, joint space) count as identical
    #[serde(default = "default_identical_position_epsilon")]
    pub identical_position_epsilon: f64,
    #[serde(default = "default_velocity_derating_factor")]
    pub velocity_derating_factor: f64,
    /// De-rating stops once the target velocity norm falls to this value
    #[serde(default = "default_minimum_velocity_magnitude")]
    pub minimum_velocity_magnitude: f64,
    #[serde(default = "default_duration_extension_factor")]
    pub duration_extension_factor: f64,
    #[serde(default = "default_max_duration_extension_attempts")]
    pub max_duration_extension_attempts: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            velocity_scale: default_scale(),
            acceleration_scale: default_scale(),
            identical_position_epsilon: default_identical_position_epsilon(),
            velocity_derating_factor: default_velocity_derating_factor(),
            minimum_velocity_magnitude: default_minimum_velocity_magnitude(),
            duration_extension_factor: default_duration_extension_factor(),
            max_duration_extension_attempts: default_max_duration_extension_attempts(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SegmentwiseConfig {
    #[serde(default = "default_sample_time_step")]
    pub sample_time_step: f64,
    /// A segment may take at most this multiple of its requested duration
    #[serde(default = "default_max_duration_factor")]
    pub max_duration_factor: f64,
}

impl Default for SegmentwiseConfig {
    fn default() -> Self {
        Self {
            sample_time_step: default_sample_time_step(),
            max_duration_factor: default_max_duration_factor(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SeamConfig {
    #[serde(default = "default_seam_coefficient")]
    pub coefficient: f64,
    /// Sample spacing used for the discontinuity bound
    #[serde(default = "default_sample_time_step")]
    pub time_step: f64,
    #[serde(default)]
    pub mode: SeamMode,
    #[serde(default = "default_coefficient_growth")]
    pub coefficient_growth: f64,
    #[serde(default = "default_max_coefficient")]
    pub max_coefficient: f64,
}

impl Default for SeamConfig {
    fn default() -> Self {
        Self {
            coefficient: default_seam_coefficient(),
            time_step: default_sample_time_step(),
            mode: SeamMode::default(),
            coefficient_growth: default_coefficient_growth(),
            max_coefficient: default_max_coefficient(),
        }
    }
}

/// Per-joint settings that take precedence over what a trajectory file says
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct JointOverride {
    pub name: String,
    #[serde(default)]
    pub kind: Option<JointKind>,
    #[serde(default)]
    pub bounds: JointBounds,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SmootherConfig {
    /// Joint group assigned to trajectories that arrive without one
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub strategy: StrategyKind,
    #[serde(default)]
    pub limits: LimitDefaults,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub segmentwise: SegmentwiseConfig,
    #[serde(default)]
    pub seam: SeamConfig,
    #[serde(default)]
    pub joints: Vec<JointOverride>,
}

impl SmootherConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("limits.streaming_default_jerk", self.limits.streaming_default_jerk),
            ("limits.unbounded_acceleration", self.limits.unbounded_acceleration),
            ("limits.batch_default_velocity", self.limits.batch_default_velocity),
            ("limits.batch_default_acceleration", self.limits.batch_default_acceleration),
            ("limits.batch_default_jerk", self.limits.batch_default_jerk),
            ("streaming.update_period", self.streaming.update_period),
            ("batch.identical_position_epsilon", self.batch.identical_position_epsilon),
            ("batch.minimum_velocity_magnitude", self.batch.minimum_velocity_magnitude),
            ("segmentwise.sample_time_step", self.segmentwise.sample_time_step),
            ("seam.time_step", self.seam.time_step),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(format!("{} must be > 0, got {}", name, value)));
            }
        }
        for (name, value) in [
            ("batch.velocity_scale", self.batch.velocity_scale),
            ("batch.acceleration_scale", self.batch.acceleration_scale),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(invalid(format!("{} must be in (0, 1], got {}", name, value)));
            }
        }
        let derating = self.batch.velocity_derating_factor;
        if !(derating > 0.0 && derating < 1.0) {
            return Err(invalid(format!(
                "batch.velocity_derating_factor must be in (0, 1), got {}",
                derating
            )));
        }
        for (name, value) in [
            ("batch.duration_extension_factor", self.batch.duration_extension_factor),
            ("seam.coefficient_growth", self.seam.coefficient_growth),
        ] {
            if !(value.is_finite() && value > 1.0) {
                return Err(invalid(format!("{} must be > 1, got {}", name, value)));
            }
        }
        if !(self.segmentwise.max_duration_factor >= 1.0) {
            return Err(invalid(format!(
                "segmentwise.max_duration_factor must be >= 1, got {}",
                self.segmentwise.max_duration_factor
            )));
        }
        if self.batch.max_duration_extension_attempts == 0 {
            return Err(invalid("batch.max_duration_extension_attempts must be at least 1".to_string()));
        }
        if !(self.seam.coefficient >= 1.0) {
            return Err(invalid(format!(
                "seam.coefficient must be >= 1, got {}",
                self.seam.coefficient
            )));
        }
        if !(self.seam.max_coefficient >= self.seam.coefficient) {
            return Err(invalid(format!(
                "seam.max_coefficient ({}) must not be below seam.coefficient ({})",
                self.seam.max_coefficient, self.seam.coefficient
            )));
        }
        for joint in &self.joints {
            for (quantity, bound) in [
                ("max_velocity", joint.bounds.max_velocity),
                ("max_acceleration", joint.bounds.max_acceleration),
                ("max_jerk", joint.bounds.max_jerk),
            ] {
                if let Some(value) = bound {
                    if !(value.is_finite() && value > 0.0) {
                        return Err(invalid(format!(
                            "Joint '{}' {} must be > 0, got {}",
                            joint.name, quantity, value
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Fill in the group and apply `[[joints]]` overrides by joint name
    pub fn apply_to(&self, trajectory: &mut Trajectory) {
        if trajectory.group.is_none() {
            trajectory.group = self.group.clone();
        }
        for joint_override in &self.joints {
            let Some(spec) = trajectory
                .joints
                .iter_mut()
                .find(|j| j.name == joint_override.name)
            else {
                tracing::warn!(
                    "Config overrides joint '{}' which is not part of the trajectory",
                    joint_override.name
                );
                continue;
            };
            if let Some(kind) = joint_override.kind {
                spec.kind = kind;
            }
            let bounds = joint_override.bounds;
            if bounds.max_velocity.is_some() {
                spec.bounds.max_velocity = bounds.max_velocity;
            }
            if bounds.max_acceleration.is_some() {
                spec.bounds.max_acceleration = bounds.max_acceleration;
            }
            if bounds.max_jerk.is_some() {
                spec.bounds.max_jerk = bounds.max_jerk;
            }
        }
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Invalid(message)
}

fn default_update_period() -> f64 { 0.01 }
fn default_scale() -> f64 { 1.0 }
fn default_identical_position_epsilon() -> f64 { 1e-3 }
fn default_velocity_derating_factor() -> f64 { 0.9 }
fn default_minimum_velocity_magnitude() -> f64 { 0.01 }
fn default_duration_extension_factor() -> f64 { 1.1 }
fn default_max_duration_extension_attempts() -> usize { 5 }
fn default_sample_time_step() -> f64 { 0.001 }
fn default_max_duration_factor() -> f64 { 100.0 }
fn default_seam_coefficient() -> f64 { 20.0 }
fn default_coefficient_growth() -> f64 { 1.5 }
fn default_max_coefficient() -> f64 { 200.0 }

pub fn parse_toml(contents: &str) -> Result<SmootherConfig, ConfigError> {
    let config: SmootherConfig = toml::from_str(contents).map_err(|e| {
        tracing::error!("Failed to parse config TOML: {}", e);
        ConfigError::Toml(e)
    })?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: impl AsRef<Path>) -> Result<SmootherConfig, ConfigError> {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(contents) => parse_toml(&contents),
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path.display(), e);
            Err(ConfigError::Io(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::JointSpec;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_toml("").unwrap();
        assert_eq!(config, SmootherConfig::default());
        assert_eq!(config.strategy, StrategyKind::SegmentChained);
        assert_eq!(config.batch.max_duration_extension_attempts, 5);
        assert_eq!(config.seam.mode, SeamMode::DetectOnly);
        assert_eq!(config.limits.streaming_default_jerk, 300.0);
    }

    #[test]
    fn test_parse_sections() {
        let toml_str = r#"
            group = "arm"
            strategy = "segmentwise"

            [batch]
            velocity_scale = 0.5

            [seam]
            mode = "adaptive"
            coefficient = 10.0

            [[joints]]
            name = "wrist"
            kind = "continuous"
            bounds = { max_velocity = 2.0 }
        "#;
        let config = parse_toml(toml_str).unwrap();
        assert_eq!(config.group.as_deref(), Some("arm"));
        assert_eq!(config.strategy, StrategyKind::Segmentwise);
        assert_eq!(config.batch.velocity_scale, 0.5);
        assert_eq!(config.batch.acceleration_scale, 1.0);
        assert_eq!(config.seam.mode, SeamMode::Adaptive);
        assert_eq!(config.joints[0].kind, Some(JointKind::Continuous));
        assert_eq!(config.joints[0].bounds.max_velocity, Some(2.0));
    }

    #[test]
    fn test_validation_errors() {
        for toml_str in [
            "[batch]\nvelocity_scale = 0.0",
            "[batch]\nvelocity_derating_factor = 1.0",
            "[batch]\nmax_duration_extension_attempts = 0",
            "[seam]\ncoefficient = 0.5",
            "[seam]\nmax_coefficient = 5.0",
            "[streaming]\nupdate_period = -1.0",
            "[[joints]]\nname = \"a\"\nbounds = { max_jerk = 0.0 }",
        ] {
            assert!(
                matches!(parse_toml(toml_str), Err(ConfigError::Invalid(_))),
                "accepted: {}",
                toml_str
            );
        }
        assert!(matches!(parse_toml("strategy = 3"), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("streaming".parse::<StrategyKind>().unwrap(), StrategyKind::Streaming);
        assert_eq!("segment-chained".parse::<StrategyKind>().unwrap(), StrategyKind::SegmentChained);
        assert!("fastest".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn test_apply_to_trajectory() {
        let mut config = SmootherConfig::default();
        config.group = Some("arm".to_string());
        config.joints.push(JointOverride {
            name: "j2".to_string(),
            kind: Some(JointKind::Continuous),
            bounds: JointBounds {
                max_velocity: Some(0.5),
                ..Default::default()
            },
        });
        let mut trajectory = Trajectory::ungrouped(vec![
            JointSpec::new("j1", JointKind::Revolute, JointBounds::new(1.0, 1.0, 1.0)),
            JointSpec::new("j2", JointKind::Revolute, JointBounds::new(1.0, 2.0, 3.0)),
        ]);
        config.apply_to(&mut trajectory);
        assert_eq!(trajectory.group(), Some("arm"));
        assert_eq!(trajectory.joints[1].kind, JointKind::Continuous);
        assert_eq!(trajectory.joints[1].bounds, JointBounds::new(0.5, 2.0, 3.0));
        assert_eq!(trajectory.joints[0].bounds, JointBounds::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            load_config("/definitely/not/here.toml"),
            Err(ConfigError::Io(_))
        ));
    }
}
