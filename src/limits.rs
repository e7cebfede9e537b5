//! Per-joint kinematic limits and the fallbacks used when a joint model
//! leaves a bound undefined.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bounds reported by the joint model. `None` means undefined.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JointBounds {
    #[serde(default)]
    pub max_velocity: Option<f64>,
    #[serde(default)]
    pub max_acceleration: Option<f64>,
    #[serde(default)]
    pub max_jerk: Option<f64>,
}

impl JointBounds {
    pub fn new(max_velocity: f64, max_acceleration: f64, max_jerk: f64) -> Self {
        Self {
            max_velocity: Some(max_velocity),
            max_acceleration: Some(max_acceleration),
            max_jerk: Some(max_jerk),
        }
    }

    pub fn velocity_only(max_velocity: f64) -> Self {
        Self {
            max_velocity: Some(max_velocity),
            ..Default::default()
        }
    }
}

/// Substitutes for undefined bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitDefaults {
    /// Jerk applied by the streaming smoother when a joint has none (rad/s³)
    #[serde(default = "default_streaming_jerk")]
    pub streaming_default_jerk: f64,
    /// Stand-in for an undefined acceleration bound in streaming mode
    #[serde(default = "default_unbounded_acceleration")]
    pub unbounded_acceleration: f64,
    #[serde(default = "default_batch_velocity")]
    pub batch_default_velocity: f64,
    #[serde(default = "default_batch_acceleration")]
    pub batch_default_acceleration: f64,
    /// Joint models carry no jerk bound, so batch smoothing always uses this
    #[serde(default = "default_batch_jerk")]
    pub batch_default_jerk: f64,
}

impl Default for LimitDefaults {
    fn default() -> Self {
        Self {
            streaming_default_jerk: default_streaming_jerk(),
            unbounded_acceleration: default_unbounded_acceleration(),
            batch_default_velocity: default_batch_velocity(),
            batch_default_acceleration: default_batch_acceleration(),
            batch_default_jerk: default_batch_jerk(),
        }
    }
}

fn default_streaming_jerk() -> f64 { 300.0 }
fn default_unbounded_acceleration() -> f64 { 1.0e9 }
fn default_batch_velocity() -> f64 { 5.0 }
fn default_batch_acceleration() -> f64 { 10.0 }
fn default_batch_jerk() -> f64 { 20.0 }

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LimitError {
    #[error("No velocity limit defined for joint {joint}")]
    MissingVelocity { joint: usize },
    #[error("{quantity} limit of joint {joint} must be positive and finite, got {value}")]
    NonPositive {
        joint: usize,
        quantity: &'static str,
        value: f64,
    },
    #[error("{name} scaling factor must be in (0, 1], got {value}")]
    InvalidScale { name: &'static str, value: f64 },
    #[error("Limit vectors have mismatched lengths ({velocity}, {acceleration}, {jerk})")]
    LengthMismatch {
        velocity: usize,
        acceleration: usize,
        jerk: usize,
    },
}

/// Resolved symmetric limits, one entry per joint
#[derive(Debug, Clone, PartialEq)]
pub struct JointLimits {
    pub max_velocity: Vec<f64>,
    pub max_acceleration: Vec<f64>,
    pub max_jerk: Vec<f64>,
}

impl JointLimits {
    pub fn new(
        max_velocity: Vec<f64>,
        max_acceleration: Vec<f64>,
        max_jerk: Vec<f64>,
    ) -> Result<Self, LimitError> {
        if max_velocity.len() != max_acceleration.len() || max_velocity.len() != max_jerk.len() {
            return Err(LimitError::LengthMismatch {
                velocity: max_velocity.len(),
                acceleration: max_acceleration.len(),
                jerk: max_jerk.len(),
            });
        }
        let limits = Self {
            max_velocity,
            max_acceleration,
            max_jerk,
        };
        for joint in 0..limits.joint_count() {
            check_positive(joint, "velocity", limits.max_velocity[joint])?;
            check_positive(joint, "acceleration", limits.max_acceleration[joint])?;
            check_positive(joint, "jerk", limits.max_jerk[joint])?;
        }
        Ok(limits)
    }

    /// The same limits on every joint
    pub fn uniform(
        joint_count: usize,
        max_velocity: f64,
        max_acceleration: f64,
        max_jerk: f64,
    ) -> Result<Self, LimitError> {
        Self::new(
            vec![max_velocity; joint_count],
            vec![max_acceleration; joint_count],
            vec![max_jerk; joint_count],
        )
    }

    /// Limits for the streaming smoother. A velocity bound is mandatory;
    /// missing acceleration and jerk bounds fall back to the defaults.
    pub fn for_streaming(
        bounds: &[JointBounds],
        defaults: &LimitDefaults,
    ) -> Result<Self, LimitError> {
        let mut velocity = Vec::with_capacity(bounds.len());
        let mut acceleration = Vec::with_capacity(bounds.len());
        let mut jerk = Vec::with_capacity(bounds.len());
        for (joint, bound) in bounds.iter().enumerate() {
            let Some(v) = bound.max_velocity else {
                tracing::error!("No velocity limit defined for joint {}; refusing to smooth", joint);
                return Err(LimitError::MissingVelocity { joint });
            };
            velocity.push(v);
            acceleration.push(bound.max_acceleration.unwrap_or_else(|| {
                tracing::warn!(
                    "No acceleration limit defined for joint {}; very large accelerations will be possible",
                    joint
                );
                defaults.unbounded_acceleration
            }));
            jerk.push(bound.max_jerk.unwrap_or_else(|| {
                tracing::warn!(
                    "No jerk limit defined for joint {}; applying default of {} rad/s^3",
                    joint,
                    defaults.streaming_default_jerk
                );
                defaults.streaming_default_jerk
            }));
        }
        Self::new(velocity, acceleration, jerk)
    }

    /// Scaled limits for batch smoothing. Undefined bounds use the batch
    /// defaults and jerk always comes from the defaults.
    pub fn for_batch(
        bounds: &[JointBounds],
        velocity_scale: f64,
        acceleration_scale: f64,
        defaults: &LimitDefaults,
    ) -> Result<Self, LimitError> {
        check_scale("velocity", velocity_scale)?;
        check_scale("acceleration", acceleration_scale)?;
        let velocity = bounds
            .iter()
            .map(|b| velocity_scale * b.max_velocity.unwrap_or(defaults.batch_default_velocity))
            .collect();
        let acceleration = bounds
            .iter()
            .map(|b| {
                acceleration_scale
                    * b.max_acceleration
                        .unwrap_or(defaults.batch_default_acceleration)
            })
            .collect();
        let jerk = vec![defaults.batch_default_jerk; bounds.len()];
        Self::new(velocity, acceleration, jerk)
    }

    pub fn joint_count(&self) -> usize {
        self.max_velocity.len()
    }

    /// Largest displacement a joint can make in `dt` from the third-order
    /// Taylor expansion v·dt + a·dt²/2 + j·dt³/6.
    pub fn max_displacement(&self, joint: usize, dt: f64) -> f64 {
        self.max_velocity[joint] * dt
            + 0.5 * self.max_acceleration[joint] * dt * dt
            + self.max_jerk[joint] * dt * dt * dt / 6.0
    }
}

fn check_positive(joint: usize, quantity: &'static str, value: f64) -> Result<(), LimitError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(LimitError::NonPositive {
            joint,
            quantity,
            value,
        })
    }
}

fn check_scale(name: &'static str, value: f64) -> Result<(), LimitError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(LimitError::InvalidScale { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streaming_requires_velocity() {
        let bounds = [JointBounds::new(1.0, 2.0, 3.0), JointBounds::default()];
        let err = JointLimits::for_streaming(&bounds, &LimitDefaults::default()).unwrap_err();
        assert_eq!(err, LimitError::MissingVelocity { joint: 1 });
    }

    #[test]
    fn test_streaming_fallbacks() {
        let defaults = LimitDefaults::default();
        let limits =
            JointLimits::for_streaming(&[JointBounds::velocity_only(1.5)], &defaults).unwrap();
        assert_eq!(limits.max_velocity, vec![1.5]);
        assert_eq!(limits.max_acceleration, vec![defaults.unbounded_acceleration]);
        assert_eq!(limits.max_jerk, vec![300.0]);
    }

    #[test]
    fn test_batch_scaling_and_defaults() {
        let bounds = [JointBounds::new(2.0, 4.0, 1000.0), JointBounds::default()];
        let limits = JointLimits::for_batch(&bounds, 0.5, 0.25, &LimitDefaults::default()).unwrap();
        assert_eq!(limits.max_velocity, vec![1.0, 2.5]);
        assert_eq!(limits.max_acceleration, vec![1.0, 2.5]);
        // Joint-model jerk is ignored in batch mode
        assert_eq!(limits.max_jerk, vec![20.0, 20.0]);
    }

    #[test]
    fn test_batch_rejects_bad_scale() {
        let bounds = [JointBounds::default()];
        assert!(matches!(
            JointLimits::for_batch(&bounds, 0.0, 1.0, &LimitDefaults::default()),
            Err(LimitError::InvalidScale { name: "velocity", .. })
        ));
        assert!(JointLimits::for_batch(&bounds, 1.0, 1.5, &LimitDefaults::default()).is_err());
    }

    #[test]
    fn test_zero_limit_rejected() {
        assert!(matches!(
            JointLimits::uniform(2, 1.0, 0.0, 1.0),
            Err(LimitError::NonPositive { quantity: "acceleration", .. })
        ));
    }

    #[test]
    fn test_max_displacement() {
        let limits = JointLimits::uniform(1, 5.0, 10.0, 20.0).unwrap();
        let dt: f64 = 0.001;
        let expected = 5.0 * dt + 0.5 * 10.0 * dt * dt + 20.0 * dt.powi(3) / 6.0;
        assert!((limits.max_displacement(0, dt) - expected).abs() < 1e-15);
    }
}
