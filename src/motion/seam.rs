// src/motion/seam.rs - Low-pass smoothing across independently generated segments
use tracing::{debug, info, warn};

use super::SmoothingError;
use super::retry::retry;
use crate::config::{SeamConfig, SeamMode};
use crate::limits::JointLimits;
use crate::trajectory::Trajectory;

/// Trait for sample-by-sample signal filters
pub trait SignalFilter {
    /// Process the next input sample and return the filtered output
    fn do_step(&mut self, input: f64) -> f64;
    /// Restart the filter as if it had been at `value` forever
    fn reset(&mut self, value: f64);
}

/// First-order low-pass filter. Larger coefficients smooth harder;
/// 1.0 passes the signal through with a one-sample average.
#[derive(Debug, Clone)]
pub struct LowPassFilter {
    coefficient: f64,
    scale: f64,
    feedback: f64,
    previous_measurement: f64,
    previous_filtered: f64,
}

impl LowPassFilter {
    pub fn new(coefficient: f64) -> Result<Self, SmoothingError> {
        if !(coefficient.is_finite() && coefficient >= 1.0) {
            return Err(SmoothingError::InvalidParameter {
                name: "filter coefficient",
                value: coefficient,
                reason: "must be at least 1",
            });
        }
        Ok(Self {
            coefficient,
            scale: 1.0 / (1.0 + coefficient),
            feedback: 1.0 - coefficient,
            previous_measurement: 0.0,
            previous_filtered: 0.0,
        })
    }

    pub fn coefficient(&self) -> f64 {
        self.coefficient
    }
}

impl SignalFilter for LowPassFilter {
    fn do_step(&mut self, input: f64) -> f64 {
        let filtered =
            self.scale * (input + self.previous_measurement - self.feedback * self.previous_filtered);
        self.previous_measurement = input;
        self.previous_filtered = filtered;
        filtered
    }

    fn reset(&mut self, value: f64) {
        self.previous_measurement = value;
        self.previous_filtered = value;
    }
}

/// Per-joint result of a seam filtering pass
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SeamReport {
    /// Discontinuities above the bound, per joint
    pub failures: Vec<usize>,
    /// Coefficient finally applied to each joint
    pub coefficients: Vec<f64>,
}

impl SeamReport {
    pub fn total_failures(&self) -> usize {
        self.failures.iter().sum()
    }
}

#[derive(Debug, Clone)]
struct FilteredJoint {
    positions: Vec<f64>,
    failures: usize,
    coefficient: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SeamFilter {
    config: SeamConfig,
}

impl SeamFilter {
    pub fn new(config: SeamConfig) -> Result<Self, SmoothingError> {
        LowPassFilter::new(config.coefficient)?;
        if !(config.time_step.is_finite() && config.time_step > 0.0) {
            return Err(SmoothingError::InvalidParameter {
                name: "seam time step",
                value: config.time_step,
                reason: "must be positive",
            });
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &SeamConfig {
        &self.config
    }

    /// Filter every joint's positions in place and count the waypoints whose
    /// step from the previous one exceeds what the limits allow in one
    /// sample period. Velocities and accelerations are left as they are.
    pub fn apply(
        &self,
        trajectory: &mut Trajectory,
        limits: &JointLimits,
    ) -> Result<SeamReport, SmoothingError> {
        self.apply_at(trajectory, limits, self.config.time_step)
    }

    /// [`SeamFilter::apply`] for samples spaced `time_step` seconds apart
    pub fn apply_at(
        &self,
        trajectory: &mut Trajectory,
        limits: &JointLimits,
        time_step: f64,
    ) -> Result<SeamReport, SmoothingError> {
        let joint_count = trajectory.joint_count();
        if limits.joint_count() != joint_count {
            return Err(SmoothingError::InvalidParameter {
                name: "limits joint count",
                value: limits.joint_count() as f64,
                reason: "must match the trajectory's joint count",
            });
        }
        let mut report = SeamReport::default();
        if trajectory.waypoint_count() == 0 {
            report.failures = vec![0; joint_count];
            report.coefficients = vec![self.config.coefficient; joint_count];
            return Ok(report);
        }

        for joint in 0..joint_count {
            let raw: Vec<f64> = trajectory
                .waypoints()
                .iter()
                .map(|w| w.state.position[joint])
                .collect();
            let bound = limits.max_displacement(joint, time_step);
            let filtered = match self.config.mode {
                SeamMode::DetectOnly => filter_joint(&raw, self.config.coefficient, bound)?,
                SeamMode::Adaptive => self.filter_adaptive(&raw, bound)?,
            };
            if filtered.failures > 0 {
                warn!(
                    "Joint {}: {} discontinuities above {:.6} remain after filtering (coefficient {})",
                    joint, filtered.failures, bound, filtered.coefficient
                );
            }
            for (waypoint, position) in trajectory
                .waypoints
                .iter_mut()
                .zip(&filtered.positions)
                .skip(1)
            {
                waypoint.state.position[joint] = *position;
            }
            report.failures.push(filtered.failures);
            report.coefficients.push(filtered.coefficient);
        }
        info!("Seam filter failures: {}", report.total_failures());
        Ok(report)
    }

    /// Re-filter from the raw samples with growing coefficients until the
    /// bound holds or the cap is reached
    fn filter_adaptive(&self, raw: &[f64], bound: f64) -> Result<FilteredJoint, SmoothingError> {
        let schedule = coefficient_schedule(
            self.config.coefficient,
            self.config.coefficient_growth,
            self.config.max_coefficient,
        );
        let mut first_error = None;
        let outcome = retry(
            schedule.len(),
            |index| match filter_joint(raw, schedule[index], bound) {
                Ok(filtered) => Some(filtered),
                Err(e) => {
                    first_error.get_or_insert(e);
                    None
                }
            },
            |filtered| filtered.as_ref().is_none_or(|f| f.failures == 0),
        );
        if let Some(e) = first_error {
            return Err(e);
        }
        outcome
            .and_then(|o| o.value)
            .ok_or(SmoothingError::InvalidParameter {
                name: "seam coefficient schedule",
                value: self.config.coefficient,
                reason: "produced no coefficients",
            })
    }
}

/// Coefficients tried in adaptive mode: geometric growth, capped at `max`
fn coefficient_schedule(start: f64, growth: f64, max: f64) -> Vec<f64> {
    let mut schedule = Vec::new();
    let mut coefficient = start;
    if growth > 1.0 {
        while coefficient < max {
            schedule.push(coefficient);
            coefficient *= growth;
        }
    }
    if schedule.last().is_none_or(|&last| last < max) {
        schedule.push(max.max(start));
    }
    schedule
}

fn filter_joint(raw: &[f64], coefficient: f64, bound: f64) -> Result<FilteredJoint, SmoothingError> {
    let mut filter = LowPassFilter::new(coefficient)?;
    let Some(&first) = raw.first() else {
        return Ok(FilteredJoint {
            positions: Vec::new(),
            failures: 0,
            coefficient,
        });
    };
    filter.reset(first);
    let mut positions = Vec::with_capacity(raw.len());
    positions.push(first);
    let mut failures = 0;
    for (index, &sample) in raw.iter().enumerate().skip(1) {
        let filtered = filter.do_step(sample);
        let discontinuity = filtered - positions[index - 1];
        if discontinuity.abs() > bound {
            debug!(
                "Discontinuity {:.6} at waypoint {} exceeds {:.6}",
                discontinuity, index, bound
            );
            failures += 1;
        }
        positions.push(filtered);
    }
    Ok(FilteredJoint {
        positions,
        failures,
        coefficient,
    })
}
