// src/motion/solver.rs - Jerk-limited state transitions toward a target
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::quintic::{Boundary, Quintic, within_limit};
use crate::limits::JointLimits;
use crate::trajectory::KinematicState;

/// Growth factor for the coarse duration scan
const DURATION_SCAN_GROWTH: f64 = 1.05;
const MIN_DURATION: f64 = 1e-6;
const MAX_DURATION: f64 = 1e4;
const DURATION_BISECTIONS: usize = 50;
const SYNC_ATTEMPTS: usize = 32;
/// Relative slack when deciding whether a profile fits in one time step
const FINISH_SLACK: f64 = 1e-9;

/// How close the solver got to the requested target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileStatus {
    /// The target is reached within the current time step
    Finished,
    /// The target is still ahead; the output is an intermediate state
    Working,
    /// No common duration exists, so joints arrive at different times
    ApproximateSynchronization,
}

impl ProfileStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, ProfileStatus::Finished)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolverError {
    #[error("Expected {expected} joints in {field}, found {found}")]
    JointCountMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Time step must be positive and finite, got {0}")]
    InvalidTimeStep(f64),
    #[error("Non-finite {field} on joint {joint}")]
    NonFinite { field: &'static str, joint: usize },
    #[error("Invalid {quantity} limit {value} on joint {joint}")]
    InvalidLimit {
        joint: usize,
        quantity: &'static str,
        value: f64,
    },
    #[error("Target {quantity} {value} on joint {joint} exceeds its limit {limit}")]
    TargetOutsideLimits {
        joint: usize,
        quantity: &'static str,
        value: f64,
        limit: f64,
    },
    #[error("No feasible profile for joint {joint}")]
    NoFeasibleProfile { joint: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct SolverInput<'a> {
    pub current: &'a KinematicState,
    pub target: &'a KinematicState,
    pub limits: &'a JointLimits,
    /// Lower bound on the synchronized duration, if the caller wants the
    /// motion stretched to a desired length
    pub minimum_duration: Option<f64>,
}

impl<'a> SolverInput<'a> {
    pub fn new(
        current: &'a KinematicState,
        target: &'a KinematicState,
        limits: &'a JointLimits,
    ) -> Self {
        Self {
            current,
            target,
            limits,
            minimum_duration: None,
        }
    }

    pub fn with_minimum_duration(mut self, duration: f64) -> Self {
        self.minimum_duration = Some(duration);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutput {
    pub status: ProfileStatus,
    /// Kinematic state one time step after the input state
    pub state: KinematicState,
    /// Total duration of the computed profile
    pub duration: f64,
}

/// Computes the jerk-limited kinematic state one time step ahead
pub trait ProfileSolver {
    fn joint_count(&self) -> usize;
    fn time_step(&self) -> f64;
    fn set_time_step(&mut self, time_step: f64) -> Result<(), SolverError>;
    fn update(&self, input: &SolverInput) -> Result<SolverOutput, SolverError>;
}

/// Built-in solver fitting one quintic per joint and searching the
/// shortest duration that respects every limit.
#[derive(Debug, Clone)]
pub struct PolynomialSolver {
    joint_count: usize,
    time_step: f64,
}

impl PolynomialSolver {
    pub fn new(joint_count: usize, time_step: f64) -> Result<Self, SolverError> {
        check_time_step(time_step)?;
        Ok(Self {
            joint_count,
            time_step,
        })
    }

    fn validate(&self, input: &SolverInput) -> Result<(), SolverError> {
        let n = self.joint_count;
        for (field, found) in [
            ("current position", input.current.position.len()),
            ("current velocity", input.current.velocity.len()),
            ("current acceleration", input.current.acceleration.len()),
            ("target position", input.target.position.len()),
            ("target velocity", input.target.velocity.len()),
            ("target acceleration", input.target.acceleration.len()),
            ("limits", input.limits.joint_count()),
        ] {
            if found != n {
                return Err(SolverError::JointCountMismatch {
                    field,
                    expected: n,
                    found,
                });
            }
        }
        for joint in 0..n {
            for (field, value) in [
                ("current position", input.current.position[joint]),
                ("current velocity", input.current.velocity[joint]),
                ("current acceleration", input.current.acceleration[joint]),
                ("target position", input.target.position[joint]),
                ("target velocity", input.target.velocity[joint]),
                ("target acceleration", input.target.acceleration[joint]),
            ] {
                if !value.is_finite() {
                    return Err(SolverError::NonFinite { field, joint });
                }
            }
            for (quantity, value) in [
                ("velocity", input.limits.max_velocity[joint]),
                ("acceleration", input.limits.max_acceleration[joint]),
                ("jerk", input.limits.max_jerk[joint]),
            ] {
                if !(value.is_finite() && value > 0.0) {
                    return Err(SolverError::InvalidLimit {
                        joint,
                        quantity,
                        value,
                    });
                }
            }
            for (quantity, value, limit) in [
                (
                    "velocity",
                    input.target.velocity[joint],
                    input.limits.max_velocity[joint],
                ),
                (
                    "acceleration",
                    input.target.acceleration[joint],
                    input.limits.max_acceleration[joint],
                ),
            ] {
                if !within_limit(value.abs(), limit) {
                    return Err(SolverError::TargetOutsideLimits {
                        joint,
                        quantity,
                        value,
                        limit,
                    });
                }
            }
        }
        if let Some(duration) = input.minimum_duration {
            if !duration.is_finite() {
                return Err(SolverError::NonFinite {
                    field: "minimum duration",
                    joint: 0,
                });
            }
        }
        Ok(())
    }

    /// Shortest duration over which this joint's quintic respects its limits
    fn minimal_duration(&self, joint: usize, input: &SolverInput) -> Result<f64, SolverError> {
        let (start, end) = boundaries(joint, input);
        let limits = JointProfileLimits::new(joint, input);

        if is_stationary(start, end) {
            return Ok(0.0);
        }

        let lower = [
            (end.position - start.position).abs() / limits.velocity,
            (end.velocity - start.velocity).abs() / limits.acceleration,
            (end.acceleration - start.acceleration).abs() / limits.jerk,
        ]
        .into_iter()
        .fold(MIN_DURATION, f64::max);

        if limits.feasible(start, end, lower) {
            return Ok(lower);
        }

        let mut infeasible = lower;
        let mut candidate = lower * DURATION_SCAN_GROWTH;
        while !limits.feasible(start, end, candidate) {
            if candidate > MAX_DURATION {
                return Err(SolverError::NoFeasibleProfile { joint });
            }
            infeasible = candidate;
            candidate *= DURATION_SCAN_GROWTH;
        }

        let mut feasible = candidate;
        for _ in 0..DURATION_BISECTIONS {
            let mid = 0.5 * (infeasible + feasible);
            if limits.feasible(start, end, mid) {
                feasible = mid;
            } else {
                infeasible = mid;
            }
        }
        Ok(feasible)
    }

    fn all_feasible(&self, input: &SolverInput, duration: f64) -> bool {
        (0..self.joint_count).all(|joint| {
            let (start, end) = boundaries(joint, input);
            JointProfileLimits::new(joint, input).feasible(start, end, duration)
        })
    }

    /// Common duration for every joint, or `None` when none could be found
    fn synchronized_duration(&self, input: &SolverInput, per_joint: &[f64]) -> Option<f64> {
        let slowest = per_joint.iter().copied().fold(0.0, f64::max);
        let mut duration = match input.minimum_duration {
            Some(minimum) if minimum > slowest => minimum,
            _ => slowest,
        };
        if duration <= 0.0 {
            return Some(0.0);
        }
        for _ in 0..SYNC_ATTEMPTS {
            if self.all_feasible(input, duration) {
                return Some(duration);
            }
            duration *= DURATION_SCAN_GROWTH;
        }
        None
    }
}

impl ProfileSolver for PolynomialSolver {
    fn joint_count(&self) -> usize {
        self.joint_count
    }

    fn time_step(&self) -> f64 {
        self.time_step
    }

    fn set_time_step(&mut self, time_step: f64) -> Result<(), SolverError> {
        check_time_step(time_step)?;
        self.time_step = time_step;
        Ok(())
    }

    fn update(&self, input: &SolverInput) -> Result<SolverOutput, SolverError> {
        self.validate(input)?;

        // A requested duration that already satisfies every limit needs no search
        if let Some(minimum) = input.minimum_duration.filter(|d| *d > self.time_step) {
            if self.all_feasible(input, minimum) {
                let durations = vec![minimum; self.joint_count];
                return Ok(SolverOutput {
                    status: ProfileStatus::Working,
                    state: self.sample_each(input, &durations),
                    duration: minimum,
                });
            }
        }

        let per_joint = (0..self.joint_count)
            .map(|joint| self.minimal_duration(joint, input))
            .collect::<Result<Vec<_>, _>>()?;

        let Some(duration) = self.synchronized_duration(input, &per_joint) else {
            tracing::debug!("No common duration found; joints will arrive separately");
            return Ok(SolverOutput {
                status: ProfileStatus::ApproximateSynchronization,
                state: self.sample_each(input, &per_joint),
                duration: per_joint.iter().copied().fold(0.0, f64::max),
            });
        };

        if duration <= self.time_step * (1.0 + FINISH_SLACK) {
            return Ok(SolverOutput {
                status: ProfileStatus::Finished,
                state: input.target.clone(),
                duration,
            });
        }

        let durations = vec![duration; self.joint_count];
        Ok(SolverOutput {
            status: ProfileStatus::Working,
            state: self.sample_each(input, &durations),
            duration,
        })
    }
}

impl PolynomialSolver {
    /// Evaluate each joint's profile one time step in
    fn sample_each(&self, input: &SolverInput, durations: &[f64]) -> KinematicState {
        let mut state = KinematicState::zeros(self.joint_count);
        for (joint, &duration) in durations.iter().enumerate() {
            let (start, end) = boundaries(joint, input);
            let sample = if duration <= self.time_step {
                end
            } else {
                Quintic::from_boundary(start, end, duration).sample(self.time_step)
            };
            state.position[joint] = sample.position;
            state.velocity[joint] = sample.velocity;
            state.acceleration[joint] = sample.acceleration;
        }
        state
    }
}

/// Limits for one joint. Velocity and acceleration may be exceeded by the
/// starting state, in which case the profile only has to avoid growing past it.
struct JointProfileLimits {
    velocity: f64,
    acceleration: f64,
    jerk: f64,
}

impl JointProfileLimits {
    fn new(joint: usize, input: &SolverInput) -> Self {
        Self {
            velocity: input.limits.max_velocity[joint].max(input.current.velocity[joint].abs()),
            acceleration: input.limits.max_acceleration[joint]
                .max(input.current.acceleration[joint].abs()),
            jerk: input.limits.max_jerk[joint],
        }
    }

    fn feasible(&self, start: Boundary, end: Boundary, duration: f64) -> bool {
        Quintic::from_boundary(start, end, duration).within(
            self.velocity,
            self.acceleration,
            self.jerk,
        )
    }
}

fn boundaries(joint: usize, input: &SolverInput) -> (Boundary, Boundary) {
    (
        Boundary {
            position: input.current.position[joint],
            velocity: input.current.velocity[joint],
            acceleration: input.current.acceleration[joint],
        },
        Boundary {
            position: input.target.position[joint],
            velocity: input.target.velocity[joint],
            acceleration: input.target.acceleration[joint],
        },
    )
}

fn is_stationary(start: Boundary, end: Boundary) -> bool {
    start == end && start.velocity == 0.0 && start.acceleration == 0.0
}

fn check_time_step(time_step: f64) -> Result<(), SolverError> {
    if time_step.is_finite() && time_step > 0.0 {
        Ok(())
    } else {
        Err(SolverError::InvalidTimeStep(time_step))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(n: usize) -> JointLimits {
        JointLimits::uniform(n, 5.0, 10.0, 20.0).unwrap()
    }

    #[test]
    fn test_rest_to_rest_minimal_duration() {
        let solver = PolynomialSolver::new(1, 0.01).unwrap();
        let current = KinematicState::zeros(1);
        let target = KinematicState::at_rest(vec![1.0]);
        let limits = limits(1);
        let out = solver
            .update(&SolverInput::new(&current, &target, &limits))
            .unwrap();
        assert_eq!(out.status, ProfileStatus::Working);
        // Jerk-bound: 60 h / T³ <= 20
        assert!((out.duration - 3f64.cbrt()).abs() < 1e-6);
        assert!(out.state.position[0] > 0.0 && out.state.position[0] < 1e-3);
    }

    #[test]
    fn test_finished_when_reachable_within_step() {
        let solver = PolynomialSolver::new(1, 2.0).unwrap();
        let current = KinematicState::zeros(1);
        let target = KinematicState::at_rest(vec![1.0]);
        let limits = limits(1);
        let out = solver
            .update(&SolverInput::new(&current, &target, &limits))
            .unwrap();
        assert_eq!(out.status, ProfileStatus::Finished);
        assert_eq!(out.state, target);
    }

    #[test]
    fn test_joints_are_synchronized() {
        let solver = PolynomialSolver::new(2, 0.01).unwrap();
        let current = KinematicState::zeros(2);
        let target = KinematicState::at_rest(vec![1.0, 0.1]);
        let limits = limits(2);
        let out = solver
            .update(&SolverInput::new(&current, &target, &limits))
            .unwrap();
        // The short joint is stretched onto the long joint's duration, so
        // both have covered the same fraction of their move.
        let ratio0 = out.state.position[0] / 1.0;
        let ratio1 = out.state.position[1] / 0.1;
        assert!((ratio0 - ratio1).abs() < 1e-9);
    }

    #[test]
    fn test_minimum_duration_stretches_profile() {
        let solver = PolynomialSolver::new(1, 0.01).unwrap();
        let current = KinematicState::zeros(1);
        let target = KinematicState::at_rest(vec![1.0]);
        let limits = limits(1);
        let out = solver
            .update(&SolverInput::new(&current, &target, &limits).with_minimum_duration(4.0))
            .unwrap();
        assert!((out.duration - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_target_velocity_over_limit() {
        let solver = PolynomialSolver::new(1, 0.01).unwrap();
        let current = KinematicState::zeros(1);
        let target = KinematicState::new(vec![1.0], vec![6.0], vec![0.0]).unwrap();
        let limits = limits(1);
        let err = solver
            .update(&SolverInput::new(&current, &target, &limits))
            .unwrap_err();
        assert!(matches!(err, SolverError::TargetOutsideLimits { quantity: "velocity", .. }));
    }

    #[test]
    fn test_rejects_mismatched_and_non_finite_input() {
        let solver = PolynomialSolver::new(2, 0.01).unwrap();
        let current = KinematicState::zeros(1);
        let target = KinematicState::zeros(2);
        let limits = limits(2);
        assert!(matches!(
            solver.update(&SolverInput::new(&current, &target, &limits)),
            Err(SolverError::JointCountMismatch { field: "current position", .. })
        ));

        let current = KinematicState::at_rest(vec![0.0, f64::NAN]);
        assert!(matches!(
            solver.update(&SolverInput::new(&current, &target, &limits)),
            Err(SolverError::NonFinite { joint: 1, .. })
        ));
    }

    #[test]
    fn test_invalid_time_step() {
        assert_eq!(
            PolynomialSolver::new(1, 0.0).unwrap_err(),
            SolverError::InvalidTimeStep(0.0)
        );
        let mut solver = PolynomialSolver::new(1, 0.1).unwrap();
        assert!(solver.set_time_step(-1.0).is_err());
        assert_eq!(solver.time_step(), 0.1);
    }

    #[test]
    fn test_unsynchronizable_joints_arrive_separately() {
        let solver = PolynomialSolver::new(2, 0.01).unwrap();
        let current = KinematicState::zeros(2);
        // Joint 0 needs about 15 s; joint 1 ending at full speed and full
        // deceleration only has profiles up to roughly 12 s
        let target = KinematicState::new(vec![40.0, -2.0], vec![0.0, -5.0], vec![0.0, -10.0])
            .unwrap();
        let limits = limits(2);
        let out = solver
            .update(&SolverInput::new(&current, &target, &limits))
            .unwrap();
        assert_eq!(out.status, ProfileStatus::ApproximateSynchronization);
        assert!((out.duration - 15.0).abs() < 1e-6);
        assert!(out.state.position[0] > 0.0);
        assert!(out.state.velocity[1] < 0.0);
    }
}
