// src/trajectory.rs - Waypoint storage shared by every smoothing strategy
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use thiserror::Error;

use crate::limits::JointBounds;

/// Position, velocity and acceleration of every joint at one instant.
///
/// All three vectors are index-aligned with the joint ordering of the
/// trajectory (or smoothing session) they belong to.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KinematicState {
    pub position: Vec<f64>,
    #[serde(default)]
    pub velocity: Vec<f64>,
    #[serde(default)]
    pub acceleration: Vec<f64>,
}

impl KinematicState {
    pub fn new(
        position: Vec<f64>,
        velocity: Vec<f64>,
        acceleration: Vec<f64>,
    ) -> Result<Self, TrajectoryError> {
        let state = Self {
            position,
            velocity,
            acceleration,
        };
        state.check_joint_count(state.position.len())?;
        Ok(state)
    }

    /// All joints at zero position, velocity and acceleration
    pub fn zeros(joint_count: usize) -> Self {
        Self {
            position: vec![0.0; joint_count],
            velocity: vec![0.0; joint_count],
            acceleration: vec![0.0; joint_count],
        }
    }

    /// Joints resting at the given positions
    pub fn at_rest(position: Vec<f64>) -> Self {
        let joint_count = position.len();
        Self {
            position,
            velocity: vec![0.0; joint_count],
            acceleration: vec![0.0; joint_count],
        }
    }

    pub fn joint_count(&self) -> usize {
        self.position.len()
    }

    pub fn check_joint_count(&self, expected: usize) -> Result<(), TrajectoryError> {
        for found in [
            self.position.len(),
            self.velocity.len(),
            self.acceleration.len(),
        ] {
            if found != expected {
                return Err(TrajectoryError::JointCountMismatch { expected, found });
            }
        }
        Ok(())
    }

    pub fn is_finite(&self) -> bool {
        self.position
            .iter()
            .chain(&self.velocity)
            .chain(&self.acceleration)
            .all(|v| v.is_finite())
    }

    /// Euclidean distance between the position vectors of two states
    pub fn position_distance(&self, other: &KinematicState) -> f64 {
        self.position
            .iter()
            .zip(&other.position)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }

    /// Replace missing velocity/acceleration vectors with zeros
    fn fill_missing_derivatives(&mut self) {
        let joint_count = self.position.len();
        if self.velocity.is_empty() {
            self.velocity = vec![0.0; joint_count];
        }
        if self.acceleration.is_empty() {
            self.acceleration = vec![0.0; joint_count];
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    #[serde(flatten)]
    pub state: KinematicState,
    /// Time since the previous waypoint (seconds); ignored for the first one
    #[serde(default)]
    pub duration_from_previous: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointKind {
    Prismatic,
    #[default]
    Revolute,
    /// Revolute joint without position bounds; its angle wraps around
    Continuous,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointSpec {
    pub name: String,
    #[serde(default)]
    pub kind: JointKind,
    #[serde(default)]
    pub bounds: JointBounds,
}

impl JointSpec {
    pub fn new(name: impl Into<String>, kind: JointKind, bounds: JointBounds) -> Self {
        Self {
            name: name.into(),
            kind,
            bounds,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrajectoryError {
    #[error("Waypoint index {index} out of range for trajectory with {len} waypoints")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Expected {expected} joint values, found {found}")]
    JointCountMismatch { expected: usize, found: usize },
    #[error("Waypoint {index} has non-increasing timestamp (duration from previous {duration})")]
    NonIncreasingTime { index: usize, duration: f64 },
    #[error("Waypoint {index} contains non-finite values")]
    NonFinite { index: usize },
}

/// Ordered waypoint sequence for one joint group
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Trajectory {
    /// Joint group the trajectory was planned for
    #[serde(default)]
    pub group: Option<String>,
    pub joints: Vec<JointSpec>,
    #[serde(default)]
    pub waypoints: Vec<Waypoint>,
}

impl Trajectory {
    pub fn new(group: impl Into<String>, joints: Vec<JointSpec>) -> Self {
        Self {
            group: Some(group.into()),
            joints,
            waypoints: Vec::new(),
        }
    }

    /// A trajectory with no joint group association
    pub fn ungrouped(joints: Vec<JointSpec>) -> Self {
        Self {
            group: None,
            joints,
            waypoints: Vec::new(),
        }
    }

    /// Same group and joints, no waypoints
    pub fn empty_like(&self) -> Self {
        Self {
            group: self.group.clone(),
            joints: self.joints.clone(),
            waypoints: Vec::new(),
        }
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    pub fn joint_bounds(&self) -> Vec<JointBounds> {
        self.joints.iter().map(|j| j.bounds).collect()
    }

    pub fn waypoint_count(&self) -> usize {
        self.waypoints.len()
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn waypoint(&self, index: usize) -> Result<&Waypoint, TrajectoryError> {
        let len = self.waypoints.len();
        self.waypoints
            .get(index)
            .ok_or(TrajectoryError::IndexOutOfRange { index, len })
    }

    pub fn waypoint_mut(&mut self, index: usize) -> Result<&mut Waypoint, TrajectoryError> {
        let len = self.waypoints.len();
        self.waypoints
            .get_mut(index)
            .ok_or(TrajectoryError::IndexOutOfRange { index, len })
    }

    pub fn first_state(&self) -> Option<&KinematicState> {
        self.waypoints.first().map(|w| &w.state)
    }

    pub fn last_state(&self) -> Option<&KinematicState> {
        self.waypoints.last().map(|w| &w.state)
    }

    /// Overwrite the kinematic state of a waypoint, keeping its timing
    pub fn set_waypoint_state(
        &mut self,
        index: usize,
        state: KinematicState,
    ) -> Result<(), TrajectoryError> {
        state.check_joint_count(self.joint_count())?;
        self.waypoint_mut(index)?.state = state;
        Ok(())
    }

    pub fn push_waypoint(
        &mut self,
        state: KinematicState,
        duration_from_previous: f64,
    ) -> Result<(), TrajectoryError> {
        state.check_joint_count(self.joint_count())?;
        self.waypoints.push(Waypoint {
            state,
            duration_from_previous,
        });
        Ok(())
    }

    pub fn duration_from_previous(&self, index: usize) -> Result<f64, TrajectoryError> {
        Ok(self.waypoint(index)?.duration_from_previous)
    }

    pub fn set_duration_from_previous(
        &mut self,
        index: usize,
        duration: f64,
    ) -> Result<(), TrajectoryError> {
        self.waypoint_mut(index)?.duration_from_previous = duration;
        Ok(())
    }

    /// Multiply every waypoint's duration from the previous one by `factor`
    pub fn scale_durations(&mut self, factor: f64) {
        for waypoint in self.waypoints.iter_mut().skip(1) {
            waypoint.duration_from_previous *= factor;
        }
    }

    pub fn total_duration(&self) -> f64 {
        self.waypoints
            .iter()
            .skip(1)
            .map(|w| w.duration_from_previous)
            .sum()
    }

    pub fn average_segment_duration(&self) -> f64 {
        if self.waypoints.len() < 2 {
            return 0.0;
        }
        self.total_duration() / (self.waypoints.len() - 1) as f64
    }

    /// Remove 2π jumps from continuous joints so their angles become a
    /// continuous signal.
    pub fn unwind(&mut self) {
        for (joint, spec) in self.joints.iter().enumerate() {
            if spec.kind != JointKind::Continuous {
                continue;
            }
            let Some(first) = self.waypoints.first() else {
                return;
            };
            let mut last_value = first.state.position[joint];
            let mut running_offset = 0.0;
            for waypoint in self.waypoints.iter_mut().skip(1) {
                let raw = waypoint.state.position[joint];
                if last_value > raw + PI {
                    running_offset += 2.0 * PI;
                } else if raw > last_value + PI {
                    running_offset -= 2.0 * PI;
                }
                last_value = raw;
                waypoint.state.position[joint] = raw + running_offset;
            }
        }
    }

    /// Fill omitted velocity/acceleration vectors with zeros and check that
    /// every waypoint matches the joint count.
    pub fn normalize(&mut self) -> Result<(), TrajectoryError> {
        for waypoint in &mut self.waypoints {
            waypoint.state.fill_missing_derivatives();
        }
        self.validate_shape()
    }

    pub fn validate_shape(&self) -> Result<(), TrajectoryError> {
        let joint_count = self.joint_count();
        for (index, waypoint) in self.waypoints.iter().enumerate() {
            waypoint.state.check_joint_count(joint_count)?;
            if !waypoint.state.is_finite() {
                return Err(TrajectoryError::NonFinite { index });
            }
        }
        Ok(())
    }

    /// Every waypoint after the first must come strictly later in time
    pub fn validate_timing(&self) -> Result<(), TrajectoryError> {
        for (index, waypoint) in self.waypoints.iter().enumerate().skip(1) {
            let duration = waypoint.duration_from_previous;
            if !(duration.is_finite() && duration > 0.0) {
                return Err(TrajectoryError::NonIncreasingTime { index, duration });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_joint(kind: JointKind) -> Trajectory {
        Trajectory::new("arm", vec![JointSpec::new("j1", kind, JointBounds::default())])
    }

    #[test]
    fn test_push_rejects_wrong_joint_count() {
        let mut traj = single_joint(JointKind::Revolute);
        let err = traj
            .push_waypoint(KinematicState::zeros(2), 0.1)
            .unwrap_err();
        assert_eq!(err, TrajectoryError::JointCountMismatch { expected: 1, found: 2 });
    }

    #[test]
    fn test_unwind_continuous_joint() {
        let mut traj = single_joint(JointKind::Continuous);
        for p in [3.0, -3.0, -2.5, 3.1] {
            traj.push_waypoint(KinematicState::at_rest(vec![p]), 0.1).unwrap();
        }
        traj.unwind();
        let positions: Vec<f64> = traj.waypoints().iter().map(|w| w.state.position[0]).collect();
        assert!((positions[1] - (-3.0 + 2.0 * PI)).abs() < 1e-12);
        assert!((positions[2] - (-2.5 + 2.0 * PI)).abs() < 1e-12);
        // -2.5 -> 3.1 wraps the other way, so the offset returns to zero
        assert!((positions[3] - 3.1).abs() < 1e-12);
        for pair in positions.windows(2) {
            assert!((pair[1] - pair[0]).abs() <= PI);
        }
    }

    #[test]
    fn test_unwind_leaves_bounded_joints_alone() {
        let mut traj = single_joint(JointKind::Revolute);
        for p in [3.0, -3.0] {
            traj.push_waypoint(KinematicState::at_rest(vec![p]), 0.1).unwrap();
        }
        traj.unwind();
        assert_eq!(traj.waypoint(1).unwrap().state.position[0], -3.0);
    }

    #[test]
    fn test_durations() {
        let mut traj = single_joint(JointKind::Prismatic);
        traj.push_waypoint(KinematicState::zeros(1), 0.0).unwrap();
        traj.push_waypoint(KinematicState::zeros(1), 0.5).unwrap();
        traj.push_waypoint(KinematicState::zeros(1), 1.5).unwrap();
        assert!((traj.total_duration() - 2.0).abs() < 1e-12);
        assert!((traj.average_segment_duration() - 1.0).abs() < 1e-12);
        traj.scale_durations(2.0);
        assert_eq!(traj.duration_from_previous(0).unwrap(), 0.0);
        assert_eq!(traj.duration_from_previous(2).unwrap(), 3.0);
        assert!(traj.validate_timing().is_ok());
        traj.set_duration_from_previous(1, 0.0).unwrap();
        assert!(matches!(
            traj.validate_timing(),
            Err(TrajectoryError::NonIncreasingTime { index: 1, .. })
        ));
    }

    #[test]
    fn test_normalize_fills_missing_derivatives() {
        let mut traj = single_joint(JointKind::Revolute);
        traj.waypoints.push(Waypoint {
            state: KinematicState {
                position: vec![0.25],
                velocity: vec![],
                acceleration: vec![],
            },
            duration_from_previous: 0.0,
        });
        traj.normalize().unwrap();
        assert_eq!(traj.waypoint(0).unwrap().state.velocity, vec![0.0]);
    }
}
