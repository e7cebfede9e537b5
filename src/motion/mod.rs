// src/motion/mod.rs - Smoothing strategies and their shared error/report types

pub mod batch;
mod quintic;
pub mod retry;
pub mod seam;
pub mod segment;
pub mod segmentwise;
pub mod solver;
pub mod streaming;

pub use batch::BatchSmoother;
pub use seam::{LowPassFilter, SeamFilter, SeamReport, SignalFilter};
pub use segment::{SegmentCorrector, SegmentOutcome};
pub use segmentwise::SegmentwiseSmoother;
pub use solver::{
    PolynomialSolver, ProfileSolver, ProfileStatus, SolverError, SolverInput, SolverOutput,
};
pub use streaming::{StepOutcome, StepResult, StreamingSmoother, StreamingState};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::{SmootherConfig, StrategyKind};
use crate::limits::{LimitDefaults, LimitError};
use crate::trajectory::{KinematicState, Trajectory, TrajectoryError};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SmoothingError {
    #[error("Limit error: {0}")]
    Limits(#[from] LimitError),
    #[error("Trajectory error: {0}")]
    Trajectory(#[from] TrajectoryError),
    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),
    #[error("Trajectory has no joint group association")]
    MissingGroup,
    #[error("Trajectory needs at least two waypoints, found {0}")]
    TooFewWaypoints(usize),
    #[error("Invalid {name} ({value}): {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },
    #[error("No feasible trajectory after {attempts} attempt(s); last status {status:?}")]
    Infeasible {
        attempts: usize,
        status: Option<ProfileStatus>,
    },
    #[error("Smoothing cancelled")]
    Cancelled,
    #[error("Segment ending at waypoint {segment} not reached within {steps} samples")]
    SegmentNotReached { segment: usize, steps: usize },
}

/// Summary of one smoothing run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SmoothingReport {
    pub attempts: usize,
    /// Factor applied to the input durations by the successful attempt
    pub duration_scale: f64,
    pub final_status: Option<ProfileStatus>,
    /// Seam filter bound violations per joint (segment-wise strategy only)
    #[serde(default)]
    pub seam_failures: Vec<usize>,
    pub waypoint_count: usize,
    #[serde(default)]
    pub derated_segments: usize,
    #[serde(default)]
    pub collapsed_segments: usize,
}

/// Rewrites a whole trajectory into a jerk-limited one
pub trait Smoother {
    fn smooth(&mut self, trajectory: &mut Trajectory) -> Result<SmoothingReport, SmoothingError>;
}

/// Feeds each waypoint of a trajectory to the streaming smoother as one
/// control-cycle target
#[derive(Debug, Clone)]
pub struct StreamingReplay {
    update_period: f64,
    defaults: LimitDefaults,
}

impl StreamingReplay {
    pub fn new(update_period: f64, defaults: LimitDefaults) -> Self {
        Self {
            update_period,
            defaults,
        }
    }
}

impl Smoother for StreamingReplay {
    fn smooth(&mut self, trajectory: &mut Trajectory) -> Result<SmoothingReport, SmoothingError> {
        let Some(first) = trajectory.first_state().cloned() else {
            return Err(SmoothingError::TooFewWaypoints(0));
        };
        trajectory.validate_shape()?;
        let (smoother, _) = StreamingSmoother::initialize(
            &trajectory.joint_bounds(),
            trajectory.joint_count(),
            self.update_period,
            &self.defaults,
        )?;
        let mut state = smoother.reset(first)?;
        let mut held = 0;
        let mut final_status = None;
        for index in 1..trajectory.waypoint_count() {
            let command: KinematicState = trajectory.waypoint(index)?.state.clone();
            let result = smoother.step(state, command);
            state = result.state;
            match result.outcome {
                StepOutcome::Smoothed(status) => final_status = Some(status),
                StepOutcome::Held(_) => {
                    held += 1;
                    final_status = None;
                }
            }
            trajectory.set_waypoint_state(index, result.command)?;
            trajectory.set_duration_from_previous(index, self.update_period)?;
        }
        info!(
            "Streamed {} waypoints, {} held",
            trajectory.waypoint_count(),
            held
        );
        Ok(SmoothingReport {
            attempts: 1,
            duration_scale: 1.0,
            final_status,
            seam_failures: Vec::new(),
            waypoint_count: trajectory.waypoint_count(),
            derated_segments: 0,
            collapsed_segments: 0,
        })
    }
}

/// Closed set of smoothing strategies, selected by value
#[derive(Debug)]
pub enum SmoothingStrategy {
    Streaming(StreamingReplay),
    SegmentChained {
        smoother: BatchSmoother,
        velocity_scale: f64,
        acceleration_scale: f64,
    },
    Segmentwise {
        smoother: SegmentwiseSmoother,
        velocity_scale: f64,
        acceleration_scale: f64,
    },
}

impl SmoothingStrategy {
    pub fn from_config(config: &SmootherConfig) -> Result<Self, SmoothingError> {
        let velocity_scale = config.batch.velocity_scale;
        let acceleration_scale = config.batch.acceleration_scale;
        Ok(match config.strategy {
            StrategyKind::Streaming => SmoothingStrategy::Streaming(StreamingReplay::new(
                config.streaming.update_period,
                config.limits.clone(),
            )),
            StrategyKind::SegmentChained => SmoothingStrategy::SegmentChained {
                smoother: BatchSmoother::new(config.batch.clone(), config.limits.clone()),
                velocity_scale,
                acceleration_scale,
            },
            StrategyKind::Segmentwise => SmoothingStrategy::Segmentwise {
                smoother: SegmentwiseSmoother::new(
                    config.segmentwise.clone(),
                    config.limits.clone(),
                    SeamFilter::new(config.seam.clone())?,
                )?,
                velocity_scale,
                acceleration_scale,
            },
        })
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            SmoothingStrategy::Streaming(_) => StrategyKind::Streaming,
            SmoothingStrategy::SegmentChained { .. } => StrategyKind::SegmentChained,
            SmoothingStrategy::Segmentwise { .. } => StrategyKind::Segmentwise,
        }
    }
}

impl Smoother for SmoothingStrategy {
    fn smooth(&mut self, trajectory: &mut Trajectory) -> Result<SmoothingReport, SmoothingError> {
        match self {
            SmoothingStrategy::Streaming(replay) => replay.smooth(trajectory),
            SmoothingStrategy::SegmentChained {
                smoother,
                velocity_scale,
                acceleration_scale,
            } => smoother.apply_smoothing(trajectory, *velocity_scale, *acceleration_scale),
            SmoothingStrategy::Segmentwise {
                smoother,
                velocity_scale,
                acceleration_scale,
            } => smoother.apply_smoothing(trajectory, *velocity_scale, *acceleration_scale),
        }
    }
}
