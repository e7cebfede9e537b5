// src/motion/segmentwise.rs - Dense per-segment generation followed by seam filtering
use tracing::{debug, error, info, warn};

use super::seam::SeamFilter;
use super::solver::{PolynomialSolver, ProfileSolver, ProfileStatus, SolverInput};
use super::{SmoothingError, SmoothingReport};
use crate::config::SegmentwiseConfig;
use crate::limits::{JointLimits, LimitDefaults};
use crate::trajectory::{KinematicState, Trajectory};

/// Generates every segment on its own at a fixed sample time, then smooths
/// the seams between segments with a low-pass filter.
pub struct SegmentwiseSmoother {
    config: SegmentwiseConfig,
    defaults: LimitDefaults,
    seam: SeamFilter,
    keep_going: Option<Box<dyn Fn() -> bool + Send + Sync>>,
}

impl std::fmt::Debug for SegmentwiseSmoother {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentwiseSmoother")
            .field("config", &self.config)
            .field("defaults", &self.defaults)
            .field("seam", &self.seam)
            .field("cancellable", &self.keep_going.is_some())
            .finish()
    }
}

impl SegmentwiseSmoother {
    pub fn new(
        config: SegmentwiseConfig,
        defaults: LimitDefaults,
        seam: SeamFilter,
    ) -> Result<Self, SmoothingError> {
        if !(config.sample_time_step.is_finite() && config.sample_time_step > 0.0) {
            return Err(SmoothingError::InvalidParameter {
                name: "sample time step",
                value: config.sample_time_step,
                reason: "must be positive",
            });
        }
        if !(config.max_duration_factor >= 1.0) {
            return Err(SmoothingError::InvalidParameter {
                name: "max duration factor",
                value: config.max_duration_factor,
                reason: "must be at least 1",
            });
        }
        Ok(Self {
            config,
            defaults,
            seam,
            keep_going: None,
        })
    }

    /// Install a predicate polled before every segment; returning `false`
    /// aborts with [`SmoothingError::Cancelled`] and leaves the input as it was.
    pub fn with_keep_going(mut self, keep_going: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.keep_going = Some(Box::new(keep_going));
        self
    }

    /// Replace `trajectory` with densely sampled, seam-filtered output.
    /// On error the trajectory keeps its input waypoints, unwound.
    pub fn apply_smoothing(
        &self,
        trajectory: &mut Trajectory,
        velocity_scale: f64,
        acceleration_scale: f64,
    ) -> Result<SmoothingReport, SmoothingError> {
        if trajectory.group().is_none() {
            error!("The planner did not set the joint group the trajectory was computed for");
            return Err(SmoothingError::MissingGroup);
        }
        let input_count = trajectory.waypoint_count();
        if input_count < 2 {
            error!("Trajectory does not have enough points to smooth");
            return Err(SmoothingError::TooFewWaypoints(input_count));
        }
        trajectory.validate_shape()?;
        trajectory.validate_timing()?;
        let limits = JointLimits::for_batch(
            &trajectory.joint_bounds(),
            velocity_scale,
            acceleration_scale,
            &self.defaults,
        )?;
        trajectory.unwind();

        let dt = self.config.sample_time_step;
        let mut solver = PolynomialSolver::new(trajectory.joint_count(), dt)?;
        let mut output = trajectory.empty_like();
        let first = trajectory.waypoint(0)?;
        output.push_waypoint(first.state.clone(), first.duration_from_previous)?;
        let mut running = first.state.clone();

        for index in 1..input_count {
            self.check_keep_going()?;
            let target = trajectory.waypoint(index)?.state.clone();
            let desired = trajectory.duration_from_previous(index)?;
            running = self.generate_segment(
                &mut solver,
                &limits,
                running,
                &target,
                desired,
                index,
                &mut output,
            )?;
        }

        let seam_report = self.seam.apply_at(&mut output, &limits, dt)?;
        let duration_scale = output.total_duration() / trajectory.total_duration();
        info!(
            "Segment-wise smoothing: {} input waypoints -> {} samples",
            input_count,
            output.waypoint_count()
        );

        let report = SmoothingReport {
            attempts: 1,
            duration_scale,
            final_status: Some(ProfileStatus::Finished),
            seam_failures: seam_report.failures,
            waypoint_count: output.waypoint_count(),
            derated_segments: 0,
            collapsed_segments: 0,
        };
        *trajectory = output;
        Ok(report)
    }

    fn check_keep_going(&self) -> Result<(), SmoothingError> {
        match &self.keep_going {
            Some(keep_going) if !keep_going() => {
                warn!("Segment-wise smoothing cancelled");
                Err(SmoothingError::Cancelled)
            }
            _ => Ok(()),
        }
    }

    /// Step the solver from `current` until it reports the target reached,
    /// appending every sample to `output`. Returns the final state.
    #[allow(clippy::too_many_arguments)]
    fn generate_segment<S: ProfileSolver>(
        &self,
        solver: &mut S,
        limits: &JointLimits,
        mut current: KinematicState,
        target: &KinematicState,
        desired: f64,
        index: usize,
        output: &mut Trajectory,
    ) -> Result<KinematicState, SmoothingError> {
        let dt = solver.time_step();
        let max_steps = ((self.config.max_duration_factor * desired / dt).ceil() as usize).max(1);
        for step in 0..max_steps {
            let remaining = desired - step as f64 * dt;
            let mut input = SolverInput::new(&current, target, limits);
            if remaining > 0.0 {
                input = input.with_minimum_duration(remaining);
            }
            let sample = solver.update(&input).map_err(|e| {
                error!("Segment ending at waypoint {} could not be generated: {}", index, e);
                e
            })?;
            output.push_waypoint(sample.state.clone(), dt)?;
            current = sample.state;
            if sample.status.is_finished() {
                debug!("Segment {} reached after {} samples", index, step + 1);
                return Ok(current);
            }
        }
        error!(
            "Segment ending at waypoint {} not reached within {} samples",
            index, max_steps
        );
        Err(SmoothingError::SegmentNotReached {
            segment: index,
            steps: max_steps,
        })
    }
}
