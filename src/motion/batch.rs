// src/motion/batch.rs - Whole-trajectory smoothing with duration extension
use tracing::{debug, error, info, warn};

use super::retry::try_retry;
use super::segment::SegmentCorrector;
use super::solver::{PolynomialSolver, ProfileSolver, ProfileStatus};
use super::{SmoothingError, SmoothingReport};
use crate::config::BatchConfig;
use crate::limits::{JointLimits, LimitDefaults};
use crate::trajectory::{KinematicState, Trajectory};

/// Working copy for one duration-extension attempt
#[derive(Debug, Clone)]
struct CorrectionAttempt {
    trajectory: Trajectory,
    /// Solver input for the next segment
    running: KinematicState,
    last_status: Option<ProfileStatus>,
    derated_segments: usize,
    collapsed_segments: usize,
}

impl CorrectionAttempt {
    fn new(seed: &Trajectory, duration_scale: f64) -> Result<Self, SmoothingError> {
        let mut trajectory = seed.clone();
        trajectory.scale_durations(duration_scale);
        let running = trajectory
            .first_state()
            .cloned()
            .ok_or(SmoothingError::TooFewWaypoints(0))?;
        Ok(Self {
            trajectory,
            running,
            last_status: None,
            derated_segments: 0,
            collapsed_segments: 0,
        })
    }

    fn succeeded(&self) -> bool {
        self.last_status.is_some_and(ProfileStatus::is_finished)
    }
}

/// Rewrites a planned trajectory, waypoint by waypoint, into a jerk-limited one
pub struct BatchSmoother {
    config: BatchConfig,
    defaults: LimitDefaults,
    keep_going: Option<Box<dyn Fn() -> bool + Send + Sync>>,
}

impl std::fmt::Debug for BatchSmoother {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchSmoother")
            .field("config", &self.config)
            .field("defaults", &self.defaults)
            .field("cancellable", &self.keep_going.is_some())
            .finish()
    }
}

impl BatchSmoother {
    pub fn new(config: BatchConfig, defaults: LimitDefaults) -> Self {
        Self {
            config,
            defaults,
            keep_going: None,
        }
    }

    /// Install a predicate polled at every waypoint and attempt; returning
    /// `false` aborts smoothing with [`SmoothingError::Cancelled`].
    pub fn with_keep_going(mut self, keep_going: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.keep_going = Some(Box::new(keep_going));
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Smooth `trajectory` in place with the built-in solver
    pub fn apply_smoothing(
        &self,
        trajectory: &mut Trajectory,
        velocity_scale: f64,
        acceleration_scale: f64,
    ) -> Result<SmoothingReport, SmoothingError> {
        let time_step = match trajectory.average_segment_duration() {
            d if d > 0.0 && d.is_finite() => d,
            _ => 1.0,
        };
        let mut solver = PolynomialSolver::new(trajectory.joint_count(), time_step)?;
        self.apply_smoothing_with(&mut solver, trajectory, velocity_scale, acceleration_scale)
    }

    pub fn apply_smoothing_with<S: ProfileSolver>(
        &self,
        solver: &mut S,
        trajectory: &mut Trajectory,
        velocity_scale: f64,
        acceleration_scale: f64,
    ) -> Result<SmoothingReport, SmoothingError> {
        if trajectory.group().is_none() {
            error!("The planner did not set the joint group the trajectory was computed for");
            return Err(SmoothingError::MissingGroup);
        }
        let waypoint_count = trajectory.waypoint_count();
        if waypoint_count < 2 {
            error!("Trajectory does not have enough points to smooth");
            return Err(SmoothingError::TooFewWaypoints(waypoint_count));
        }
        if solver.joint_count() != trajectory.joint_count() {
            return Err(SmoothingError::InvalidParameter {
                name: "solver joint count",
                value: solver.joint_count() as f64,
                reason: "must match the trajectory's joint count",
            });
        }
        trajectory.validate_shape()?;
        trajectory.validate_timing()?;
        let limits = JointLimits::for_batch(
            &trajectory.joint_bounds(),
            velocity_scale,
            acceleration_scale,
            &self.defaults,
        )?;

        // The solver cannot follow angles that jump by 2π
        trajectory.unwind();
        let seed = trajectory.clone();

        let factor = self.config.duration_extension_factor;
        let max_attempts = self.config.max_duration_extension_attempts;
        let outcome = try_retry(
            max_attempts,
            |index| {
                self.check_keep_going()?;
                let scale = factor.powi(index as i32);
                if index > 0 {
                    warn!(
                        "Extending trajectory duration to {:.3}x and retrying (attempt {}/{})",
                        scale,
                        index + 1,
                        max_attempts
                    );
                }
                let mut attempt = CorrectionAttempt::new(&seed, scale)?;
                self.run_pass(&mut *solver, &limits, &mut attempt)?;
                Ok::<_, SmoothingError>((scale, attempt))
            },
            |(_, attempt)| attempt.succeeded(),
        )?;

        let Some(outcome) = outcome else {
            return Err(SmoothingError::InvalidParameter {
                name: "max_duration_extension_attempts",
                value: 0.0,
                reason: "at least one attempt is required",
            });
        };
        let (duration_scale, attempt) = outcome.value;
        let report = SmoothingReport {
            attempts: outcome.attempts,
            duration_scale,
            final_status: attempt.last_status,
            seam_failures: Vec::new(),
            waypoint_count: attempt.trajectory.waypoint_count(),
            derated_segments: attempt.derated_segments,
            collapsed_segments: attempt.collapsed_segments,
        };
        *trajectory = attempt.trajectory;

        if outcome.accepted {
            info!(
                "Smoothed {} waypoints after {} attempt(s), duration scale {:.3}",
                report.waypoint_count, report.attempts, report.duration_scale
            );
            Ok(report)
        } else {
            error!(
                "Trajectory smoothing failed after {} attempts, last status {:?}",
                report.attempts, report.final_status
            );
            Err(SmoothingError::Infeasible {
                attempts: report.attempts,
                status: report.final_status,
            })
        }
    }

    /// Correct every segment of one attempt. A segment the solver rejects
    /// ends the pass with no final status.
    fn run_pass<S: ProfileSolver>(
        &self,
        solver: &mut S,
        limits: &JointLimits,
        attempt: &mut CorrectionAttempt,
    ) -> Result<(), SmoothingError> {
        let mut corrector = SegmentCorrector::new(solver, limits, &self.config);
        for index in 1..attempt.trajectory.waypoint_count() {
            self.check_keep_going()?;
            let target = attempt.trajectory.waypoint(index)?.state.clone();
            let duration = attempt.trajectory.duration_from_previous(index)?;
            match corrector.correct(&attempt.running, &target, duration) {
                Ok(segment) => {
                    if segment.derating_iterations > 0 {
                        attempt.derated_segments += 1;
                    }
                    if segment.collapsed {
                        attempt.collapsed_segments += 1;
                    }
                    attempt
                        .trajectory
                        .set_waypoint_state(index, segment.state.clone())?;
                    attempt.running = segment.state;
                    attempt.last_status = Some(segment.status);
                }
                Err(e) => {
                    debug!("Segment ending at waypoint {} is infeasible: {}", index, e);
                    attempt.last_status = None;
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    fn check_keep_going(&self) -> Result<(), SmoothingError> {
        match &self.keep_going {
            Some(keep_going) if !keep_going() => {
                warn!("Trajectory smoothing cancelled");
                Err(SmoothingError::Cancelled)
            }
            _ => Ok(()),
        }
    }
}
