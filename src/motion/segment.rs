// src/motion/segment.rs - Single-segment correction with velocity de-rating
use tracing::{debug, warn};

use super::retry::{derating_bound, retry};
use super::solver::{ProfileSolver, ProfileStatus, SolverError, SolverInput, SolverOutput};
use crate::config::BatchConfig;
use crate::limits::JointLimits;
use crate::trajectory::KinematicState;

/// What happened to one waypoint-to-waypoint segment
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentOutcome {
    /// Corrected state for the segment's target waypoint; also the solver
    /// input for the following segment
    pub state: KinematicState,
    pub status: ProfileStatus,
    /// De-rating steps taken, counting those the solver rejected
    pub derating_iterations: usize,
    /// The target sat on top of the previous waypoint and was merged into it
    pub collapsed: bool,
}

/// Drives the solver across one segment of a batch trajectory.
///
/// When the jerk-limited output lags the waypoint's commanded velocity the
/// target velocity is scaled down step by step until the lag disappears.
pub struct SegmentCorrector<'a, S: ProfileSolver> {
    solver: &'a mut S,
    limits: &'a JointLimits,
    config: &'a BatchConfig,
}

impl<'a, S: ProfileSolver> SegmentCorrector<'a, S> {
    pub fn new(solver: &'a mut S, limits: &'a JointLimits, config: &'a BatchConfig) -> Self {
        Self {
            solver,
            limits,
            config,
        }
    }

    /// Correct the segment from `current` toward `target` lasting `duration`
    /// seconds. `current` is the corrected state of the previous waypoint.
    pub fn correct(
        &mut self,
        current: &KinematicState,
        target: &KinematicState,
        duration: f64,
    ) -> Result<SegmentOutcome, SolverError> {
        self.solver.set_time_step(duration)?;
        let first = self
            .solver
            .update(&SolverInput::new(current, target, self.limits))?;

        let target_speed = velocity_norm(&target.velocity);
        let lagging = lagging_joint(&first.state.velocity, &target.velocity);
        let Some(joint) = lagging.filter(|_| target_speed > self.config.minimum_velocity_magnitude)
        else {
            return Ok(SegmentOutcome {
                status: first.status,
                state: first.state,
                derating_iterations: 0,
                collapsed: false,
            });
        };

        if current.position_distance(target) <= self.config.identical_position_epsilon {
            debug!("Skipping correction of a repeated waypoint");
            return Ok(SegmentOutcome {
                state: current.clone(),
                status: ProfileStatus::Finished,
                derating_iterations: 0,
                collapsed: true,
            });
        }

        debug!(
            "Joint {} lags its target velocity; de-rating from {:.4}",
            joint, target_speed
        );
        self.derate(current, target, duration, first)
    }

    fn derate(
        &self,
        current: &KinematicState,
        target: &KinematicState,
        duration: f64,
        first: SolverOutput,
    ) -> Result<SegmentOutcome, SolverError> {
        let factor = self.config.velocity_derating_factor;
        let floor = self.config.minimum_velocity_magnitude;
        let max_iterations = derating_bound(velocity_norm(&target.velocity), floor, factor);

        let mut working = target.clone();
        let mut last_good = first;
        let mut accepted = 0;
        let mut last_error = None;
        // A rejected target counts as still lagging; scaling continues
        let outcome = retry(
            max_iterations,
            |_| {
                for joint in 0..working.joint_count() {
                    working.velocity[joint] *= factor;
                    // Position targets stay untouched so the waypoint is still reached
                    working.acceleration[joint] =
                        (working.velocity[joint] - last_good.state.velocity[joint]) / duration;
                }
                let speed = velocity_norm(&working.velocity);
                match self
                    .solver
                    .update(&SolverInput::new(current, &working, self.limits))
                {
                    Ok(output) => {
                        accepted += 1;
                        let lagging =
                            lagging_joint(&output.state.velocity, &working.velocity).is_some();
                        last_good = output;
                        !lagging || speed <= floor
                    }
                    Err(e) => {
                        debug!("Solver rejected de-rated target at speed {:.4}: {}", speed, e);
                        last_error = Some(e);
                        speed <= floor
                    }
                }
            },
            |done| *done,
        );
        let iterations = outcome.map_or(0, |o| o.attempts);
        if accepted == 0 {
            if let Some(e) = last_error {
                warn!(
                    "Solver rejected every de-rated target ({} iterations): {}",
                    iterations, e
                );
                return Err(e);
            }
        }
        Ok(SegmentOutcome {
            status: last_good.status,
            state: last_good.state,
            derating_iterations: iterations,
            collapsed: false,
        })
    }
}

/// First joint whose output velocity falls short of a nonzero target velocity
fn lagging_joint(output_velocity: &[f64], target_velocity: &[f64]) -> Option<usize> {
    output_velocity
        .iter()
        .zip(target_velocity)
        .position(|(&out, &target)| target != 0.0 && out / target < 1.0)
}

fn velocity_norm(velocity: &[f64]) -> f64 {
    velocity.iter().map(|v| v * v).sum::<f64>().sqrt()
}
