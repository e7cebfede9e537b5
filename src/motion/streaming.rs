// src/motion/streaming.rs - Per-cycle jerk-limited smoothing of command streams
use tracing::{debug, error, trace};

use super::SmoothingError;
use super::solver::{PolynomialSolver, ProfileSolver, ProfileStatus, SolverError, SolverInput};
use crate::limits::{JointBounds, JointLimits, LimitDefaults};
use crate::trajectory::KinematicState;

/// Feedback carried from one control cycle to the next.
///
/// Owned by the caller; one per control session.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamingState {
    /// Solver input for the next cycle when there is no valid seed
    pub current: KinematicState,
    /// Output of the last successful cycle
    pub last_output: KinematicState,
    /// Whether `last_output` may seed the next cycle
    pub valid_seed: bool,
}

impl StreamingState {
    pub fn new(current: KinematicState) -> Self {
        Self {
            last_output: current.clone(),
            current,
            valid_seed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The command was replaced by the solver's next state
    Smoothed(ProfileStatus),
    /// The solver failed and the command passed through unmodified
    Held(SolverError),
}

impl StepOutcome {
    pub fn is_smoothed(&self) -> bool {
        matches!(self, StepOutcome::Smoothed(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub state: StreamingState,
    /// The state to send downstream this cycle
    pub command: KinematicState,
    pub outcome: StepOutcome,
}

/// Closed-loop smoother fed one target per control cycle
#[derive(Debug, Clone)]
pub struct StreamingSmoother<S: ProfileSolver = PolynomialSolver> {
    solver: S,
    limits: JointLimits,
}

impl StreamingSmoother<PolynomialSolver> {
    /// Set up a smoother for `joint_count` joints stepping every `time_step`
    /// seconds, starting from an all-zero state.
    pub fn initialize(
        bounds: &[JointBounds],
        joint_count: usize,
        time_step: f64,
        defaults: &LimitDefaults,
    ) -> Result<(Self, StreamingState), SmoothingError> {
        let solver = PolynomialSolver::new(joint_count, time_step)?;
        Self::with_solver(solver, bounds, defaults)
    }
}

impl<S: ProfileSolver> StreamingSmoother<S> {
    pub fn with_solver(
        solver: S,
        bounds: &[JointBounds],
        defaults: &LimitDefaults,
    ) -> Result<(Self, StreamingState), SmoothingError> {
        if bounds.len() != solver.joint_count() {
            return Err(SmoothingError::InvalidParameter {
                name: "joint bounds count",
                value: bounds.len() as f64,
                reason: "must match the solver's joint count",
            });
        }
        let limits = JointLimits::for_streaming(bounds, defaults)?;
        debug!(
            "Streaming smoother ready: {} joints, time step {} s",
            solver.joint_count(),
            solver.time_step()
        );
        let state = StreamingState::new(KinematicState::zeros(solver.joint_count()));
        Ok((Self { solver, limits }, state))
    }

    pub fn limits(&self) -> &JointLimits {
        &self.limits
    }

    pub fn time_step(&self) -> f64 {
        self.solver.time_step()
    }

    pub fn joint_count(&self) -> usize {
        self.solver.joint_count()
    }

    /// Advance one control cycle toward `command`'s positions.
    ///
    /// Never fails: when the solver rejects the cycle the command is passed
    /// through as given and the next cycle restarts from the last reset state.
    pub fn step(&self, mut state: StreamingState, command: KinematicState) -> StepResult {
        if state.valid_seed {
            state.current = state.last_output.clone();
        }
        let target = KinematicState::at_rest(command.position.clone());
        let input = SolverInput::new(&state.current, &target, &self.limits);

        match self.solver.update(&input) {
            Ok(output) => {
                trace!(
                    "Streaming step {:?}, remaining {:.4} s",
                    output.status,
                    output.duration
                );
                state.last_output = output.state.clone();
                state.valid_seed = true;
                StepResult {
                    state,
                    command: output.state,
                    outcome: StepOutcome::Smoothed(output.status),
                }
            }
            Err(e) => {
                error!("Jerk-limited smoothing failed: {}", e);
                state.valid_seed = false;
                StepResult {
                    state,
                    command,
                    outcome: StepOutcome::Held(e),
                }
            }
        }
    }

    /// Re-synchronize with an externally known state
    pub fn reset(&self, current: KinematicState) -> Result<StreamingState, SmoothingError> {
        current.check_joint_count(self.joint_count())?;
        if !current.is_finite() {
            return Err(SmoothingError::InvalidParameter {
                name: "reset state",
                value: f64::NAN,
                reason: "must be finite",
            });
        }
        Ok(StreamingState::new(current))
    }
}
