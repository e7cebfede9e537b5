// jerk-smoother: jerk-limited smoothing of multi-joint motion commands

pub mod config;
pub mod io;
pub mod limits;
pub mod motion;
pub mod trajectory;

pub use config::{SmootherConfig, StrategyKind};
pub use limits::{JointBounds, JointLimits, LimitDefaults};
pub use motion::{
    BatchSmoother, SeamFilter, SegmentwiseSmoother, Smoother, SmoothingError, SmoothingReport,
    SmoothingStrategy, StreamingSmoother, StreamingState,
};
pub use trajectory::{JointKind, JointSpec, KinematicState, Trajectory, Waypoint};
