// src/io.rs - Trajectory files: JSON in/out and per-joint CSV export
use csv::Writer;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::trajectory::{Trajectory, TrajectoryError};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Invalid trajectory: {0}")]
    Trajectory(#[from] TrajectoryError),
}

/// Read a trajectory from JSON. Omitted velocities and accelerations are
/// filled with zeros.
pub fn load_trajectory(path: impl AsRef<Path>) -> Result<Trajectory, IoError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        tracing::error!("Failed to open trajectory '{}': {}", path.display(), e);
        e
    })?;
    let mut trajectory: Trajectory = serde_json::from_reader(BufReader::new(file))?;
    trajectory.normalize()?;
    tracing::debug!(
        "Loaded {} waypoints for {} joints from {}",
        trajectory.waypoint_count(),
        trajectory.joint_count(),
        path.display()
    );
    Ok(trajectory)
}

pub fn save_trajectory(path: impl AsRef<Path>, trajectory: &Trajectory) -> Result<(), IoError> {
    let file = File::create(path.as_ref())?;
    serde_json::to_writer_pretty(BufWriter::new(file), trajectory)?;
    Ok(())
}

/// Write one `<prefix><joint name>.csv` per joint with time, position,
/// velocity and acceleration columns. Returns the written paths.
pub fn write_joint_csv(
    dir: impl AsRef<Path>,
    prefix: &str,
    trajectory: &Trajectory,
) -> Result<Vec<PathBuf>, IoError> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(trajectory.joint_count());
    for (joint, spec) in trajectory.joints.iter().enumerate() {
        let path = dir.join(format!("{}{}.csv", prefix, spec.name));
        let mut wtr = Writer::from_path(&path)?;
        wtr.write_record(["time", "position", "velocity", "acceleration"])?;
        let mut time: f64 = 0.0;
        for (index, waypoint) in trajectory.waypoints().iter().enumerate() {
            if index > 0 {
                time += waypoint.duration_from_previous;
            }
            wtr.write_record(&[
                time.to_string(),
                waypoint.state.position[joint].to_string(),
                waypoint.state.velocity[joint].to_string(),
                waypoint.state.acceleration[joint].to_string(),
            ])?;
        }
        wtr.flush()?;
        written.push(path);
    }
    Ok(written)
}
