// src/main.rs - Command line entry point: smooth a trajectory file
use clap::Parser;
use std::path::PathBuf;

use jerk_smoother::config::{self, SmootherConfig, StrategyKind};
use jerk_smoother::io;
use jerk_smoother::motion::{Smoother, SmoothingStrategy};

/// Jerk-limited trajectory smoother
#[derive(Parser, Debug)]
#[command(name = "jerk-smoother", about = "Rewrite a joint trajectory so it respects velocity, acceleration and jerk limits.")]
struct Cli {
    /// Path to a TOML config file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input trajectory (JSON)
    #[arg(short, long)]
    input: PathBuf,

    /// Where to write the smoothed trajectory (JSON)
    #[arg(short, long)]
    output: PathBuf,

    /// Override the configured strategy (streaming, segment_chained, segmentwise)
    #[arg(long)]
    strategy: Option<StrategyKind>,

    /// Also write per-joint CSV files into this directory
    #[arg(long)]
    csv_dir: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            config::load_config(path)?
        }
        None => SmootherConfig::default(),
    };
    if let Some(strategy) = cli.strategy {
        config.strategy = strategy;
    }

    let mut trajectory = io::load_trajectory(&cli.input)?;
    config.apply_to(&mut trajectory);
    tracing::info!(
        "Smoothing {} waypoints ({} joints) with the {:?} strategy",
        trajectory.waypoint_count(),
        trajectory.joint_count(),
        config.strategy
    );

    let mut strategy = SmoothingStrategy::from_config(&config)?;
    let result = strategy.smooth(&mut trajectory);

    // Best-effort output is still useful for analysis when smoothing fails
    io::save_trajectory(&cli.output, &trajectory)?;
    if let Some(dir) = &cli.csv_dir {
        let written = io::write_joint_csv(dir, "smoothed_", &trajectory)?;
        tracing::info!("Wrote {} CSV files to {}", written.len(), dir.display());
    }

    match result {
        Ok(report) => {
            tracing::info!(
                "Done: {} waypoints, {} attempt(s), duration scale {:.3}, final status {:?}",
                report.waypoint_count,
                report.attempts,
                report.duration_scale,
                report.final_status
            );
            if !report.seam_failures.is_empty() {
                tracing::info!("Seam failures per joint: {:?}", report.seam_failures);
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Smoothing failed: {}", e);
            Err(e.into())
        }
    }
}
