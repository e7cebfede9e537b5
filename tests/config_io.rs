// End-to-end tests: config and trajectory files through a smoothing strategy

#[cfg(test)]
mod tests {
    use jerk_smoother::config::{self, StrategyKind};
    use jerk_smoother::io;
    use jerk_smoother::motion::{ProfileStatus, Smoother, SmoothingStrategy};
    use jerk_smoother::trajectory::JointKind;

    const TRAJECTORY: &str = r#"{
        "joints": [
            { "name": "shoulder", "bounds": { "max_velocity": 2.0 } },
            { "name": "wrist" }
        ],
        "waypoints": [
            { "position": [0.0, 3.0] },
            { "position": [0.2, -3.0], "duration_from_previous": 2.0 },
            { "position": [0.4, -2.9], "duration_from_previous": 2.0 }
        ]
    }"#;

    const CONFIG: &str = r#"
        group = "arm"
        strategy = "segment_chained"

        [[joints]]
        name = "wrist"
        kind = "continuous"
        bounds = { max_velocity = 1.0 }
    "#;

    #[test]
    fn test_smooth_files_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("smoother.toml");
        let input_path = dir.path().join("input.json");
        let output_path = dir.path().join("output.json");
        std::fs::write(&config_path, CONFIG).unwrap();
        std::fs::write(&input_path, TRAJECTORY).unwrap();

        let config = config::load_config(&config_path).unwrap();
        let mut trajectory = io::load_trajectory(&input_path).unwrap();
        assert!(trajectory.group().is_none());
        config.apply_to(&mut trajectory);
        assert_eq!(trajectory.group(), Some("arm"));
        assert_eq!(trajectory.joints[1].kind, JointKind::Continuous);

        let mut strategy = SmoothingStrategy::from_config(&config).unwrap();
        assert_eq!(strategy.kind(), StrategyKind::SegmentChained);
        let report = strategy.smooth(&mut trajectory).unwrap();
        assert_eq!(report.final_status, Some(ProfileStatus::Finished));

        io::save_trajectory(&output_path, &trajectory).unwrap();
        let reloaded = io::load_trajectory(&output_path).unwrap();
        assert_eq!(reloaded.group(), Some("arm"));
        assert_eq!(reloaded.joints, trajectory.joints);
        assert_eq!(reloaded.waypoint_count(), 3);
        // The wrist crossed ±π and was unwound
        let wrist = reloaded.last_state().unwrap().position[1];
        assert!((wrist - (2.0 * std::f64::consts::PI - 2.9)).abs() < 1e-9);

        let csv_files = io::write_joint_csv(dir.path().join("csv"), "", &reloaded).unwrap();
        assert_eq!(csv_files.len(), 2);
        let shoulder = std::fs::read_to_string(&csv_files[0]).unwrap();
        assert_eq!(shoulder.lines().count(), 4);
    }

    #[test]
    fn test_streaming_strategy_requires_velocity_limits() {
        let mut config = config::parse_toml("group = \"arm\"\nstrategy = \"streaming\"").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("input.json");
        std::fs::write(&input_path, TRAJECTORY).unwrap();
        let mut trajectory = io::load_trajectory(&input_path).unwrap();
        config.apply_to(&mut trajectory);

        // "wrist" has no velocity bound in the file
        let mut strategy = SmoothingStrategy::from_config(&config).unwrap();
        assert!(strategy.smooth(&mut trajectory).is_err());

        config = config::parse_toml(CONFIG).unwrap();
        config.strategy = StrategyKind::Streaming;
        let mut trajectory = io::load_trajectory(&input_path).unwrap();
        config.apply_to(&mut trajectory);
        let report = SmoothingStrategy::from_config(&config)
            .unwrap()
            .smooth(&mut trajectory)
            .unwrap();
        assert_eq!(report.waypoint_count, 3);
        assert_eq!(trajectory.duration_from_previous(1).unwrap(), config.streaming.update_period);
    }
}
