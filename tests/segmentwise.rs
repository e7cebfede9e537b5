// Integration tests for dense segment-wise generation and seam filtering

#[cfg(test)]
mod tests {
    use jerk_smoother::config::{SeamConfig, SeamMode, SegmentwiseConfig};
    use jerk_smoother::limits::{JointBounds, JointLimits, LimitDefaults};
    use jerk_smoother::motion::{SeamFilter, SegmentwiseSmoother, SmoothingError};
    use jerk_smoother::trajectory::{JointKind, JointSpec, KinematicState, Trajectory};

    fn spike(peak: f64) -> Trajectory {
        let mut trajectory = Trajectory::new(
            "arm",
            vec![JointSpec::new("j1", JointKind::Revolute, JointBounds::default())],
        );
        for position in [0.0, peak, 0.0, 0.0, 0.0] {
            trajectory
                .push_waypoint(KinematicState::at_rest(vec![position]), 0.001)
                .unwrap();
        }
        trajectory
    }

    fn smoother(config: SegmentwiseConfig) -> SegmentwiseSmoother {
        let seam = SeamFilter::new(SeamConfig::default()).unwrap();
        SegmentwiseSmoother::new(config, LimitDefaults::default(), seam).unwrap()
    }

    fn coarse() -> SegmentwiseConfig {
        SegmentwiseConfig {
            sample_time_step: 0.01,
            ..Default::default()
        }
    }

    #[test]
    fn test_detect_only_counts_spike() {
        let limits = JointLimits::uniform(1, 5.0, 10.0, 20.0).unwrap();
        let mut trajectory = spike(0.11);
        let report = SeamFilter::default().apply(&mut trajectory, &limits).unwrap();
        assert_eq!(report.failures, vec![1]);
        assert_eq!(report.coefficients, vec![20.0]);
        let peak = trajectory.waypoint(1).unwrap().state.position[0];
        assert!(peak < 0.01);
    }

    #[test]
    fn test_small_spike_passes() {
        let limits = JointLimits::uniform(1, 5.0, 10.0, 20.0).unwrap();
        let mut trajectory = spike(0.1);
        let report = SeamFilter::default().apply(&mut trajectory, &limits).unwrap();
        assert_eq!(report.total_failures(), 0);
    }

    #[test]
    fn test_adaptive_raises_coefficient() {
        let limits = JointLimits::uniform(1, 5.0, 10.0, 20.0).unwrap();
        let seam = SeamFilter::new(SeamConfig {
            mode: SeamMode::Adaptive,
            ..Default::default()
        })
        .unwrap();
        let mut trajectory = spike(0.11);
        let report = seam.apply_at(&mut trajectory, &limits, 0.001).unwrap();
        assert_eq!(report.failures, vec![0]);
        assert_eq!(report.coefficients, vec![30.0]);
    }

    #[test]
    fn test_seam_rejects_mismatched_limits() {
        let limits = JointLimits::uniform(2, 5.0, 10.0, 20.0).unwrap();
        let mut trajectory = spike(0.1);
        assert!(SeamFilter::default().apply(&mut trajectory, &limits).is_err());
    }

    #[test]
    fn test_multi_segment_output_is_uniformly_sampled() {
        let mut trajectory = Trajectory::new(
            "arm",
            vec![
                JointSpec::new("j1", JointKind::Revolute, JointBounds::default()),
                JointSpec::new("j2", JointKind::Revolute, JointBounds::default()),
            ],
        );
        trajectory.push_waypoint(KinematicState::zeros(2), 0.0).unwrap();
        trajectory
            .push_waypoint(KinematicState::at_rest(vec![0.1, -0.1]), 0.3)
            .unwrap();
        trajectory
            .push_waypoint(KinematicState::at_rest(vec![0.3, -0.1]), 0.4)
            .unwrap();
        let report = smoother(coarse())
            .apply_smoothing(&mut trajectory, 1.0, 1.0)
            .unwrap();

        assert_eq!(trajectory.group(), Some("arm"));
        assert_eq!(report.waypoint_count, trajectory.waypoint_count());
        assert_eq!(report.seam_failures.len(), 2);
        assert!(trajectory.waypoint_count() > 3);
        assert_eq!(trajectory.first_state().unwrap(), &KinematicState::zeros(2));
        assert!(
            trajectory
                .waypoints()
                .iter()
                .skip(1)
                .all(|w| w.duration_from_previous == 0.01)
        );
        // Segments run at least as long as requested
        assert!(report.duration_scale >= 1.0);
    }

    #[test]
    fn test_duration_cap_reports_unreached_segment() {
        let config = SegmentwiseConfig {
            sample_time_step: 0.01,
            max_duration_factor: 1.0,
        };
        let mut trajectory = Trajectory::new(
            "arm",
            vec![JointSpec::new("j1", JointKind::Revolute, JointBounds::default())],
        );
        trajectory.push_waypoint(KinematicState::zeros(1), 0.0).unwrap();
        // 0.1 rad needs about 0.67 s at jerk 20
        trajectory
            .push_waypoint(KinematicState::at_rest(vec![0.1]), 0.3)
            .unwrap();
        let before = trajectory.clone();
        let err = smoother(config)
            .apply_smoothing(&mut trajectory, 1.0, 1.0)
            .unwrap_err();
        assert!(matches!(err, SmoothingError::SegmentNotReached { segment: 1, .. }));
        assert_eq!(trajectory, before);
    }

    #[test]
    fn test_requires_group() {
        let mut trajectory = Trajectory::ungrouped(vec![JointSpec::new(
            "j1",
            JointKind::Revolute,
            JointBounds::default(),
        )]);
        trajectory.push_waypoint(KinematicState::zeros(1), 0.0).unwrap();
        trajectory
            .push_waypoint(KinematicState::at_rest(vec![0.1]), 1.0)
            .unwrap();
        assert_eq!(
            smoother(coarse()).apply_smoothing(&mut trajectory, 1.0, 1.0),
            Err(SmoothingError::MissingGroup)
        );
    }
}
