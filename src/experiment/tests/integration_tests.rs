//! Integration tests for the full experiment pipeline.
//!
//! - Detecting a real effect between differently displayed arms
//! - Event stream consistency with the counters
//! - Bounded overshoot and capacity under stop/restart
//! - Seeded determinism

#[cfg(test)]
mod tests {
    use crate::experiment::{
        seeded_rng, Attributes, DisplayOdds, DriverConfig, FixedDisplay, ParameterSet,
        RandomizedDisplay, SignificanceMode, SimulationDriver, SimulationEvent,
    };
    use crate::types::{Arm, Snapshot};

    fn run_turbo_to_completion<D, S>(driver: &mut SimulationDriver<rand::rngs::StdRng, D, S>)
    where
        D: crate::experiment::AttributeSource,
        S: crate::experiment::EventSink,
    {
        assert!(driver.start());
        let mut guard = 0;
        while !driver.run_chunk().finished {
            guard += 1;
            assert!(guard < 10_000, "turbo run never finished");
        }
    }

    // =========================================================================
    // Effect detection
    // =========================================================================

    #[test]
    fn test_detects_color_effect() {
        // Everyone cares about colour; A always matches, B never does
        let params = ParameterSet {
            color_preference: 1.0,
            color_impact: 0.5,
            center_preference: 0.0,
            spelling_preference: 0.0,
            turbo_mode: true,
            ..Default::default()
        };
        let display = RandomizedDisplay::new(
            DisplayOdds {
                primary_color_probability: 1.0,
                ..Default::default()
            },
            DisplayOdds {
                primary_color_probability: 0.0,
                ..Default::default()
            },
        )
        .unwrap();

        let mut driver = SimulationDriver::new(params, DriverConfig::default(), seeded_rng(Some(2024)))
            .unwrap()
            .with_display(display);
        run_turbo_to_completion(&mut driver);

        let snap = driver.snapshot();
        assert_eq!(snap.arm_a.impressions, 1793);
        assert_eq!(snap.arm_b.impressions, 1793);
        // p_A = 0.45, p_B = 0.30
        assert!((snap.arm_a.current_probability - 0.45).abs() < 1e-9);
        assert!((snap.arm_b.current_probability - 0.30).abs() < 1e-9);

        let verdict = driver.verdict();
        assert!(verdict.has_enough_data);
        assert!(verdict.significant);
        let lift = verdict.lift.unwrap();
        assert!(lift > 35.0 && lift < 65.0, "lift = {lift}");
        assert!(verdict.p_value.unwrap() < 0.001);

        // B against A is a loss
        let reverse = driver.verdict_for(Arm::B);
        assert!(reverse.lift.unwrap() < 0.0);
        assert!(reverse.significant);
    }

    #[test]
    fn test_identical_arms_show_small_lift() {
        let params = ParameterSet {
            turbo_mode: true,
            ..Default::default()
        };
        let mut driver =
            SimulationDriver::new(params, DriverConfig::default(), seeded_rng(Some(99))).unwrap();
        run_turbo_to_completion(&mut driver);

        let verdict = driver.verdict();
        assert!(verdict.has_enough_data);
        assert!(verdict.lift.unwrap().abs() < 20.0);
    }

    #[test]
    fn test_fixed95_mode_at_high_confidence() {
        let params = ParameterSet {
            confidence_level: 0.99,
            color_preference: 1.0,
            color_impact: 0.5,
            turbo_mode: true,
            ..Default::default()
        };
        let config = DriverConfig {
            significance_mode: SignificanceMode::Fixed95,
            ..Default::default()
        };
        let display = FixedDisplay::new(Attributes::FAVORABLE, Attributes::UNFAVORABLE);
        let mut driver = SimulationDriver::new(params, config, seeded_rng(Some(5)))
            .unwrap()
            .with_display(display);
        run_turbo_to_completion(&mut driver);

        let verdict = driver.verdict();
        assert!(verdict.significant);
        assert!(verdict.z_score.unwrap() > 1.96);
    }

    // =========================================================================
    // Events
    // =========================================================================

    #[test]
    fn test_live_events_match_counters() {
        let params = ParameterSet {
            base_click_rate: 0.4,
            minimum_detectable_effect: 0.34,
            ..Default::default()
        };
        let mut driver = SimulationDriver::new(params, DriverConfig::default(), seeded_rng(Some(8)))
            .unwrap()
            .with_sink(Vec::new());
        driver.start();
        while driver.tick().is_some() {}

        let snap = driver.snapshot();
        let events = driver.sink();

        let impressions = events
            .iter()
            .filter(|e| matches!(e, SimulationEvent::Impression { .. }))
            .count() as u64;
        assert_eq!(impressions, snap.run.total_impressions);

        for arm in Arm::ALL {
            let clicks: Vec<u64> = events
                .iter()
                .filter_map(|e| match e {
                    SimulationEvent::Click { arm: a, count } if *a == arm => Some(*count),
                    _ => None,
                })
                .collect();
            assert_eq!(clicks.len() as u64, snap.arm(arm).clicks);
            // Counts increase by one per click
            assert!(clicks.iter().enumerate().all(|(i, c)| *c == i as u64 + 1));
        }

        assert_eq!(
            events.last(),
            Some(&SimulationEvent::SampleReached {
                total_impressions: 200
            })
        );
    }

    // =========================================================================
    // Overshoot and capacity
    // =========================================================================

    #[test]
    fn test_stop_restart_never_overshoots() {
        let params = ParameterSet {
            turbo_mode: true,
            turbo_speed_multiplier: 37,
            ..Default::default()
        };
        let mut driver =
            SimulationDriver::new(params, DriverConfig::default(), seeded_rng(Some(13))).unwrap();

        let mut restarts = 0;
        while !driver.run_state().sample_size_reached {
            assert!(driver.start());
            driver.run_chunk();
            driver.run_chunk();
            driver.stop();
            restarts += 1;
            assert!(restarts < 1000);
        }

        let snap: Snapshot = driver.snapshot();
        assert_eq!(snap.run.total_impressions, snap.run.required_population_size);
        assert!(snap.arm_a.impressions <= snap.run.capacity_per_arm());
        assert!(snap.arm_b.impressions <= snap.run.capacity_per_arm());
        assert_eq!(snap.run.turbo_progress, 100);
    }

    #[test]
    fn test_arms_fill_exactly_to_capacity() {
        let params = ParameterSet {
            confidence_level: 0.90,
            base_click_rate: 0.63,
            minimum_detectable_effect: 0.08,
            turbo_mode: true,
            ..Default::default()
        };
        let mut driver =
            SimulationDriver::new(params, DriverConfig::default(), seeded_rng(Some(21))).unwrap();
        let required = driver.run_state().required_population_size;
        run_turbo_to_completion(&mut driver);

        let snap = driver.snapshot();
        assert_eq!(snap.run.total_impressions, required);
        assert_eq!(snap.arm_a.impressions + snap.arm_b.impressions, required);
        let cap = snap.run.capacity_per_arm();
        assert_eq!(cap, 500);
        assert_eq!(snap.arm_a.impressions, cap);
        assert_eq!(snap.arm_b.impressions, cap);
    }

    // =========================================================================
    // Determinism
    // =========================================================================

    #[test]
    fn test_same_seed_same_outcome() {
        let params = ParameterSet {
            color_impact: 0.2,
            spelling_impact: -0.1,
            turbo_mode: true,
            ..Default::default()
        };
        let run = |seed| {
            let mut driver =
                SimulationDriver::new(params.clone(), DriverConfig::default(), seeded_rng(Some(seed)))
                    .unwrap();
            run_turbo_to_completion(&mut driver);
            driver.snapshot()
        };

        assert_eq!(run(77), run(77));
        assert_ne!(run(77), run(78));
    }

    #[test]
    fn test_progress_message_after_run() {
        let params = ParameterSet {
            confidence_level: 0.99,
            base_click_rate: 0.4,
            minimum_detectable_effect: 0.2,
            turbo_mode: true,
            ..Default::default()
        };
        let mut driver =
            SimulationDriver::new(params, DriverConfig::default(), seeded_rng(Some(1))).unwrap();
        run_turbo_to_completion(&mut driver);
        assert_eq!(
            driver.snapshot().progress_message(),
            "Processing simulation: 1,000 of 1,000 impressions (100% complete)"
        );
    }
}
