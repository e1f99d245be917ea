//! Integration tests: TrackingEngine against the fake controller.
//!
//! Each test drives `run_tracking_step` through a real `SitechLink` and
//! checks what ends up on the wire.

use std::collections::VecDeque;

use sitech::TrackingError;
use sitech::app::events::MountEvent;
use sitech::app::ports::{EphemerisError, TrajectoryVerdict};
use sitech::config::{CountLimits, MountConfig};
use sitech::control::{LookAheadParams, OscillationTransition, PidGains};
use sitech::error::LinkError;
use sitech::link::{ControllerGeneration, SitechLink};
use sitech::protocol::request::XBIT_TRACKING;
use sitech::protocol::{Axes, Axis};
use sitech::tracking::{AxisHealth, TrackingEngine};

use crate::mock_link::FakeController;
use crate::mock_sky::{MockSky, RecordingSink};

fn binary_link(fake: FakeController) -> SitechLink<FakeController> {
    let mut link = SitechLink::new(fake);
    link.switch_to_binary().unwrap();
    link.transport_mut().clear_history();
    link
}

// ── Request construction ──────────────────────────────────────

#[test]
fn first_step_requests_the_predicted_target() {
    let mut link = binary_link(FakeController::at(0, 0));
    let mut sky = MockSky::moving(1000, 2000, Axes::new(10.0, 20.0));
    let mut sink = RecordingSink::default();
    let mut engine = TrackingEngine::new(&MountConfig::default());

    let report = engine
        .run_tracking_step(&mut link, &mut sky, &mut sink, 0.0, 2.0, 1.0)
        .unwrap();

    let fake = link.transport();
    assert_eq!(fake.command_texts(), vec!["XXS", "XXR"]);
    assert_eq!(fake.requests.len(), 1);
    let req = fake.requests[0];
    assert_eq!((req.x_dest, req.y_dest), (1020, 2040));
    assert_eq!(req.x_bits & XBIT_TRACKING, 0);
    assert_eq!(report.request, req);
    assert_eq!(report.feed_forward, Axes::new(10.0, 20.0));
    assert_eq!(
        req.x_speed,
        link.ticks_per_sec_to_motor_speed(report.speed.x).abs() as u32
    );
    assert_ne!(engine.x_bits() & XBIT_TRACKING, 0);
    assert_eq!(engine.cycles(), 1);
}

#[test]
fn later_steps_use_prediction_delta_and_tracking_bit() {
    let mut link = binary_link(FakeController::at(0, 0));
    let mut sky = MockSky::moving(1000, 2000, Axes::new(10.0, 20.0));
    let mut sink = RecordingSink::default();
    let mut engine = TrackingEngine::new(&MountConfig::default());

    engine
        .run_tracking_step(&mut link, &mut sky, &mut sink, 0.0, 2.0, 1.0)
        .unwrap();
    let report = engine
        .run_tracking_step(&mut link, &mut sky, &mut sink, 0.5, 2.0, 1.0)
        .unwrap();

    assert_eq!(report.feed_forward, Axes::new(10.0, 20.0));
    let req = link.transport().requests[1];
    assert_eq!((req.x_dest, req.y_dest), (1025, 2050));
    assert_ne!(req.x_bits & XBIT_TRACKING, 0);
    assert_eq!(
        sink.count(|e| matches!(e, MountEvent::Telemetry(_))),
        2
    );
}

#[test]
fn speed_factor_scales_motor_speed() {
    let mut slow_link = binary_link(FakeController::at(0, 0));
    let mut fast_link = binary_link(FakeController::at(0, 0));
    let mut sink = RecordingSink::default();

    let slow = TrackingEngine::new(&MountConfig::default())
        .run_tracking_step(&mut slow_link, &mut MockSky::fixed(5000, 0), &mut sink, 0.0, 2.0, 1.0)
        .unwrap();
    let fast = TrackingEngine::new(&MountConfig::default())
        .run_tracking_step(&mut fast_link, &mut MockSky::fixed(5000, 0), &mut sink, 0.0, 2.0, 4.0)
        .unwrap();

    assert_eq!(slow.speed, fast.speed);
    let expected = (slow_link.ticks_per_sec_to_motor_speed(slow.speed.x) * 4.0).abs() as u32;
    assert_eq!(fast.request.x_speed, expected);
}

// ── Correction cap ────────────────────────────────────────────

fn stiff_config() -> MountConfig {
    MountConfig {
        tracking_pid: PidGains::new(10.0, 0.0, 0.0, 50_000.0),
        ..MountConfig::default()
    }
}

#[test]
fn correction_capped_once_locked() {
    // 10 counts is well inside one arcsecond on a 2^24 circle.
    let mut link = binary_link(FakeController::at(990, 2000));
    let mut sky = MockSky::fixed(1000, 2000);
    let mut engine = TrackingEngine::new(&stiff_config());

    let report = engine
        .run_tracking_step(&mut link, &mut sky, &mut RecordingSink::default(), 0.0, 2.0, 1.0)
        .unwrap();
    assert_eq!(report.correction, Axes::new(10.0, 0.0));
}

#[test]
fn correction_free_while_far() {
    let mut link = binary_link(FakeController::at(0, 2000));
    let mut sky = MockSky::fixed(1000, 2000);
    let mut engine = TrackingEngine::new(&stiff_config());

    let report = engine
        .run_tracking_step(&mut link, &mut sky, &mut RecordingSink::default(), 0.0, 2.0, 1.0)
        .unwrap();
    assert_eq!(report.correction, Axes::new(10_000.0, 0.0));
}

#[test]
fn target_clamped_to_soft_limits() {
    let config = MountConfig {
        soft_limits: Axes::new(
            CountLimits { min: -500, max: 500 },
            CountLimits { min: -500, max: 500 },
        ),
        ..MountConfig::default()
    };
    let mut link = binary_link(FakeController::at(0, 0));
    let mut sky = MockSky::fixed(1000, -2000);
    let mut engine = TrackingEngine::new(&config);

    engine
        .run_tracking_step(&mut link, &mut sky, &mut RecordingSink::default(), 0.0, 2.0, 1.0)
        .unwrap();
    let req = link.transport().requests[0];
    assert_eq!((req.x_dest, req.y_dest), (500, -500));
}

// ── Trajectory verdicts ───────────────────────────────────────

#[test]
fn checker_sees_rates_over_half_the_look_ahead() {
    let mut link = binary_link(FakeController::at(0, 0));
    let mut sky = MockSky::fixed(1000, -400);
    let mut engine = TrackingEngine::new(&MountConfig::default());

    engine
        .run_tracking_step(&mut link, &mut sky, &mut RecordingSink::default(), 0.0, 2.0, 1.0)
        .unwrap();
    let check = sky.checks[0];
    assert_eq!(check.current, Axes::new(0, 0));
    assert_eq!(check.target, Axes::new(1000, -400));
    assert_eq!(check.rates, Axes::new(250.0, 100.0));
    assert_eq!(check.window, MountConfig::default().trajectory_window_secs);
}

#[test]
fn unsafe_verdict_writes_nothing_after_the_status_read() {
    let mut link = binary_link(FakeController::at(0, 0));
    let mut sky = MockSky::fixed(1000, 1000);
    sky.verdicts = VecDeque::from([TrajectoryVerdict::Unsafe]);
    let mut engine = TrackingEngine::new(&MountConfig::default());

    let result =
        engine.run_tracking_step(&mut link, &mut sky, &mut RecordingSink::default(), 0.0, 2.0, 1.0);

    assert_eq!(result, Err(TrackingError::UnsafeTrajectory));
    let fake = link.transport();
    assert_eq!(fake.command_texts(), vec!["XXS"]);
    // "XXS\r" plus the checksum byte, and nothing else.
    assert_eq!(fake.written.len(), 5);
    assert!(fake.requests.is_empty());
    assert_eq!(engine.cycles(), 0);
    assert_eq!(engine.x_bits() & XBIT_TRACKING, 0);
}

#[test]
fn soft_stop_accepted_only_when_syncing_fast() {
    let mut link = binary_link(FakeController::at(0, 0));
    let mut sky = MockSky::fixed(1000, 1000);
    sky.verdicts = VecDeque::from([TrajectoryVerdict::SoftStop, TrajectoryVerdict::SoftStop]);
    let mut sink = RecordingSink::default();
    let mut engine = TrackingEngine::new(&MountConfig::default());

    let report = engine
        .run_tracking_step(&mut link, &mut sky, &mut sink, 0.0, 2.0, 4.0)
        .unwrap();
    assert!(report.truncated);
    assert_eq!(
        sink.count(|e| matches!(e, MountEvent::SoftStopTruncated { .. })),
        1
    );

    let result = engine.run_tracking_step(&mut link, &mut sky, &mut sink, 0.5, 2.0, 1.0);
    assert_eq!(result, Err(TrackingError::UnsafeTrajectory));
    assert_eq!(link.transport().requests.len(), 1);
}

// ── Failures ──────────────────────────────────────────────────

#[test]
fn ephemeris_failure_aborts_the_cycle() {
    let mut link = binary_link(FakeController::at(0, 0));
    let mut sky = MockSky::fixed(1000, 1000);
    sky.failure = Some(EphemerisError::BelowHorizon);
    let mut engine = TrackingEngine::new(&MountConfig::default());

    let result =
        engine.run_tracking_step(&mut link, &mut sky, &mut RecordingSink::default(), 0.0, 2.0, 1.0);
    assert_eq!(result, Err(TrackingError::EphemerisUnavailable));
    assert!(sky.checks.is_empty());
    assert!(link.transport().requests.is_empty());
}

#[test]
fn silent_controller_is_a_recoverable_link_error() {
    let mut fake = FakeController::at(0, 0);
    fake.silent = true;
    let mut link = binary_link(fake);
    let mut engine = TrackingEngine::new(&MountConfig::default());

    let err = engine
        .run_tracking_step(
            &mut link,
            &mut MockSky::fixed(0, 0),
            &mut RecordingSink::default(),
            0.0,
            2.0,
            1.0,
        )
        .unwrap_err();
    assert_eq!(err, TrackingError::Link(LinkError::Timeout));
    assert!(err.is_recoverable());
    assert!(link.transport().flushes > 0);
}

#[test]
fn limit_switch_stops_before_any_request() {
    let mut link = binary_link(FakeController::at(0, 0));
    link.set_generation(ControllerGeneration::force_one(63_718));
    link.transport_mut().faults.y = 0x040;
    let mut sink = RecordingSink::default();
    let mut engine = TrackingEngine::new(&MountConfig::default());

    let result = engine.run_tracking_step(&mut link, &mut MockSky::fixed(0, 0), &mut sink, 0.0, 2.0, 1.0);

    assert_eq!(
        result,
        Err(TrackingError::LimitSwitch {
            axis: Axis::Y,
            word: 0x040
        })
    );
    assert!(engine.hardware_error());
    assert_eq!(
        sink.events,
        vec![MountEvent::FaultRaised {
            axis: Axis::Y,
            word: 0x040
        }]
    );
    assert!(link.transport().requests.is_empty());
}

#[test]
fn persistent_fault_is_reported_once() {
    let mut link = binary_link(FakeController::at(0, 0));
    link.set_generation(ControllerGeneration::force_one(63_718));
    // Position error, not a limit: tracking continues.
    link.transport_mut().faults.x = 0x200;
    let mut sky = MockSky::fixed(0, 0);
    let mut sink = RecordingSink::default();
    let mut engine = TrackingEngine::new(&MountConfig::default());

    for i in 0..5 {
        engine
            .run_tracking_step(&mut link, &mut sky, &mut sink, f64::from(i) * 0.5, 2.0, 1.0)
            .unwrap();
    }
    assert_eq!(
        sink.count(|e| matches!(e, MountEvent::FaultRaised { .. })),
        1
    );

    link.transport_mut().faults.x = 0;
    engine
        .run_tracking_step(&mut link, &mut sky, &mut sink, 3.0, 2.0, 1.0)
        .unwrap();
    assert_eq!(
        sink.count(|e| matches!(e, MountEvent::FaultCleared { axis: Axis::X })),
        1
    );
    assert!(!engine.hardware_error());
}

// ── Oscillation ───────────────────────────────────────────────

#[test]
fn oscillation_gains_engage_once_and_release_after_speed_decay() {
    let mut link = binary_link(FakeController::at(0, 0));
    let mut sky = MockSky::moving(1000, 0, Axes::new(100.0, 0.0));
    let mut errors: VecDeque<Axes<f64>> = [30.0, -30.0, 25.0, -25.0, 20.0, -20.0, 2.0]
        .into_iter()
        .map(|e| Axes::new(e, 0.0))
        .collect();
    for i in 0..60 {
        errors.push_back(Axes::new(if i % 2 == 0 { 1.0 } else { -1.0 }, 0.0));
    }
    sky.errors = errors;
    let mut sink = RecordingSink::default();
    let mut engine = TrackingEngine::new(&MountConfig::default());

    let mut t = 0.0;
    for _ in 0..30 {
        engine
            .run_tracking_step(&mut link, &mut sky, &mut sink, t, 2.0, 1.0)
            .unwrap();
        t += 0.5;
    }
    let engaged = |e: &MountEvent| matches!(e, MountEvent::OscillationEngaged { axis: Axis::X, .. });
    let released = |e: &MountEvent| matches!(e, MountEvent::OscillationReleased { axis: Axis::X });
    assert_eq!(sink.count(engaged), 1);
    assert_eq!(sink.count(released), 0);
    assert!(engine.oscillation_engaged(Axis::X));
    assert_eq!(engine.axis_health(Axis::X), AxisHealth::Warning);
    assert_eq!(engine.axis_health(Axis::Y), AxisHealth::Good);

    // Slow the target down: commanded speed decays and the gains come back.
    sky.set_rate(t, Axes::new(10.0, 0.0));
    for _ in 0..6 {
        engine
            .run_tracking_step(&mut link, &mut sky, &mut sink, t, 2.0, 1.0)
            .unwrap();
        t += 0.5;
    }
    assert_eq!(sink.count(released), 1);
    assert_eq!(engine.axis_health(Axis::X), AxisHealth::Good);

    // The release happened on a cycle commanding at most 70% of the
    // engage-time speed.
    let engaged_speed = sink
        .events
        .iter()
        .find_map(|e| match e {
            MountEvent::OscillationEngaged { speed, .. } => Some(*speed),
            _ => None,
        })
        .unwrap();
    let release_at = sink.events.iter().position(released).unwrap();
    let speed_at_release = sink.events[release_at..]
        .iter()
        .find_map(|e| match e {
            MountEvent::Telemetry(t) => Some(t.speed.x),
            _ => None,
        })
        .unwrap();
    assert!(speed_at_release.abs() <= 0.7 * engaged_speed);
}

#[test]
fn direct_move_clears_the_tracking_bit() {
    let mut link = binary_link(FakeController::at(0, 0));
    let mut sky = MockSky::fixed(0, 0);
    let mut sink = RecordingSink::default();
    let config = MountConfig::default();
    let mut engine = TrackingEngine::new(&config);

    engine
        .run_tracking_step(&mut link, &mut sky, &mut sink, 0.0, 2.0, 1.0)
        .unwrap();
    assert_ne!(engine.x_bits() & XBIT_TRACKING, 0);

    engine
        .send_direct_move(&mut link, &mut sky, &mut sink, 0.5, Axes::new(0, 0), Axes::new(100_000, -50_000))
        .unwrap();
    let req = *link.transport().requests.last().unwrap();
    assert_eq!(req.x_bits & XBIT_TRACKING, 0);
    assert_eq!((req.x_dest, req.y_dest), (100_000, -50_000));
    let slew = link.degrees_per_sec_to_motor_speed(
        config.slew_speed_dps.x,
        config.ticks_per_circle.x,
        360.0,
    );
    assert_eq!(req.x_speed, slew as u32);
}

#[test]
fn oscillation_transitions_are_reported_per_axis() {
    let mut engine = TrackingEngine::new(&MountConfig::default());
    let mut sink = RecordingSink::default();
    let mut seen = Vec::new();
    for (i, e) in [9.0, -9.0, 8.0, -8.0, 7.0, -7.0, 6.0, 0.5].into_iter().enumerate() {
        let t = engine.correct_oscillations(Axes::new(0.0, e), Axes::new(0.0, 50.0), &mut sink);
        if let Some(tr) = t.y {
            seen.push((i, tr));
        }
        assert_eq!(t.x, None);
    }
    assert_eq!(seen, vec![(7, OscillationTransition::Engaged)]);
}

#[test]
fn steady_heading_across_the_wrap_is_not_erratic() {
    let config = MountConfig {
        tracking_look_ahead_secs: 3.0,
        look_ahead: LookAheadParams {
            interval_cycles: 1,
            ..LookAheadParams::default()
        },
        ..MountConfig::default()
    };
    let mut link = binary_link(FakeController::at(0, 0));
    let mut sky = MockSky::moving(0, 0, Axes::new(-100.0, 0.1));
    let mut sink = RecordingSink::default();
    let mut engine = TrackingEngine::new(&config);

    // Heading flips between +179.94 and -179.94 deg: 0.11 deg apart.
    for i in 0..8 {
        let t = f64::from(i) * 0.5;
        let y = if i % 2 == 0 { 0.1 } else { -0.1 };
        sky.set_rate(t, Axes::new(-100.0, y));
        let look_ahead = engine.look_ahead();
        engine
            .run_tracking_step(&mut link, &mut sky, &mut sink, t, look_ahead, 1.0)
            .unwrap();
        assert!(engine.look_ahead() <= 3.0, "look-ahead grew to {}", engine.look_ahead());
    }
    assert!(engine.look_ahead() < 3.0);
}

#[test]
fn unvalidated_config_does_not_panic() {
    let config = MountConfig {
        soft_limits: Axes::new(
            CountLimits { min: 100, max: -100 },
            CountLimits { min: -1000, max: 1000 },
        ),
        correction_cap_min: -50.0,
        look_ahead: LookAheadParams {
            floor: 5.0,
            ceiling: 1.0,
            interval_cycles: 1,
            ..LookAheadParams::default()
        },
        ..MountConfig::default()
    };
    assert!(config.validate().is_err());

    let mut link = binary_link(FakeController::at(0, 0));
    let mut sky = MockSky::fixed(0, 0);
    let mut sink = RecordingSink::default();
    let mut engine = TrackingEngine::new(&config);
    engine.pin_look_ahead(Some(3.0));
    assert_eq!(engine.look_ahead(), 1.0);

    let report = engine
        .run_tracking_step(&mut link, &mut sky, &mut sink, 0.0, 2.0, 1.0)
        .unwrap();
    assert_eq!(report.request.x_dest, -100);
}
