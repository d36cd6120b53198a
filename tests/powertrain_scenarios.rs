//! Powertrain integration tests on a deterministic flat track.

mod common;

use common::{FlatTrack, DT};
use nalgebra::{Point3, UnitQuaternion, Vector3};
use proptest::prelude::*;
use vehicle_dynamics::host::WHEEL_LOCK_TORQUE;
use vehicle_dynamics::vehicle::MPS_TO_MPH;
use vehicle_dynamics::{
    ControlMode, DriverInput, DynamicsEvent, Ignition, VehicleConfig, VehicleController, VehicleDynamics,
};

fn sedan() -> (VehicleDynamics, FlatTrack) {
    let config = VehicleConfig::sedan();
    let mut track = FlatTrack::new(&config);
    let mut dynamics = VehicleDynamics::new(config).expect("sedan config is valid");
    dynamics.attach(&mut track);
    (dynamics, track)
}

/// One tick of dynamics followed by one tick of the track.
fn drive(dynamics: &mut VehicleDynamics, track: &mut FlatTrack, input: DriverInput) -> Vec<DynamicsEvent> {
    let report = dynamics.step(track, input, DT);
    track.advance(DT);
    report.events
}

#[test]
fn test_full_throttle_accelerates_and_upshifts() {
    let (mut dynamics, mut track) = sedan();
    let throttle = DriverInput::new(0.0, 1.0);

    let mut last_speed = track.speed();
    for tick in 0..300 {
        drive(&mut dynamics, &mut track, throttle);
        let speed = track.speed();
        assert!(speed > last_speed, "speed stalled at tick {tick}: {speed}");
        last_speed = speed;
    }

    for _ in 0..300 {
        drive(&mut dynamics, &mut track, throttle);
    }

    let state = dynamics.state();
    assert!(state.current_gear() > 1.0, "still in 1st at {} mph", state.speed());
    assert!(state.odometer() > 0.0);
    assert!(state.fuel_level() < dynamics.config().fuel_capacity);
    assert!(track.position.z > 0.0, "forward is +Z");
}

#[test]
fn test_gear_interpolates_across_a_shift() {
    let (mut dynamics, mut track) = sedan();
    let ratios = dynamics.config().gear_ratios.clone();

    dynamics.shift_up();
    dynamics.step(&mut track, DriverInput::NEUTRAL, 0.1);
    assert!((dynamics.state().current_gear() - 1.25).abs() < 1e-4);

    dynamics.step(&mut track, DriverInput::NEUTRAL, 0.1);
    let gearbox = dynamics.state().gearbox();
    assert!((gearbox.current_gear() - 1.5).abs() < 1e-4);
    assert!((gearbox.ratio(&ratios) - (4.17 + 3.14) / 2.0).abs() < 1e-3);

    dynamics.step(&mut track, DriverInput::NEUTRAL, 0.1);
    dynamics.step(&mut track, DriverInput::NEUTRAL, 0.1);
    dynamics.step(&mut track, DriverInput::NEUTRAL, 0.1);
    assert_eq!(dynamics.state().current_gear(), 2.0);
    assert!(!dynamics.state().gearbox().is_shifting());
}

#[test]
fn test_traction_cap_converges_both_ways() {
    let (mut dynamics, mut track) = sedan();
    let max = dynamics.config().max_motor_torque;

    for _ in 0..70 {
        dynamics.step(&mut track, DriverInput::NEUTRAL, DT);
    }
    assert_eq!(dynamics.state().traction_cap(), max);

    // airborne wheels leave the cap alone
    track.grounded = false;
    track.forward_slip = 5.0;
    dynamics.step(&mut track, DriverInput::NEUTRAL, DT);
    assert_eq!(dynamics.state().traction_cap(), max);

    track.grounded = true;
    for _ in 0..70 {
        dynamics.step(&mut track, DriverInput::NEUTRAL, DT);
    }
    assert_eq!(dynamics.state().traction_cap(), 0.0);
    assert_eq!(dynamics.state().road_slip(), 5.0);
}

#[test]
fn test_engine_off_spins_down_and_burns_nothing() {
    let (mut dynamics, mut track) = sedan();

    for _ in 0..60 {
        dynamics.step(&mut track, DriverInput::NEUTRAL, DT);
    }
    assert!((dynamics.state().rpm() - 800.0).abs() < 1.0, "idles at min rpm");

    dynamics.stop_engine();
    assert_eq!(dynamics.state().ignition(), Ignition::Off);
    let fuel = dynamics.state().fuel_level();
    let gear = dynamics.state().current_gear();

    for _ in 0..120 {
        dynamics.step(&mut track, DriverInput::new(0.0, 1.0), DT);
        assert_eq!(track.motor[1], 0.0, "no drive torque with the engine off");
    }

    assert_eq!(dynamics.state().rpm(), 0.0);
    assert_eq!(dynamics.state().fuel_level(), fuel);
    assert_eq!(dynamics.state().current_gear(), gear);
}

#[test]
fn test_handbrake_brakes_through_bias_and_cuts_drive() {
    let (mut dynamics, mut track) = sedan();
    dynamics.set_handbrake(true);

    dynamics.step(&mut track, DriverInput::new(0.0, 1.0), DT);

    let max_brake = dynamics.config().max_brake_torque;
    assert!((track.brake[0] - max_brake * 0.6).abs() < 1e-3);
    assert!((track.brake[1] - max_brake * 0.4).abs() < 1e-3);
    assert_eq!(track.motor, vec![0.0, 0.0]);
    // the driver's pedal is still what the state reports
    assert_eq!(dynamics.state().accel_input(), 1.0);

    dynamics.toggle_handbrake();
    dynamics.step(&mut track, DriverInput::new(0.0, 1.0), DT);
    assert_eq!(track.brake, vec![0.0, 0.0]);
    assert!(track.motor[1] > 0.0);
}

#[test]
fn test_reverse_and_forward_are_exclusive() {
    let (mut dynamics, mut track) = sedan();

    dynamics.shift_down();
    assert!(dynamics.state().reverse());
    assert_eq!(dynamics.state().current_gear(), 1.0);

    for _ in 0..30 {
        dynamics.step(&mut track, DriverInput::new(0.0, 1.0), DT);
    }
    assert!(track.motor[1] < 0.0, "reverse drives backwards");
    assert!(dynamics.state().torque() < 0.0);

    dynamics.shift_up();
    assert!(!dynamics.state().reverse());
    assert_eq!(dynamics.state().current_gear(), 1.0);

    dynamics.shift_to_reverse();
    dynamics.shift_to_first();
    assert!(!dynamics.state().reverse());
}

#[test]
fn test_mile_tick_fires_once_per_mile() {
    let (mut dynamics, mut track) = sedan();
    track.wheel_rpm = Some(5000.0);

    let mut ticks = Vec::new();
    for _ in 0..600 {
        for event in dynamics.step(&mut track, DriverInput::NEUTRAL, DT).events {
            if let DynamicsEvent::MileTick { odometer } = event {
                ticks.push(odometer);
            }
        }
    }

    assert_eq!(ticks.len(), 1);
    assert!(ticks[0] > 1609.0 && ticks[0] < 1615.0, "odometer at tick: {}", ticks[0]);
    assert!(dynamics.state().odometer() > ticks[0]);
}

#[test]
fn test_force_reset_settles_and_is_idempotent() {
    let (mut dynamics, mut track) = sedan();
    for _ in 0..120 {
        drive(&mut dynamics, &mut track, DriverInput::new(0.3, 1.0));
    }
    let fuel = dynamics.state().fuel_level();
    let odometer = dynamics.state().odometer();
    assert!(track.speed() > 0.0);

    let position = Point3::new(10.0, 0.0, -4.0);
    let rotation = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 90f32.to_radians());
    dynamics.force_reset(&mut track, position, rotation);

    assert_eq!(track.position, position);
    assert_eq!(track.velocity, Vector3::zeros());
    assert_eq!(track.brake, vec![WHEEL_LOCK_TORQUE, WHEEL_LOCK_TORQUE]);
    assert_eq!(track.motor, vec![0.0, 0.0]);
    assert_eq!(track.steer[0], 0.0);

    let state = dynamics.state();
    assert_eq!(state.current_gear(), 1.0);
    assert!(!state.reverse());
    assert_eq!(state.rpm(), 0.0);
    assert_eq!(state.speed(), 0.0);
    assert_eq!(state.fuel_level(), fuel);
    assert_eq!(state.odometer(), odometer);

    let once = (dynamics.state().clone(), track.clone());
    dynamics.force_reset(&mut track, position, rotation);
    assert_eq!((dynamics.state().clone(), track.clone()), once);

    // the next tick releases the lock
    dynamics.step(&mut track, DriverInput::NEUTRAL, DT);
    assert_eq!(track.brake, vec![0.0, 0.0]);
}

#[test]
fn test_force_reset_without_body_is_a_no_op() {
    let (mut dynamics, mut track) = sedan();
    for _ in 0..30 {
        drive(&mut dynamics, &mut track, DriverInput::new(0.0, 1.0));
    }
    track.attached = false;

    let before = (dynamics.state().clone(), track.clone());
    dynamics.force_reset(&mut track, Point3::new(5.0, 0.0, 5.0), UnitQuaternion::identity());
    assert_eq!((dynamics.state().clone(), track.clone()), before);
}

#[test]
fn test_pinned_control_overrides_driver_input() {
    let config = VehicleConfig::sedan();
    let mut track = FlatTrack::new(&config);
    let mut controller = VehicleController::new(VehicleDynamics::new(config).expect("valid config"));
    controller.init(&mut track);

    controller.set_driver_input(DriverInput::new(-1.0, -1.0));
    controller.apply_control(0.5, 1.0);
    assert_eq!(controller.mode(), ControlMode::Pinned { steer: 0.5, accel: 1.0 });

    controller.fixed_update(&mut track, DT);
    assert!((track.steer[0] - 39.4 * 0.5).abs() < 1e-4);
    assert_eq!(track.brake, vec![0.0, 0.0]);

    controller.release_control();
    controller.fixed_update(&mut track, DT);
    assert!((track.steer[0] + 39.4).abs() < 1e-4);
    assert!(track.brake[0] > 0.0);
}

#[test]
fn test_reset_position_returns_to_spawn_pose() {
    let config = VehicleConfig::sedan();
    let mut track = FlatTrack::new(&config);
    track.position = Point3::new(2.0, 0.5, 3.0);
    let mut controller = VehicleController::new(VehicleDynamics::new(config).expect("valid config"));
    controller.init(&mut track);

    controller.set_driver_input(DriverInput::new(0.0, 1.0));
    for _ in 0..60 {
        controller.fixed_update(&mut track, DT);
        track.advance(DT);
    }
    assert!(track.position.z > 3.0);

    controller.reset_position(&mut track);
    assert_eq!(track.position, Point3::new(2.0, 0.5, 3.0));
    assert_eq!(track.velocity, Vector3::zeros());
}

fn yawed(degrees: f32) -> UnitQuaternion<f32> {
    UnitQuaternion::from_axis_angle(&Vector3::y_axis(), degrees.to_radians())
}

/// Track rolling along +Z at 10 m/s whose body has just yawed by `degrees`.
fn rolling_then_yawed(degrees: f32) -> (VehicleDynamics, FlatTrack) {
    let (dynamics, mut track) = sedan();
    track.velocity = Vector3::new(0.0, 0.0, 10.0);
    track.rotation = yawed(degrees);
    (dynamics, track)
}

#[test]
fn test_auto_steer_swings_velocity_by_old_minus_new_heading() {
    let (mut dynamics, mut track) = rolling_then_yawed(5.0);
    let amount = dynamics.config().auto_steer_amount;

    dynamics.step(&mut track, DriverInput::NEUTRAL, DT);

    // heading went 0 -> 5, so the velocity turns by (0 - 5) * amount degrees
    let angle = (-5.0 * amount).to_radians();
    assert!((track.velocity.x - 10.0 * angle.sin()).abs() < 1e-3, "{:?}", track.velocity);
    assert!((track.velocity.z - 10.0 * angle.cos()).abs() < 1e-3);
    assert!(track.velocity.x < 0.0);
    assert!((track.velocity.norm() - 10.0).abs() < 1e-3);
}

#[test]
fn test_auto_steer_ignores_jumps_past_the_threshold() {
    let (mut dynamics, mut track) = rolling_then_yawed(20.0);

    dynamics.step(&mut track, DriverInput::NEUTRAL, DT);
    assert_eq!(track.velocity, Vector3::new(0.0, 0.0, 10.0));

    // the jump still becomes the new baseline
    dynamics.step(&mut track, DriverInput::NEUTRAL, DT);
    assert_eq!(track.velocity, Vector3::new(0.0, 0.0, 10.0));
}

#[test]
fn test_auto_steer_skips_airborne_ticks_and_keeps_the_baseline() {
    let (mut dynamics, mut track) = rolling_then_yawed(5.0);
    track.grounded = false;

    dynamics.step(&mut track, DriverInput::NEUTRAL, DT);
    assert_eq!(track.velocity, Vector3::new(0.0, 0.0, 10.0));

    // landing: the yaw is still measured from the pre-jump heading
    track.grounded = true;
    dynamics.step(&mut track, DriverInput::NEUTRAL, DT);
    assert!(track.velocity.x < -0.1, "{:?}", track.velocity);
}

#[test]
fn test_auto_steer_is_off_with_the_engine() {
    let (mut dynamics, mut track) = rolling_then_yawed(5.0);
    dynamics.stop_engine();

    dynamics.step(&mut track, DriverInput::NEUTRAL, DT);
    assert_eq!(track.velocity, Vector3::new(0.0, 0.0, 10.0));

    dynamics.start_engine();
    dynamics.step(&mut track, DriverInput::NEUTRAL, DT);
    assert!(track.velocity.x < -0.1, "{:?}", track.velocity);
}

#[test]
fn test_fuel_rate_at_idle_and_on_the_move() {
    let (mut dynamics, mut track) = sedan();

    for _ in 0..30 {
        dynamics.step(&mut track, DriverInput::NEUTRAL, DT);
    }
    let state = dynamics.state();
    assert_eq!(state.fuel_per_metre(), 0.0, "no distance covered");
    assert!(state.fuel_per_second() > 0.0, "idling still burns");

    for _ in 0..60 {
        drive(&mut dynamics, &mut track, DriverInput::new(0.0, 1.0));
    }
    let state = dynamics.state();
    assert!(state.fuel_per_metre() > 0.0);
    assert!(state.fuel_per_second() > 0.0);
}

#[test]
fn test_measured_speed_follows_position_delta() {
    let (mut dynamics, mut track) = sedan();

    for _ in 0..120 {
        drive(&mut dynamics, &mut track, DriverInput::new(0.0, 1.0));
    }

    // the step sees the position the previous advance produced
    let last = track.position;
    let previous = last - track.velocity * DT;
    dynamics.step(&mut track, DriverInput::new(0.0, 1.0), DT);

    let expected = (last - previous).norm() / DT;
    let state = dynamics.state();
    assert!((state.measured_speed() - expected).abs() < 1e-2 * expected.max(1.0));
    // both estimates agree on a no-slip track
    assert!((state.measured_speed() * MPS_TO_MPH - state.speed()).abs() < 1e-2 * state.speed().max(1.0));

    dynamics.force_reset(&mut track, Point3::origin(), UnitQuaternion::identity());
    assert_eq!(dynamics.state().measured_speed(), 0.0);
}

#[test]
fn test_display_sync_rewrites_damping_only_when_it_drifts() {
    let (mut dynamics, mut track) = sedan();
    for _ in 0..30 {
        drive(&mut dynamics, &mut track, DriverInput::new(0.2, 1.0));
    }
    let damping = dynamics.config().wheel_damping;

    track.damping = vec![0.0, damping];
    track.damping_writes = 0;
    let state = dynamics.state().clone();

    dynamics.sync_display(&mut track);
    assert_eq!(track.damping, vec![damping, damping]);
    assert_eq!(track.damping_writes, 1);
    assert_eq!(dynamics.state(), &state);

    dynamics.sync_display(&mut track);
    assert_eq!(track.damping_writes, 1);
}

#[test]
fn test_invalid_dt_skips_the_tick() {
    let (mut dynamics, mut track) = sedan();
    let before = dynamics.state().clone();

    dynamics.step(&mut track, DriverInput::new(0.0, 1.0), 0.0);
    dynamics.step(&mut track, DriverInput::new(0.0, 1.0), f32::NAN);
    dynamics.step(&mut track, DriverInput::new(0.0, 1.0), -DT);

    assert_eq!(dynamics.state(), &before);
    assert_eq!(dynamics.clock(), 0.0);
}

#[derive(Debug, Clone)]
enum Action {
    Drive { steer: f32, accel: f32 },
    Handbrake,
    Ignition,
    ShiftUp,
    ShiftDown,
    Slip { grounded: bool, slip: f32 },
}

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![
        6 => (-2.0f32..2.0, -2.0f32..2.0).prop_map(|(steer, accel)| Action::Drive { steer, accel }),
        1 => Just(Action::Handbrake),
        1 => Just(Action::Ignition),
        1 => Just(Action::ShiftUp),
        1 => Just(Action::ShiftDown),
        1 => (any::<bool>(), -1.0f32..2.0).prop_map(|(grounded, slip)| Action::Slip { grounded, slip }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_state_stays_in_range(actions in prop::collection::vec(action(), 1..200)) {
        let (mut dynamics, mut track) = sedan();
        let config = dynamics.config().clone();
        let mut input = DriverInput::NEUTRAL;
        let mut fuel = dynamics.state().fuel_level();

        for action in actions {
            match action {
                Action::Drive { steer, accel } => input = DriverInput::new(steer, accel),
                Action::Handbrake => dynamics.toggle_handbrake(),
                Action::Ignition => dynamics.toggle_ignition(),
                Action::ShiftUp => dynamics.shift_up(),
                Action::ShiftDown => dynamics.shift_down(),
                Action::Slip { grounded, slip } => {
                    track.grounded = grounded;
                    track.forward_slip = slip;
                }
            }
            drive(&mut dynamics, &mut track, input);

            let state = dynamics.state();
            prop_assert!(state.current_gear() >= 1.0);
            prop_assert!(state.current_gear() <= config.num_gears() as f32);
            prop_assert!(state.traction_cap() >= 0.0);
            prop_assert!(state.traction_cap() <= config.max_motor_torque);
            prop_assert!(state.rpm().is_finite() && state.rpm() >= 0.0);
            prop_assert!(state.steer_angle().abs() <= config.max_steering_angle + 1e-4);
            prop_assert!(state.fuel_level() <= fuel);
            prop_assert!(state.fuel_level() >= 0.0);
            fuel = state.fuel_level();
        }
    }
}
