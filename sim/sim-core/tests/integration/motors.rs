//! Motors and stops driven through the world API.

use approx::assert_relative_eq;
use nalgebra::{Point3, Vector3};
use sim_core::{JointKind, JointParam, WorldConfig};

use crate::common::{body_at, gravity_world, joint_to_world, world_with, H};

#[test]
fn hinge_motor_reaches_target_velocity() {
    let mut world = world_with(WorldConfig::default());
    let rotor = body_at(&mut world, Point3::new(0.0, 1.0, 0.0));
    let hinge = joint_to_world(&mut world, JointKind::Hinge, rotor, Point3::new(0.0, 1.0, 0.0));
    world.set_axis(hinge, Vector3::z()).unwrap();
    world.set_param(hinge, JointParam::Vel, 2.0).unwrap();
    world.set_param(hinge, JointParam::FMax, 100.0).unwrap();

    // 100 N·m on unit inertia adds at most 1 rad/s per 0.01 s step.
    world.step(H).unwrap();
    assert_relative_eq!(world.hinge_angle_rate(hinge).unwrap(), 1.0, epsilon = 1e-6);

    for _ in 0..10 {
        world.step(H).unwrap();
    }
    assert_relative_eq!(world.hinge_angle_rate(hinge).unwrap(), 2.0, epsilon = 1e-6);
    assert_eq!(world.last_step().unwrap().bounded_rows, 1);
}

#[test]
fn unpowered_hinge_has_no_bounded_row() {
    let mut world = world_with(WorldConfig::default());
    let rotor = body_at(&mut world, Point3::origin());
    let hinge = joint_to_world(&mut world, JointKind::Hinge, rotor, Point3::origin());
    world.set_param(hinge, JointParam::Vel, 2.0).unwrap();

    let report = world.step(H).unwrap();
    assert_eq!(report.unbounded_rows, 5);
    assert_eq!(report.bounded_rows, 0);
}

#[test]
fn hinge_stops_hold_swinging_pendulum() {
    let mut world = gravity_world();
    let bob = body_at(&mut world, Point3::new(1.0, 0.0, 0.0));
    let hinge = joint_to_world(&mut world, JointKind::Hinge, bob, Point3::origin());
    world.set_axis(hinge, Vector3::z()).unwrap();
    world.set_stops(hinge, -0.5, 0.5).unwrap();

    let mut widest: f64 = 0.0;
    for _ in 0..300 {
        world.step(H).unwrap();
        let angle = world.hinge_angle(hinge).unwrap();
        assert!(angle.abs() < 0.6, "angle {angle} escaped the stops");
        widest = widest.max(angle.abs());
    }
    assert!(widest > 0.45, "pendulum never reached a stop");
}

#[test]
fn angular_motor_spins_ball_jointed_body() {
    let mut world = world_with(WorldConfig::default());
    let body = body_at(&mut world, Point3::origin());
    joint_to_world(&mut world, JointKind::Ball, body, Point3::origin());

    let motor = world.create_joint(JointKind::AngularMotor, None).unwrap();
    world.attach(motor, Some(body), None).unwrap();
    world.set_axis(motor, Vector3::z()).unwrap();
    world.set_param(motor, JointParam::Vel, 1.5).unwrap();
    world.set_param(motor, JointParam::FMax, 10.0).unwrap();

    for _ in 0..50 {
        world.step(H).unwrap();
    }
    assert_relative_eq!(world.angular_motor_angle_rate(motor).unwrap(), 1.5, epsilon = 1e-6);
    assert!(world.angular_motor_angle(motor).unwrap() > 0.0);
    let w = world.body(body).unwrap().angular_velocity();
    assert_relative_eq!(w, Vector3::new(0.0, 0.0, 1.5), epsilon = 1e-6);
}

#[test]
fn hinge2_wheel_motor_spins_wheel() {
    let mut world = world_with(WorldConfig::default());
    let chassis = body_at(&mut world, Point3::origin());
    let wheel = body_at(&mut world, Point3::new(1.0, 0.0, 0.0));
    let joint = world.create_joint(JointKind::Hinge2, None).unwrap();
    world.attach(joint, Some(chassis), Some(wheel)).unwrap();
    world.set_anchor(joint, Point3::new(1.0, 0.0, 0.0)).unwrap();
    world.set_axis(joint, Vector3::z()).unwrap();
    world.set_hinge2_axis2(joint, Vector3::x()).unwrap();
    world.set_param(joint, JointParam::Vel2, 5.0).unwrap();
    world.set_param(joint, JointParam::FMax2, 1000.0).unwrap();

    for _ in 0..5 {
        world.step(H).unwrap();
    }
    assert_relative_eq!(world.hinge2_angle2_rate(joint).unwrap(), 5.0, epsilon = 1e-6);
    assert_relative_eq!(world.hinge2_angle1_rate(joint).unwrap(), 0.0, epsilon = 1e-6);
    assert_relative_eq!(world.hinge2_angle1(joint).unwrap(), 0.0, epsilon = 1e-6);

    let report = world.last_step().unwrap();
    assert_eq!(report.unbounded_rows, 4);
    assert_eq!(report.bounded_rows, 1);
}
