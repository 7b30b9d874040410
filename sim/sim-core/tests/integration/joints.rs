//! Positional joints under gravity.

use approx::assert_relative_eq;
use nalgebra::{Point3, Vector3};
use sim_core::{JointKind, JointParam, WorldConfig};

use crate::common::{anchor_error, body_at, gravity_world, joint_to_world, world_with, H};

/// Largest anchor separation of a horizontal pendulum released from rest.
fn pendulum_drift(kind: JointKind, erp: f64) -> f64 {
    let config = WorldConfig::default()
        .with_gravity(Vector3::new(0.0, -9.8, 0.0))
        .with_erp(erp);
    let mut world = world_with(config);
    let bob = body_at(&mut world, Point3::new(1.0, 0.0, 0.0));
    let joint = joint_to_world(&mut world, kind, bob, Point3::origin());
    if kind == JointKind::Hinge {
        world.set_axis(joint, Vector3::z()).unwrap();
    }

    let mut worst: f64 = 0.0;
    for _ in 0..300 {
        world.step(H).unwrap();
        worst = worst.max(anchor_error(&world, joint));
    }
    worst
}

#[test]
fn ball_anchor_stays_coincident() {
    let drift = pendulum_drift(JointKind::Ball, 0.8);
    assert!(drift < 1e-2, "ball drift {drift}");
}

#[test]
fn hinge_anchor_stays_coincident() {
    let drift = pendulum_drift(JointKind::Hinge, 0.8);
    assert!(drift < 1e-2, "hinge drift {drift}");
}

#[test]
fn larger_erp_shrinks_anchor_error() {
    for kind in [JointKind::Ball, JointKind::Hinge] {
        let loose = pendulum_drift(kind, 0.05);
        let tight = pendulum_drift(kind, 0.8);
        assert!(tight < loose, "{kind}: erp 0.8 gave {tight}, erp 0.05 gave {loose}");
    }
}

#[test]
fn hinge_keeps_body_on_axis() {
    let mut world = gravity_world();
    let bob = body_at(&mut world, Point3::new(1.0, 0.0, 0.0));
    let hinge = joint_to_world(&mut world, JointKind::Hinge, bob, Point3::origin());
    world.set_axis(hinge, Vector3::z()).unwrap();

    for _ in 0..100 {
        world.step(H).unwrap();
    }
    let body = world.body(bob).unwrap();
    assert_relative_eq!(body.position().z, 0.0, epsilon = 1e-9);
    assert_relative_eq!(world.axis(hinge).unwrap(), Vector3::z(), epsilon = 1e-6);
    // It has swung down, so the angle moved away from zero.
    assert!(world.hinge_angle(hinge).unwrap().abs() > 0.5);
}

#[test]
fn hanging_ball_feedback_carries_weight() {
    let mut world = gravity_world();
    let bob = body_at(&mut world, Point3::new(0.0, -1.0, 0.0));
    let ball = joint_to_world(&mut world, JointKind::Ball, bob, Point3::origin());

    world.step(H).unwrap();
    let feedback = world.joint_feedback(ball).unwrap().expect("active joint");
    assert_relative_eq!(feedback.force1, Vector3::new(0.0, 9.8, 0.0), epsilon = 1e-6);
    assert_eq!(feedback.force2, Vector3::zeros());
    assert_relative_eq!(world.body(bob).unwrap().linear_velocity().norm(), 0.0, epsilon = 1e-6);
}

#[test]
fn two_body_ball_keeps_bodies_together() {
    let mut world = world_with(
        WorldConfig::default()
            .with_gravity(Vector3::new(0.0, -9.8, 0.0))
            .with_erp(0.8),
    );
    let upper = body_at(&mut world, Point3::new(1.0, 0.0, 0.0));
    let lower = body_at(&mut world, Point3::new(2.0, 0.0, 0.0));
    let top = joint_to_world(&mut world, JointKind::Ball, upper, Point3::origin());
    let link = world.create_joint(JointKind::Ball, None).unwrap();
    world.attach(link, Some(upper), Some(lower)).unwrap();
    world.set_anchor(link, Point3::new(1.5, 0.0, 0.0)).unwrap();

    for _ in 0..200 {
        world.step(H).unwrap();
        assert!(anchor_error(&world, top) < 3e-2);
        assert!(anchor_error(&world, link) < 3e-2);
    }
    let report = world.last_step().unwrap();
    assert_eq!(report.active_joints, 2);
    assert_eq!(report.unbounded_rows, 6);
    assert_eq!(report.bounded_rows, 0);
}

#[test]
fn slider_holds_perpendicular_offset() {
    let mut world = gravity_world();
    let body = body_at(&mut world, Point3::new(0.0, 0.0, 0.0));
    let slider = world.create_joint(JointKind::Slider, None).unwrap();
    world.attach(slider, Some(body), None).unwrap();
    world.set_axis(slider, Vector3::x()).unwrap();
    world.set_linear_velocity(body, Vector3::new(1.0, 0.0, 0.0)).unwrap();

    for _ in 0..100 {
        world.step(H).unwrap();
    }
    let state = world.body(body).unwrap();
    assert_relative_eq!(state.position().y, 0.0, epsilon = 1e-6);
    assert_relative_eq!(state.position().z, 0.0, epsilon = 1e-6);
    assert_relative_eq!(world.slider_position(slider).unwrap(), 1.0, epsilon = 1e-6);
    assert_relative_eq!(world.slider_position_rate(slider).unwrap(), 1.0, epsilon = 1e-6);
}

#[test]
fn slider_stop_limits_travel() {
    let mut world = gravity_world();
    let body = body_at(&mut world, Point3::origin());
    let slider = world.create_joint(JointKind::Slider, None).unwrap();
    world.attach(slider, Some(body), None).unwrap();
    world.set_axis(slider, Vector3::x()).unwrap();
    world.set_stops(slider, -1.0, 0.25).unwrap();
    world.set_param(slider, JointParam::StopErp, 0.5).unwrap();
    world.set_linear_velocity(body, Vector3::new(1.0, 0.0, 0.0)).unwrap();

    for _ in 0..200 {
        world.step(H).unwrap();
        assert!(world.slider_position(slider).unwrap() < 0.25 + 0.02);
    }
    assert_relative_eq!(world.slider_position(slider).unwrap(), 0.25, epsilon = 1e-3);
}

#[test]
fn reversed_attachment_is_indistinguishable() {
    let run = |reversed: bool| {
        let mut world = gravity_world();
        let bob = body_at(&mut world, Point3::new(1.0, 0.0, 0.0));
        let hinge = world.create_joint(JointKind::Hinge, None).unwrap();
        if reversed {
            world.attach(hinge, None, Some(bob)).unwrap();
        } else {
            world.attach(hinge, Some(bob), None).unwrap();
        }
        world.set_anchor(hinge, Point3::origin()).unwrap();
        world.set_axis(hinge, Vector3::z()).unwrap();
        for _ in 0..50 {
            world.step(H).unwrap();
        }
        (
            world.joint_bodies(hinge).unwrap(),
            world.body(bob).unwrap().position(),
            world.hinge_angle(hinge).unwrap(),
        )
    };

    let (bodies_a, position_a, angle_a) = run(false);
    let (bodies_b, position_b, angle_b) = run(true);
    assert_eq!(bodies_a, bodies_b);
    assert_eq!(position_a, position_b);
    assert_eq!(angle_a, angle_b);
}

#[test]
fn hinge2_rejects_parallel_axes() {
    let mut world = gravity_world();
    let chassis = body_at(&mut world, Point3::origin());
    let wheel = body_at(&mut world, Point3::new(1.0, 0.0, 0.0));
    let joint = world.create_joint(JointKind::Hinge2, None).unwrap();
    world.attach(joint, Some(chassis), Some(wheel)).unwrap();
    world.set_anchor(joint, Point3::new(1.0, 0.0, 0.0)).unwrap();
    world.set_axis(joint, Vector3::z()).unwrap();
    world.set_hinge2_axis2(joint, Vector3::x()).unwrap();

    assert!(world.set_hinge2_axis2(joint, Vector3::new(0.0, 0.0, 2.0)).is_err());
    assert_relative_eq!(world.hinge2_axis2(joint).unwrap(), Vector3::x(), epsilon = 1e-12);
}
