//! Whole-step behaviour without joints, plus solver budget handling.

use approx::assert_relative_eq;
use nalgebra::{Point3, UnitQuaternion, Vector3};
use sim_core::{
    Contact, ContactGeom, MassProperties, SolverConfig, SurfaceParams, World, WorldConfig,
};

use crate::common::{body_at, gravity_world, world_with, H};

#[test]
fn free_fall_follows_semi_implicit_euler() {
    let mut world = gravity_world();
    let body = body_at(&mut world, Point3::new(0.0, 10.0, 0.0));
    let steps = 50;
    for _ in 0..steps {
        world.step(H).unwrap();
    }

    let n = f64::from(steps);
    let state = world.body(body).unwrap();
    assert_relative_eq!(state.linear_velocity().y, -9.8 * H * n, epsilon = 1e-9);
    assert_relative_eq!(
        state.position().y,
        10.0 - 9.8 * H * H * n * (n + 1.0) / 2.0,
        epsilon = 1e-9
    );
    assert_relative_eq!(world.time(), H * n, epsilon = 1e-12);
    assert_eq!(world.step_count(), 50);
    assert_eq!(world.last_step_size(), Some(H));
}

#[test]
fn mass_scales_force_response() {
    let mut world = world_with(WorldConfig::default());
    let light = body_at(&mut world, Point3::origin());
    let heavy = body_at(&mut world, Point3::new(5.0, 0.0, 0.0));
    world
        .set_mass(heavy, MassProperties::sphere(4.0, 0.5))
        .unwrap();

    world.add_force(light, Vector3::x()).unwrap();
    world.add_force(heavy, Vector3::x()).unwrap();
    world.step(H).unwrap();

    let v_light = world.body(light).unwrap().linear_velocity().x;
    let v_heavy = world.body(heavy).unwrap().linear_velocity().x;
    assert_relative_eq!(v_light, 4.0 * v_heavy, epsilon = 1e-12);
}

#[test]
fn constant_spin_tracks_the_exact_rotation() {
    let mut world = world_with(WorldConfig::default());
    let body = world.create_body();
    world
        .set_angular_velocity(body, Vector3::new(0.0, 0.0, 1.0))
        .unwrap();
    for _ in 0..100 {
        world.step(H).unwrap();
    }

    let expected = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 1.0);
    let actual = world.body(body).unwrap().quaternion();
    assert_relative_eq!(actual.angle_to(&expected), 0.0, epsilon = 1e-4);
}

#[test]
fn orientation_forms_stay_consistent_under_tumbling() {
    let config = WorldConfig::default().with_gyroscopic(true);
    let mut world = world_with(config);
    let body = world.create_body();
    world
        .set_mass(
            body,
            MassProperties::box_shape(2.0, Vector3::new(0.1, 0.4, 0.8)),
        )
        .unwrap();
    world
        .set_angular_velocity(body, Vector3::new(0.3, 2.0, 0.1))
        .unwrap();

    for _ in 0..500 {
        world.step(H).unwrap();
        let state = world.body(body).unwrap();
        let q = state.quaternion();
        assert_relative_eq!(q.norm(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(
            state.rotation(),
            *q.to_rotation_matrix().matrix(),
            epsilon = 1e-9
        );
        assert_relative_eq!(
            state.rotation() * state.rotation().transpose(),
            nalgebra::Matrix3::identity(),
            epsilon = 1e-9
        );
    }
    assert!(world.body(body).unwrap().is_finite());
}

#[test]
fn solver_without_sweeps_still_steps() {
    let config = WorldConfig::default()
        .with_gravity(Vector3::new(0.0, -9.8, 0.0))
        .with_solver(SolverConfig::default().with_max_iterations(0));
    let mut world = world_with(config);
    let body = body_at(&mut world, Point3::new(0.0, 0.5, 0.0));
    let group = world.create_group(0);
    let contact = Contact::new(ContactGeom::new(Point3::origin(), Vector3::y(), 0.0))
        .with_surface(SurfaceParams::with_friction(0.5));
    let joint = world.create_contact(contact, Some(group)).unwrap();
    world.attach(joint, Some(body), None).unwrap();

    let report = world.step(H).unwrap();
    assert_eq!(report.bounded_rows, 3);
    assert!(!report.solver.converged);
    assert_eq!(report.solver.iterations, 0);
    assert!(world.body(body).unwrap().is_finite());
}

#[test]
fn config_can_change_between_steps() {
    let mut world = gravity_world();
    let body = body_at(&mut world, Point3::origin());
    world.step(H).unwrap();
    world.set_gravity(Vector3::zeros()).unwrap();
    world.step(H).unwrap();
    assert_relative_eq!(
        world.body(body).unwrap().linear_velocity().y,
        -0.098,
        epsilon = 1e-12
    );

    assert!(world.set_erp(1.5).is_err());
    assert_relative_eq!(world.config().erp, 0.2);
}

#[test]
fn last_step_reports_the_row_split() {
    let mut world: World = gravity_world();
    assert!(world.last_step().is_none());
    let body = body_at(&mut world, Point3::new(1.0, 0.0, 0.0));
    let joint = world.create_joint(sim_core::JointKind::Ball, None).unwrap();
    world.attach(joint, Some(body), None).unwrap();
    world.set_anchor(joint, Point3::origin()).unwrap();

    world.step(H).unwrap();
    let report = world.last_step().copied().unwrap();
    assert_eq!(report.active_joints, 1);
    assert_eq!(report.unbounded_rows, 3);
    assert_eq!(report.bounded_rows, 0);
    assert!(report.solver.converged);
}
