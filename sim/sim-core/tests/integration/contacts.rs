//! Contacts rebuilt every step through a constraint group.

use approx::assert_relative_eq;
use nalgebra::{Point3, Vector3};
use sim_core::{BodyId, Contact, ContactGeom, GroupId, SurfaceParams, World, WorldConfig};

use crate::common::{body_at, gravity_world, world_with, H};

/// Replace the group's contacts with one ground contact under `body`, whose
/// centre sits `half_height` above the ground plane `y = 0`.
fn ground_contact(
    world: &mut World,
    group: GroupId,
    body: BodyId,
    half_height: f64,
    surface: SurfaceParams,
    normal: Vector3<f64>,
    reversed: bool,
) -> sim_core::JointId {
    world.empty_group(group).unwrap();
    let centre = world.body(body).unwrap().position();
    let geom = ContactGeom::new(
        Point3::new(centre.x, 0.0, centre.z),
        normal,
        (half_height - centre.y).max(0.0),
    );
    let contact = Contact::new(geom)
        .with_surface(surface)
        .with_friction_dir(Vector3::x());
    let joint = world.create_contact(contact, Some(group)).unwrap();
    if reversed {
        world.attach(joint, None, Some(body)).unwrap();
    } else {
        world.attach(joint, Some(body), None).unwrap();
    }
    joint
}

#[test]
fn resting_body_is_held_by_non_negative_normal_force() {
    let mut world = gravity_world();
    let body = body_at(&mut world, Point3::new(0.0, 0.5, 0.0));
    let group = world.create_group(0);

    for _ in 0..100 {
        let joint = ground_contact(
            &mut world,
            group,
            body,
            0.5,
            SurfaceParams::with_friction(0.5),
            Vector3::y(),
            false,
        );
        world.step(H).unwrap();
        let feedback = world.joint_feedback(joint).unwrap().expect("contact rows");
        assert!(feedback.force1.y >= 0.0);
    }

    let state = world.body(body).unwrap();
    assert_relative_eq!(state.position().y, 0.5, epsilon = 1e-6);
    assert_relative_eq!(state.linear_velocity().norm(), 0.0, epsilon = 1e-6);
}

#[test]
fn separating_contact_does_not_pull() {
    let mut world = gravity_world();
    let body = body_at(&mut world, Point3::new(0.0, 0.5, 0.0));
    world.set_linear_velocity(body, Vector3::new(0.0, 1.0, 0.0)).unwrap();
    let group = world.create_group(0);
    let joint = ground_contact(
        &mut world,
        group,
        body,
        0.5,
        SurfaceParams::frictionless(),
        Vector3::y(),
        false,
    );

    world.step(H).unwrap();
    let feedback = world.joint_feedback(joint).unwrap().expect("contact rows");
    assert_relative_eq!(feedback.force1.y, 0.0, epsilon = 1e-9);
    assert_relative_eq!(
        world.body(body).unwrap().linear_velocity().y,
        1.0 - 0.098,
        epsilon = 1e-9
    );
}

#[test]
fn friction_force_bounded_by_normal_force() {
    let mu = 0.5;
    let mut world = gravity_world();
    let body = body_at(&mut world, Point3::new(0.0, 0.5, 0.0));
    let group = world.create_group(0);

    for _ in 0..20 {
        let joint = ground_contact(
            &mut world,
            group,
            body,
            0.5,
            SurfaceParams::with_friction(mu),
            Vector3::y(),
            false,
        );
        world.add_force(body, Vector3::new(100.0, 0.0, 0.0)).unwrap();
        world.step(H).unwrap();

        let feedback = world.joint_feedback(joint).unwrap().expect("contact rows");
        let normal = feedback.force1.y;
        assert!(normal >= 0.0);
        assert!(feedback.force1.x.abs() <= mu * normal + 1e-9);
        assert!(feedback.force1.z.abs() <= mu * normal + 1e-9);
    }
    // The push beats friction, so the body slides.
    assert!(world.body(body).unwrap().linear_velocity().x > 10.0);
}

#[test]
fn infinite_friction_stops_sliding() {
    let mut world = gravity_world();
    let body = body_at(&mut world, Point3::new(0.0, 0.5, 0.0));
    world.set_linear_velocity(body, Vector3::new(1.0, 0.0, 0.0)).unwrap();
    let group = world.create_group(0);
    let joint = ground_contact(
        &mut world,
        group,
        body,
        0.5,
        SurfaceParams::with_friction(f64::INFINITY),
        Vector3::y(),
        false,
    );

    world.step(H).unwrap();
    let feedback = world.joint_feedback(joint).unwrap().expect("contact rows");
    assert!(feedback.force1.x < 0.0);
    let contact_point = Point3::new(world.body(body).unwrap().position().x, 0.0, 0.0);
    assert_relative_eq!(
        world.point_velocity(body, contact_point).unwrap().x,
        0.0,
        epsilon = 1e-6
    );
}

#[test]
fn capped_correction_settles_penetration() {
    let config = WorldConfig::default()
        .with_gravity(Vector3::new(0.0, -9.8, 0.0))
        .with_contact_max_correcting_vel(0.1);
    let mut world = world_with(config);
    let body = body_at(&mut world, Point3::new(0.0, 0.45, 0.0));
    let group = world.create_group(0);

    for _ in 0..200 {
        ground_contact(
            &mut world,
            group,
            body,
            0.5,
            SurfaceParams::frictionless(),
            Vector3::y(),
            false,
        );
        world.step(H).unwrap();
        // Never faster than the cap plus one step of gravity.
        assert!(world.body(body).unwrap().linear_velocity().y <= 0.1 + 1e-9);
    }
    let state = world.body(body).unwrap();
    assert_relative_eq!(state.position().y, 0.5, epsilon = 1e-3);
    assert_relative_eq!(state.linear_velocity().y, 0.0, epsilon = 1e-3);
}

#[test]
fn uncapped_correction_separates_and_stops_pushing() {
    let mut world = gravity_world();
    let body = body_at(&mut world, Point3::new(0.0, 0.45, 0.0));
    let group = world.create_group(0);

    let mut last = None;
    for _ in 0..10 {
        let joint = ground_contact(
            &mut world,
            group,
            body,
            0.5,
            SurfaceParams::frictionless(),
            Vector3::y(),
            false,
        );
        world.step(H).unwrap();
        last = world.joint_feedback(joint).unwrap();
    }
    // The first step resolves the whole depth at ERP gain, which throws the
    // body clear; once separating, the contact does not pull it back.
    assert!(world.body(body).unwrap().position().y > 0.5);
    assert_relative_eq!(last.expect("contact rows").force1.y, 0.0, epsilon = 1e-9);
}

#[test]
fn reversed_contact_flips_normal() {
    // The descriptor normal points from the second body to the first. With
    // the body attached second, a downward normal still pushes it up.
    let mut world = gravity_world();
    let body = body_at(&mut world, Point3::new(0.0, 0.5, 0.0));
    let group = world.create_group(0);

    for _ in 0..50 {
        let joint = ground_contact(
            &mut world,
            group,
            body,
            0.5,
            SurfaceParams::frictionless(),
            -Vector3::y(),
            true,
        );
        assert_eq!(world.joint_bodies(joint).unwrap(), (Some(body), None));
        world.step(H).unwrap();
    }
    assert_relative_eq!(world.body(body).unwrap().position().y, 0.5, epsilon = 1e-6);
}
