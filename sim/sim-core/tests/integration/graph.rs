//! Body/joint graph bookkeeping across groups and destruction.

use nalgebra::{Point3, Vector3};
use sim_core::{Contact, ContactGeom, JointKind, SimError, World};

use crate::common::{body_at, gravity_world, H};

fn contact_between(world: &World, a: sim_core::BodyId) -> Contact {
    let p = world.body(a).unwrap().position();
    Contact::new(ContactGeom::new(p, Vector3::y(), 0.0))
}

#[test]
fn emptying_a_group_invalidates_all_its_joints() {
    let mut world = gravity_world();
    let a = body_at(&mut world, Point3::new(0.0, 1.0, 0.0));
    let b = body_at(&mut world, Point3::new(0.0, 2.0, 0.0));
    let group = world.create_group(0);

    let mut contacts = Vec::new();
    for _ in 0..8 {
        let joint = world
            .create_contact(contact_between(&world, a), Some(group))
            .unwrap();
        world.attach(joint, Some(a), Some(b)).unwrap();
        contacts.push(joint);
    }
    assert_eq!(world.group_len(group).unwrap(), 8);
    assert_eq!(world.neighbors(a).unwrap().len(), 8);
    assert!(world.connected(a, b).unwrap());

    world.empty_group(group).unwrap();

    assert_eq!(world.group_len(group).unwrap(), 0);
    assert!(world.neighbors(a).unwrap().is_empty());
    assert!(world.neighbors(b).unwrap().is_empty());
    assert!(!world.connected(a, b).unwrap());
    for joint in &contacts {
        assert!(!world.contains_joint(*joint));
        assert!(matches!(
            world.joint_bodies(*joint),
            Err(SimError::InvalidJointId(_))
        ));
    }

    // Reused arena slots do not revive the old handles.
    let fresh = world
        .create_contact(contact_between(&world, a), Some(group))
        .unwrap();
    assert!(world.contains_joint(fresh));
    for joint in &contacts {
        assert!(!world.contains_joint(*joint));
    }

    // The stale nodes are gone after a step.
    world.step(H).unwrap();
    assert!(world.body(a).unwrap().connections().is_empty());
}

#[test]
fn emptied_group_contributes_no_rows() {
    let mut world = gravity_world();
    let a = body_at(&mut world, Point3::new(0.0, 0.5, 0.0));
    let group = world.create_group(0);
    let joint = world
        .create_contact(contact_between(&world, a), Some(group))
        .unwrap();
    world.attach(joint, Some(a), None).unwrap();
    world.empty_group(group).unwrap();

    let report = world.step(H).unwrap();
    assert_eq!(report.active_joints, 0);
    assert!(world.body(a).unwrap().linear_velocity().y < 0.0);
}

#[test]
fn emptied_group_hides_last_step_feedback() {
    let mut world = gravity_world();
    let a = body_at(&mut world, Point3::new(0.0, 0.0, 0.0));
    let group = world.create_group(0);
    let old = world
        .create_contact(contact_between(&world, a), Some(group))
        .unwrap();
    world.attach(old, Some(a), None).unwrap();
    world.step(H).unwrap();
    assert!(world.joint_feedback(old).unwrap().is_some());

    world.empty_group(group).unwrap();
    assert!(matches!(
        world.joint_feedback(old),
        Err(SimError::InvalidJointId(_))
    ));

    // A joint reusing the slot reports nothing until it takes part in a step.
    let fresh = world
        .create_contact(contact_between(&world, a), Some(group))
        .unwrap();
    world.attach(fresh, Some(a), None).unwrap();
    assert_eq!(world.joint_feedback(fresh).unwrap(), None);
}

#[test]
fn persistent_joints_survive_group_reset() {
    let mut world = gravity_world();
    let a = body_at(&mut world, Point3::new(0.0, 1.0, 0.0));
    let b = body_at(&mut world, Point3::new(0.0, 2.0, 0.0));
    let hinge = world.create_joint(JointKind::Hinge, None).unwrap();
    world.attach(hinge, Some(a), Some(b)).unwrap();

    let group = world.create_group(0);
    let contact = world
        .create_contact(contact_between(&world, a), Some(group))
        .unwrap();
    world.attach(contact, Some(a), Some(b)).unwrap();
    world.empty_group(group).unwrap();

    assert!(world.contains_joint(hinge));
    assert_eq!(world.neighbors(a).unwrap().len(), 1);
    assert!(world.connected(a, b).unwrap());
    assert!(!world.connected_excluding(a, b, JointKind::Hinge).unwrap());
}

#[test]
fn destroying_the_middle_of_a_chain() {
    let mut world = gravity_world();
    let a = body_at(&mut world, Point3::new(0.0, 0.0, 0.0));
    let b = body_at(&mut world, Point3::new(1.0, 0.0, 0.0));
    let c = body_at(&mut world, Point3::new(2.0, 0.0, 0.0));
    let ab = world.create_joint(JointKind::Ball, None).unwrap();
    world.attach(ab, Some(a), Some(b)).unwrap();
    let bc = world.create_joint(JointKind::Ball, None).unwrap();
    world.attach(bc, Some(b), Some(c)).unwrap();

    assert!(world.connected(a, b).unwrap());
    assert!(world.connected(c, b).unwrap());
    assert!(!world.connected(a, c).unwrap());

    world.destroy_body(b).unwrap();

    assert!(world.neighbors(a).unwrap().is_empty());
    assert!(world.neighbors(c).unwrap().is_empty());
    assert_eq!(world.joint_bodies(ab).unwrap(), (None, None));
    assert_eq!(world.joint_bodies(bc).unwrap(), (None, None));
    assert!(matches!(
        world.connected(b, a),
        Err(SimError::InvalidBodyId(_))
    ));

    // The detached joints can be reused.
    world.attach(ab, Some(a), Some(c)).unwrap();
    assert!(world.connected(a, c).unwrap());
    assert_eq!(world.step(H).unwrap().active_joints, 1);
}

#[test]
fn world_attachment_lists_one_node() {
    let mut world = gravity_world();
    let a = body_at(&mut world, Point3::origin());
    let joint = world.create_joint(JointKind::Ball, None).unwrap();
    world.attach(joint, None, Some(a)).unwrap();

    let neighbors = world.neighbors(a).unwrap();
    assert_eq!(neighbors.len(), 1);
    assert_eq!(neighbors[0].joint, joint);
    assert_eq!(neighbors[0].other, None);

    world.destroy_joint(joint).unwrap();
    assert!(world.neighbors(a).unwrap().is_empty());
}
