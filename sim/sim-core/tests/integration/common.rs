//! Shared world builders.

use nalgebra::{Point3, Vector3};
use sim_core::{BodyId, JointId, JointKind, World, WorldConfig};

pub const H: f64 = 0.01;

pub fn world_with(config: WorldConfig) -> World {
    World::new(config).expect("valid config")
}

pub fn gravity_world() -> World {
    world_with(WorldConfig::default().with_gravity(Vector3::new(0.0, -9.8, 0.0)))
}

pub fn body_at(world: &mut World, position: Point3<f64>) -> BodyId {
    let body = world.create_body();
    world.set_position(body, position).expect("position");
    body
}

/// A joint of `kind` from `body` to the static world, anchored at `anchor`.
pub fn joint_to_world(
    world: &mut World,
    kind: JointKind,
    body: BodyId,
    anchor: Point3<f64>,
) -> JointId {
    let joint = world.create_joint(kind, None).expect("joint");
    world.attach(joint, Some(body), None).expect("attach");
    world.set_anchor(joint, anchor).expect("anchor");
    joint
}

/// Distance between the two anchor points of a joint.
pub fn anchor_error(world: &World, joint: JointId) -> f64 {
    let a1 = world.anchor(joint).expect("anchor");
    let a2 = world.anchor2(joint).expect("anchor2");
    (a1 - a2).norm()
}
