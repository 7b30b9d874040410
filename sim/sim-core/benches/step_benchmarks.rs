//! Benchmarks for the step pipeline.
//!
//! Run with: cargo bench -p sim-core

#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use nalgebra::{Point3, Vector3};

use sim_core::{Contact, ContactGeom, JointKind, SurfaceParams, World, WorldConfig};

fn gravity_world() -> World {
    let config = WorldConfig::default().with_gravity(Vector3::new(0.0, -9.8, 0.0));
    let Ok(world) = World::new(config) else {
        unreachable!("default configuration is valid");
    };
    world
}

/// A hanging chain of `links` bodies joined by ball joints.
fn build_chain(links: usize) -> Option<World> {
    let mut world = gravity_world();
    let mut previous = None;
    for i in 0..links {
        let body = world.create_body();
        let x = i as f64 + 1.0;
        world.set_position(body, Point3::new(x, 0.0, 0.0)).ok()?;
        let joint = world.create_joint(JointKind::Ball, None).ok()?;
        world.attach(joint, Some(body), previous).ok()?;
        world.set_anchor(joint, Point3::new(x - 1.0, 0.0, 0.0)).ok()?;
        previous = Some(body);
    }
    Some(world)
}

fn bench_chain_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_step");

    for links in [4, 16, 64] {
        let Some(world) = build_chain(links) else {
            continue;
        };
        group.throughput(Throughput::Elements(links as u64));
        group.bench_with_input(
            BenchmarkId::new("ball_chain", format!("{links}_links")),
            &world,
            |b, world| {
                b.iter_batched(
                    || world.clone(),
                    |mut w| black_box(w.step(0.01)),
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

/// Boxes resting on the ground, contacts rebuilt in a group every step.
fn bench_contact_refresh(c: &mut Criterion) {
    let mut group = c.benchmark_group("contact_refresh");

    for bodies in [8, 32] {
        let mut world = gravity_world();
        let ids: Vec<_> = (0..bodies)
            .map(|i| {
                let body = world.create_body();
                let _ = world.set_position(body, Point3::new(i as f64 * 2.0, 0.5, 0.0));
                body
            })
            .collect();
        let contacts = world.create_group(0);

        group.throughput(Throughput::Elements(bodies as u64));
        group.bench_function(BenchmarkId::new("four_point", bodies), |b| {
            b.iter(|| {
                let _ = world.empty_group(contacts);
                for &body in &ids {
                    let Ok(centre) = world.body(body).map(|b| b.position()) else {
                        continue;
                    };
                    for (dx, dz) in [(-0.5, -0.5), (0.5, -0.5), (-0.5, 0.5), (0.5, 0.5)] {
                        let geom = ContactGeom {
                            position: Point3::new(centre.x + dx, 0.0, centre.z + dz),
                            normal: Vector3::y(),
                            depth: (0.5 - centre.y).max(0.0),
                        };
                        let contact = Contact::new(geom).with_surface(SurfaceParams::with_friction(0.5));
                        if let Ok(joint) = world.create_contact(contact, Some(contacts)) {
                            let _ = world.attach(joint, Some(body), None);
                        }
                    }
                }
                black_box(world.step(0.01))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_chain_step, bench_contact_refresh);
criterion_main!(benches);
