// ==============================================================================
// physics.rs — RAPIER WORLD WRAPPER
// ------------------------------------------------------------------------------
// Owns the rapier3d sets and pipeline. Everything else in this server only
// configures the engine: bodies, colliders, joints, per-step impulses. No
// collision detection, integration or broad-phase lives here.
//
// Collision groups keep the rig from colliding with itself: wheels and
// bumper particles interact with the terrain only, never with the chassis
// or each other.
// ==============================================================================

use rapier3d::prelude::*;

pub const GROUP_TERRAIN: Group = Group::from_bits_truncate(0b0001);
pub const GROUP_CHASSIS: Group = Group::from_bits_truncate(0b0010);
pub const GROUP_WHEEL: Group = Group::from_bits_truncate(0b0100);
pub const GROUP_BUMPER: Group = Group::from_bits_truncate(0b1000);

/// Anything outside this cube is treated as diverged.
pub const WORLD_BOUND: f32 = 1_000.0;

pub struct PhysicsWorld {
    pub gravity: Vector<Real>,
    pub pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub bodies: RigidBodySet,
    pub colliders: ColliderSet,
    pub joints: ImpulseJointSet,
    pub multibody_joints: MultibodyJointSet,
    pub ccd: CCDSolver,
    pub query_pipeline: QueryPipeline,
}

impl PhysicsWorld {
    pub fn new() -> Self {
        Self {
            gravity: vector![0.0, -9.81, 0.0],
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
        }
    }

    /// One engine step at the given (already sanitized) dt.
    pub fn step(&mut self, dt: Real) {
        self.pipeline.step(
            &self.gravity,
            &IntegrationParameters {
                dt,
                ..IntegrationParameters::default()
            },
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }

    /// Post-step sanity scan: count bodies with non-finite or absurd
    /// coordinates. The caller decides how to recover.
    pub fn diverged_bodies(&self) -> usize {
        self.bodies
            .iter()
            .filter(|(_, body)| {
                let p = body.translation();
                !p.x.is_finite()
                    || !p.y.is_finite()
                    || !p.z.is_finite()
                    || p.x.abs() > WORLD_BOUND
                    || p.y.abs() > WORLD_BOUND
                    || p.z.abs() > WORLD_BOUND
            })
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_world_steps_cleanly() {
        let mut world = PhysicsWorld::new();
        world.step(1.0 / 60.0);
        assert_eq!(world.diverged_bodies(), 0);
    }

    #[test]
    fn free_fall_under_gravity() {
        let mut world = PhysicsWorld::new();
        let h = world.bodies.insert(
            RigidBodyBuilder::dynamic()
                .translation(vector![0.0, 10.0, 0.0])
                .build(),
        );
        world.colliders.insert_with_parent(
            ColliderBuilder::ball(0.5).density(1.0).build(),
            h,
            &mut world.bodies,
        );

        for _ in 0..60 {
            world.step(1.0 / 60.0);
        }
        let y = world.bodies[h].translation().y;
        assert!(y < 7.0, "body did not fall: y = {y}");
    }
}
