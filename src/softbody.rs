// ==============================================================================
// softbody.rs — MASS-SPRING BUMPER
// ------------------------------------------------------------------------------
// A ring of point masses in front of the chassis, connected pairwise by
// damped springs. The spring graph is FULLY connected — every unordered
// particle pair gets one spring, O(n²) in the particle count. n = 8 here, so
// 28 springs; nearest-neighbor-only would change the deformation behavior.
//
// Each particle is also tethered to its rest point in chassis-local space.
// rapier impulse joints have no yield force, so the tether is a stiff damped
// spring to the chassis anchor rather than a hard point-to-point joint: the
// cluster resists global drift but still deforms under collision.
//
// Spring rest lengths are measured once at creation and never recomputed,
// reset() included. Forces are applied as equal-and-opposite impulse pairs
// (F * dt) each step, collected first and applied after the read pass.
// ==============================================================================

use rapier3d::prelude::*;

use crate::physics::{PhysicsWorld, GROUP_BUMPER, GROUP_TERRAIN};

#[derive(Debug, Clone, Copy)]
pub struct SoftBodyParams {
    pub total_mass: f32,       // kg, split evenly across particles
    pub stiffness: f32,        // N/m, inter-particle springs
    pub damping: f32,          // N*s/m, inter-particle springs
    pub tether_stiffness: f32, // N/m, pull back to the chassis anchor
    pub tether_damping: f32,   // N*s/m
    pub particle_radius: f32,  // meters
}

impl Default for SoftBodyParams {
    fn default() -> Self {
        Self {
            total_mass: 16.0,
            stiffness: 600.0,
            damping: 8.0,
            tether_stiffness: 1_400.0,
            tether_damping: 30.0,
            particle_radius: 0.09,
        }
    }
}

/// One damped spring between particles `a` and `b`. Rest length is the
/// distance between the two particles at creation time.
#[derive(Debug, Clone, Copy)]
pub struct Spring {
    pub a: usize,
    pub b: usize,
    pub rest_length: f32,
}

pub struct SoftBumper {
    chassis: RigidBodyHandle,
    pub particles: Vec<RigidBodyHandle>,
    pub springs: Vec<Spring>,
    /// Chassis-local rest offsets, fixed at creation.
    rest_offsets: Vec<Vector<Real>>,
    pub params: SoftBodyParams,
}

/// Rest positions along a parametrized arc in front of the chassis
/// (chassis-local, +X forward). `nose_x` is the arc center, `bulge` how far
/// the middle protrudes, `half_span` the lateral reach of the end particles.
pub fn bumper_arc(count: usize, nose_x: f32, y: f32, half_span: f32, bulge: f32) -> Vec<Vector<Real>> {
    let phi_max = 1.0_f32; // radians swept to each side
    (0..count)
        .map(|i| {
            let t = i as f32 / (count - 1) as f32;
            let phi = -phi_max + 2.0 * phi_max * t;
            vector![
                nose_x + bulge * phi.cos(),
                y,
                half_span * phi.sin() / phi_max.sin()
            ]
        })
        .collect()
}

impl SoftBumper {
    /// Build particles + full spring graph from chassis-local rest positions.
    /// The chassis body must already exist; its current pose places the
    /// particles in the world.
    pub fn create(
        world: &mut PhysicsWorld,
        chassis: RigidBodyHandle,
        rest_offsets: Vec<Vector<Real>>,
        params: SoftBodyParams,
    ) -> Self {
        let n = rest_offsets.len();
        let mass = params.total_mass / n as f32;
        let volume = 4.0 / 3.0 * std::f32::consts::PI * params.particle_radius.powi(3);
        let density = mass / volume;

        let chassis_pos = *world.bodies[chassis].position();

        let mut particles = Vec::with_capacity(n);
        for offset in &rest_offsets {
            let wp = chassis_pos * Point::from(*offset);
            let body = RigidBodyBuilder::dynamic()
                .translation(wp.coords)
                .linear_damping(0.05)
                .ccd_enabled(true)
                .build();
            let handle = world.bodies.insert(body);

            let collider = ColliderBuilder::ball(params.particle_radius)
                .collision_groups(InteractionGroups::new(GROUP_BUMPER, GROUP_TERRAIN))
                .density(density)
                .friction(0.6)
                .restitution(0.0)
                .build();
            world
                .colliders
                .insert_with_parent(collider, handle, &mut world.bodies);

            particles.push(handle);
        }

        // Full graph: one spring per unordered pair, rest length measured now.
        let mut springs = Vec::with_capacity(n * (n - 1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                springs.push(Spring {
                    a: i,
                    b: j,
                    rest_length: (rest_offsets[j] - rest_offsets[i]).magnitude(),
                });
            }
        }

        Self {
            chassis,
            particles,
            springs,
            rest_offsets,
            params,
        }
    }

    /// One force pass: inter-particle spring-dampers plus chassis tethers.
    /// Impulses (F * dt) are collected during the read pass and applied after,
    /// since two particles of a pair can't be borrowed mutably at once.
    pub fn apply_forces(&self, world: &mut PhysicsWorld, dt: Real) {
        let n = self.particles.len();
        let mut positions = Vec::with_capacity(n);
        let mut velocities = Vec::with_capacity(n);
        for &h in &self.particles {
            let body = &world.bodies[h];
            positions.push(*body.translation());
            velocities.push(*body.linvel());
        }

        let mut impulses = vec![Vector::zeros(); n];

        for s in &self.springs {
            let delta = positions[s.b] - positions[s.a];
            let len = delta.magnitude();
            if len < 1e-6 {
                continue;
            }
            let dir = delta / len;

            // F = k * (len - rest) + c * (relative speed along the axis);
            // positive pulls the pair together.
            let separating = (velocities[s.b] - velocities[s.a]).dot(&dir);
            let force = self.params.stiffness * (len - s.rest_length)
                + self.params.damping * separating;

            let j = dir * (force * dt);
            impulses[s.a] += j;
            impulses[s.b] -= j;
        }

        // Tethers: pull each particle toward its chassis-local rest point,
        // with the reaction applied to the chassis at the anchor.
        let chassis_pose = *world.bodies[self.chassis].position();
        let mut chassis_impulses: Vec<(Vector<Real>, Point<Real>)> = Vec::with_capacity(n);
        {
            let chassis = &world.bodies[self.chassis];
            for (i, offset) in self.rest_offsets.iter().enumerate() {
                let anchor = chassis_pose * Point::from(*offset);
                let anchor_vel = chassis.velocity_at_point(&anchor);

                let delta = anchor.coords - positions[i];
                let relvel = velocities[i] - anchor_vel;

                let force = delta * self.params.tether_stiffness
                    - relvel * self.params.tether_damping;
                let j = force * dt;

                impulses[i] += j;
                chassis_impulses.push((-j, anchor));
            }
        }

        for (i, &h) in self.particles.iter().enumerate() {
            if let Some(body) = world.bodies.get_mut(h) {
                body.apply_impulse(impulses[i], true);
            }
        }
        if let Some(chassis) = world.bodies.get_mut(self.chassis) {
            for (j, at) in chassis_impulses {
                chassis.apply_impulse_at_point(j, at, true);
            }
        }
    }

    /// Reposition every particle from the chassis rest pose and its original
    /// offset, and zero velocities. The spring network is never rebuilt.
    pub fn reset(&self, world: &mut PhysicsWorld, rest_position: Vector<Real>, rest_rotation: Rotation<Real>) {
        for (&h, offset) in self.particles.iter().zip(&self.rest_offsets) {
            if let Some(body) = world.bodies.get_mut(h) {
                body.set_translation(rest_position + rest_rotation * offset, true);
                body.set_rotation(Rotation::identity(), true);
                body.set_linvel(vector![0.0, 0.0, 0.0], true);
                body.set_angvel(vector![0.0, 0.0, 0.0], true);
            }
        }
    }

    pub fn rest_offsets(&self) -> &[Vector<Real>] {
        &self.rest_offsets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bumper_in_world() -> (PhysicsWorld, SoftBumper, RigidBodyHandle) {
        let mut world = PhysicsWorld::new();
        let chassis = world.bodies.insert(
            RigidBodyBuilder::dynamic()
                .translation(vector![0.0, 1.0, 0.0])
                .build(),
        );
        let arc = bumper_arc(8, 2.1, -0.15, 1.0, 0.35);
        let bumper = SoftBumper::create(&mut world, chassis, arc, SoftBodyParams::default());
        (world, bumper, chassis)
    }

    #[test]
    fn full_graph_has_pairwise_springs() {
        let (_, bumper, _) = bumper_in_world();
        assert_eq!(bumper.particles.len(), 8);
        assert_eq!(bumper.springs.len(), 8 * 7 / 2);
    }

    #[test]
    fn rest_lengths_match_creation_distances() {
        let (world, bumper, _) = bumper_in_world();
        for s in &bumper.springs {
            let pa = world.bodies[bumper.particles[s.a]].translation();
            let pb = world.bodies[bumper.particles[s.b]].translation();
            assert_relative_eq!((pb - pa).magnitude(), s.rest_length, epsilon = 1e-5);
        }
    }

    #[test]
    fn arc_is_symmetric_and_forward() {
        let arc = bumper_arc(8, 2.1, -0.15, 1.0, 0.35);
        for (a, b) in arc.iter().zip(arc.iter().rev()) {
            assert_relative_eq!(a.z, -b.z, epsilon = 1e-5);
            assert_relative_eq!(a.x, b.x, epsilon = 1e-5);
        }
        assert!(arc.iter().all(|p| p.x > 2.1));
    }

    #[test]
    fn reset_restores_offsets_and_kills_velocity() {
        let (mut world, bumper, _) = bumper_in_world();

        // Shove the particles around.
        for &h in &bumper.particles {
            let body = world.bodies.get_mut(h).unwrap();
            body.set_translation(vector![9.0, 9.0, 9.0], true);
            body.set_linvel(vector![3.0, -1.0, 2.0], true);
        }

        let rest_pos = vector![0.0, 1.0, 0.0];
        bumper.reset(&mut world, rest_pos, Rotation::identity());

        for (&h, offset) in bumper.particles.iter().zip(bumper.rest_offsets()) {
            let body = &world.bodies[h];
            let expect = rest_pos + offset;
            assert_relative_eq!(body.translation().x, expect.x, epsilon = 1e-6);
            assert_relative_eq!(body.translation().y, expect.y, epsilon = 1e-6);
            assert_relative_eq!(body.translation().z, expect.z, epsilon = 1e-6);
            assert_eq!(body.linvel().magnitude(), 0.0);
        }

        // Rest lengths untouched by reset.
        for s in &bumper.springs {
            let d = (bumper.rest_offsets()[s.b] - bumper.rest_offsets()[s.a]).magnitude();
            assert_relative_eq!(d, s.rest_length, epsilon = 1e-6);
        }
    }

    #[test]
    fn stretched_spring_pulls_pair_together() {
        let (mut world, bumper, _) = bumper_in_world();

        // Pull the first particle a meter forward of its rest position.
        let h0 = bumper.particles[0];
        let p0 = *world.bodies[h0].translation();
        world
            .bodies
            .get_mut(h0)
            .unwrap()
            .set_translation(p0 + vector![1.0, 0.0, 0.0], true);

        bumper.apply_forces(&mut world, 1.0 / 60.0);

        // The displaced particle should pick up velocity back toward the rest
        // of the cluster (negative x).
        let v = world.bodies[h0].linvel();
        assert!(v.x < 0.0, "expected restoring impulse, got {v:?}");
    }
}
