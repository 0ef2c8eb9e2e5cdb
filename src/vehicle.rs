// ==============================================================================
// vehicle.rs — VEHICLE RIG (CHASSIS + WHEELS + JOINTS + ACTUATION)
// ------------------------------------------------------------------------------
// Composes one chassis body, four wheel bodies, and two joints per wheel:
// - a revolute hinge about the lateral (Z) axis for rolling
// - a spherical point-to-point joint as the suspension attachment; its
//   chassis-local anchor never changes after creation
//
// Axes: +X forward, +Y up, +Z lateral. Wheels 0,1 are front, 2,3 rear.
//
// Actuation:
// - steering: rate-limited scalar angle, applied to both front wheels by
//   rotating the hinge axis and rewriting the wheel orientation as
//   steer ∘ rest in the chassis frame
// - drive: direct force injection on the rear wheels along each wheel's
//   current local +X, applied as an impulse (F * dt) at the wheel center —
//   no torque-driven wheel-slip model
// - brake: transient damping injection on the rear wheels for the frames the
//   key is held, restored to rolling values otherwise
//
// reset() repositions and zeroes velocities; bodies and joints are created
// once and never rebuilt. If the chassis falls below the sanity floor the
// rig resets itself instead of surfacing an error.
// ==============================================================================

use log::warn;
use nalgebra::UnitQuaternion;
use rapier3d::prelude::*;

use crate::controls::Controls;
use crate::physics::{PhysicsWorld, GROUP_CHASSIS, GROUP_TERRAIN, GROUP_WHEEL};
use crate::softbody::{bumper_arc, SoftBodyParams, SoftBumper};

pub struct VehicleConfig {
    pub chassis_mass: f32,              // kg
    pub chassis_half_extents: [f32; 3], // [hx, hy, hz] meters
    pub chassis_com_offset: [f32; 3],   // local; negative y lowers the COM
    pub linear_damping: f32,
    pub angular_damping: f32,

    pub wheel_mass: f32,       // kg
    pub wheel_radius: f32,     // meters
    pub wheel_half_width: f32, // meters
    /// Chassis-local wheel centers; 0,1 front / 2,3 rear.
    pub wheel_offsets: [[f32; 3]; 4],

    pub max_force: f32,      // N, rear-wheel drive force
    pub reverse_factor: f32, // reverse penalty on max_force

    pub max_steering_angle: f32,    // rad
    pub steering_speed: f32,        // rad/s toward the held side
    pub steering_return_speed: f32, // rad/s back to center

    pub brake_angular_damping: f32,
    pub brake_linear_damping: f32,
    pub roll_angular_damping: f32,
    pub roll_linear_damping: f32,

    pub sanity_floor_y: f32, // below this the rig resets itself
}

pub const BUGGY: VehicleConfig = VehicleConfig {
    chassis_mass: 1500.0,
    chassis_half_extents: [2.1, 0.35, 1.0],
    chassis_com_offset: [0.0, -0.25, 0.0],
    linear_damping: 0.05,
    angular_damping: 0.5,

    wheel_mass: 40.0,
    wheel_radius: 0.35,
    wheel_half_width: 0.15,
    wheel_offsets: [
        [1.4, -0.45, -0.9], // FL
        [1.4, -0.45, 0.9],  // FR
        [-1.4, -0.45, -0.9], // RL
        [-1.4, -0.45, 0.9],  // RR
    ],

    max_force: 500.0,
    reverse_factor: 0.5,

    max_steering_angle: 0.5,
    steering_speed: 2.0,
    steering_return_speed: 3.0,

    brake_angular_damping: 0.95,
    brake_linear_damping: 0.9,
    roll_angular_damping: 0.1,
    roll_linear_damping: 0.05,

    sanity_floor_y: -20.0,
};

pub struct WheelUnit {
    pub body: RigidBodyHandle,
    pub hinge: ImpulseJointHandle,
    pub suspension: ImpulseJointHandle,
    pub offset: Vector<Real>, // chassis-local center, fixed at creation
    pub is_front: bool,
}

pub struct VehicleRig {
    pub chassis: RigidBodyHandle,
    pub wheels: Vec<WheelUnit>,
    pub bumper: SoftBumper,
    pub config: VehicleConfig,

    steering_angle: f32,
    rest_position: Vector<Real>,
    rest_rotation: Rotation<Real>,
}

/// Rate-limited steering integration. Left adds, right subtracts; with
/// neither held the angle decays toward zero and never overshoots sign.
/// Always clamped to ±max_steering_angle.
pub fn integrate_steering(angle: f32, left: bool, right: bool, dt: f32, config: &VehicleConfig) -> f32 {
    let mut a = angle;
    if left {
        a += config.steering_speed * dt;
    }
    if right {
        a -= config.steering_speed * dt;
    }
    if !left && !right {
        let decay = (config.steering_return_speed * dt).min(a.abs());
        a -= decay * a.signum();
    }
    a.clamp(-config.max_steering_angle, config.max_steering_angle)
}

/// Drive force along the wheel's local +X: +max while forward is held,
/// reverse-penalized negative while backward is held, zero otherwise.
pub fn engine_force(controls: &Controls, config: &VehicleConfig) -> f32 {
    if controls.forward {
        config.max_force
    } else if controls.backward {
        -config.max_force * config.reverse_factor
    } else {
        0.0
    }
}

fn box_inertia(mass: f32, half_extents: [f32; 3]) -> Vector<Real> {
    let (x, y, z) = (
        2.0 * half_extents[0],
        2.0 * half_extents[1],
        2.0 * half_extents[2],
    );
    vector![
        mass / 12.0 * (y * y + z * z),
        mass / 12.0 * (x * x + z * z),
        mass / 12.0 * (x * x + y * y)
    ]
}

impl VehicleRig {
    /// Build the whole rig at a world-space spawn position. Bodies, colliders
    /// and joints are created once; reset() only repositions them.
    pub fn spawn(world: &mut PhysicsWorld, position: Vector<Real>, config: VehicleConfig) -> Self {
        let [cx, cy, cz] = config.chassis_com_offset;

        let chassis_rb = RigidBodyBuilder::dynamic()
            .translation(position)
            .linear_damping(config.linear_damping)
            .angular_damping(config.angular_damping)
            .additional_mass_properties(MassProperties::new(
                point![cx, cy, cz],
                config.chassis_mass,
                box_inertia(config.chassis_mass, config.chassis_half_extents),
            ))
            .ccd_enabled(true)
            .build();
        let chassis = world.bodies.insert(chassis_rb);

        let [hx, hy, hz] = config.chassis_half_extents;
        let chassis_collider = ColliderBuilder::cuboid(hx, hy, hz)
            .collision_groups(InteractionGroups::new(GROUP_CHASSIS, GROUP_TERRAIN))
            .density(0.0) // mass comes from the explicit MassProperties
            .friction(0.3)
            .restitution(0.0)
            .build();
        world
            .colliders
            .insert_with_parent(chassis_collider, chassis, &mut world.bodies);

        let wheel_volume = std::f32::consts::PI
            * config.wheel_radius
            * config.wheel_radius
            * 2.0
            * config.wheel_half_width;
        let wheel_density = config.wheel_mass / wheel_volume;

        let mut wheels = Vec::with_capacity(4);
        for (i, raw) in config.wheel_offsets.iter().enumerate() {
            let offset = vector![raw[0], raw[1], raw[2]];

            let wheel_rb = RigidBodyBuilder::dynamic()
                .translation(position + offset)
                .linear_damping(config.roll_linear_damping)
                .angular_damping(config.roll_angular_damping)
                .ccd_enabled(true)
                .build();
            let body = world.bodies.insert(wheel_rb);

            // Cylinder axis is local Y; rotate the collider 90° about X so
            // the wheel rolls about the lateral Z axis.
            let wheel_collider =
                ColliderBuilder::cylinder(config.wheel_half_width, config.wheel_radius)
                    .rotation(vector![std::f32::consts::FRAC_PI_2, 0.0, 0.0])
                    .collision_groups(InteractionGroups::new(GROUP_WHEEL, GROUP_TERRAIN))
                    .density(wheel_density)
                    .friction(1.5)
                    .restitution(0.0)
                    .build();
            world
                .colliders
                .insert_with_parent(wheel_collider, body, &mut world.bodies);

            let hinge = world.joints.insert(
                chassis,
                body,
                RevoluteJointBuilder::new(Vector::z_axis())
                    .local_anchor1(Point::from(offset))
                    .local_anchor2(point![0.0, 0.0, 0.0])
                    .build(),
                true,
            );

            // Point-to-point suspension attachment; the chassis-side anchor
            // is fixed for the lifetime of the rig. It shares its anchors
            // with the hinge, so the mount is rigid: there is no suspension
            // travel, compliance comes from the contact solver alone.
            let suspension = world.joints.insert(
                chassis,
                body,
                SphericalJointBuilder::new()
                    .local_anchor1(Point::from(offset))
                    .local_anchor2(point![0.0, 0.0, 0.0])
                    .build(),
                true,
            );

            wheels.push(WheelUnit {
                body,
                hinge,
                suspension,
                offset,
                is_front: i < 2,
            });
        }

        let arc = bumper_arc(8, hx + 0.45, -0.15, hz, 0.35);
        let bumper = SoftBumper::create(world, chassis, arc, SoftBodyParams::default());

        Self {
            chassis,
            wheels,
            bumper,
            config,
            steering_angle: 0.0,
            rest_position: position,
            rest_rotation: Rotation::identity(),
        }
    }

    pub fn steering_angle(&self) -> f32 {
        self.steering_angle
    }

    /// One control tick: steering, drive, brake, bumper springs. Returns the
    /// realized (steering angle, chassis speed) pair.
    pub fn update(&mut self, controls: &Controls, dt: Real, world: &mut PhysicsWorld) -> (f32, f32) {
        // Fallen through the terrain: recover, don't report.
        let chassis_y = world.bodies[self.chassis].translation().y;
        if chassis_y < self.config.sanity_floor_y {
            warn!("chassis at y = {chassis_y:.1}, below sanity floor; resetting rig");
            self.reset(world);
            return (0.0, 0.0);
        }

        self.steering_angle =
            integrate_steering(self.steering_angle, controls.left, controls.right, dt, &self.config);

        // Front wheels: steer the hinge axis and rewrite the orientation as
        // steer ∘ rest, both expressed in the chassis frame.
        let chassis_rot = *world.bodies[self.chassis].rotation();
        let steer_rot = UnitQuaternion::from_axis_angle(&Vector::y_axis(), self.steering_angle);
        for wheel in self.wheels.iter().filter(|w| w.is_front) {
            if let Some(joint) = world.joints.get_mut(wheel.hinge) {
                joint.data.set_local_axis1(steer_rot * Vector::z_axis());
            }
            if let Some(body) = world.bodies.get_mut(wheel.body) {
                body.set_rotation(chassis_rot * steer_rot * self.rest_rotation, true);
            }
        }

        // Rear wheels: drive force + brake damping.
        let force = engine_force(controls, &self.config);
        let (ang_damp, lin_damp) = if controls.brake {
            (self.config.brake_angular_damping, self.config.brake_linear_damping)
        } else {
            (self.config.roll_angular_damping, self.config.roll_linear_damping)
        };

        for wheel in self.wheels.iter().filter(|w| !w.is_front) {
            if let Some(body) = world.bodies.get_mut(wheel.body) {
                body.set_angular_damping(ang_damp);
                body.set_linear_damping(lin_damp);

                if force != 0.0 {
                    // World-space drive direction = wheel orientation applied
                    // to local +X, spin included.
                    let dir = body.rotation() * vector![1.0, 0.0, 0.0];
                    body.apply_impulse(dir * (force * dt), true);
                }
            }
        }

        self.bumper.apply_forces(world, dt);

        let speed = world.bodies[self.chassis].linvel().magnitude();
        (self.steering_angle, speed)
    }

    /// Reposition chassis, wheels and bumper to the rest configuration and
    /// zero all velocities. Nothing is destroyed or recreated.
    pub fn reset(&mut self, world: &mut PhysicsWorld) {
        self.steering_angle = 0.0;

        if let Some(chassis) = world.bodies.get_mut(self.chassis) {
            chassis.set_translation(self.rest_position, true);
            chassis.set_rotation(self.rest_rotation, true);
            chassis.set_linvel(vector![0.0, 0.0, 0.0], true);
            chassis.set_angvel(vector![0.0, 0.0, 0.0], true);
        }

        for wheel in &self.wheels {
            if let Some(joint) = world.joints.get_mut(wheel.hinge) {
                joint.data.set_local_axis1(Vector::z_axis());
            }
            if let Some(body) = world.bodies.get_mut(wheel.body) {
                body.set_translation(self.rest_position + wheel.offset, true);
                body.set_rotation(self.rest_rotation, true);
                body.set_linvel(vector![0.0, 0.0, 0.0], true);
                body.set_angvel(vector![0.0, 0.0, 0.0], true);
                body.set_angular_damping(self.config.roll_angular_damping);
                body.set_linear_damping(self.config.roll_linear_damping);
            }
        }

        self.bumper.reset(world, self.rest_position, self.rest_rotation);
    }
}
