// ==============================================================================
// sim.rs — FRAME DRIVER / SIMULATION CONTEXT
// ------------------------------------------------------------------------------
// One explicit Simulation object owns the physics world, the terrain, the
// vehicle rig and the control state; the frame loop passes it around instead
// of reaching for globals.
//
// step_frame() is the only bridge between wall-clock time and simulation
// time: it sanitizes the incoming delta (NaN/non-positive -> default 1/60,
// clamp to 0.1 s against tab-backgrounding style pauses), runs the rig
// update, steps the engine once, and reports the outcome as a Result. A
// divergence after the step recovers by resetting the rig and surfaces as
// StepError so the driver can log and carry on. There is no fixed-timestep
// accumulator; one step per rendered frame, frame-rate-dependent by design.
// ==============================================================================

use log::{info, warn};
use rapier3d::prelude::*;

use crate::controls::{Controls, KeyAction, KeyMap};
use crate::error::StepError;
use crate::physics::PhysicsWorld;
use crate::terrain::{Terrain, TerrainConfig};
use crate::vehicle::{VehicleRig, BUGGY};

/// Substituted when the caller hands us a NaN or non-positive delta.
pub const DEFAULT_DT: f32 = 1.0 / 60.0;
/// Longest single step we are willing to take.
pub const MAX_FRAME_DT: f32 = 0.1;

/// Per-frame report handed back to the driver.
#[derive(Debug, Clone, Copy)]
pub struct FrameReport {
    pub tick: u64,
    pub dt: f32,
    pub steering_angle: f32,
    pub speed: f32,
}

pub struct Simulation {
    pub world: PhysicsWorld,
    pub terrain: Terrain,
    pub rig: VehicleRig,
    pub controls: Controls,
    keymap: KeyMap,
    reset_requested: bool,
    tick: u64,
}

/// NaN and non-positive deltas become DEFAULT_DT; everything is capped at
/// MAX_FRAME_DT.
pub fn sanitize_dt(raw: f32) -> f32 {
    let dt = if raw.is_finite() && raw > 0.0 { raw } else { DEFAULT_DT };
    dt.min(MAX_FRAME_DT)
}

impl Simulation {
    pub fn new(keymap: KeyMap, terrain_seed: u64) -> Self {
        let mut world = PhysicsWorld::new();

        let terrain = Terrain::generate(TerrainConfig::default(), terrain_seed);
        terrain.spawn(&mut world);

        let rig = VehicleRig::spawn(&mut world, vector![0.0, 1.0, 0.0], BUGGY);
        info!(
            "🚗 rig spawned: {} bodies, {} joints",
            world.bodies.len(),
            world.joints.len()
        );

        Self {
            world,
            terrain,
            rig,
            controls: Controls::default(),
            keymap,
            reset_requested: false,
            tick: 0,
        }
    }

    /// Key edge from any client. Unknown keys are ignored; the reset key
    /// takes effect on the next frame regardless of flag state.
    pub fn handle_key(&mut self, key: &str, down: bool) {
        match self.keymap.lookup(key) {
            Some(KeyAction::Flag(flag)) => self.controls.set(flag, down),
            Some(KeyAction::Reset) if down => self.reset_requested = true,
            _ => {}
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Advance the simulation by one frame.
    pub fn step_frame(&mut self, raw_dt: f32) -> Result<FrameReport, StepError> {
        let dt = sanitize_dt(raw_dt);
        if dt != raw_dt {
            warn!("frame dt {raw_dt} sanitized to {dt}");
        }
        self.tick += 1;

        if self.reset_requested {
            self.reset_requested = false;
            self.rig.reset(&mut self.world);
        }

        let (steering_angle, speed) = self.rig.update(&self.controls, dt, &mut self.world);

        self.world.step(dt);

        let diverged = self.world.diverged_bodies();
        if diverged > 0 {
            // Best effort: put the rig back in a valid pose before the next
            // frame, then tell the driver what happened.
            self.rig.reset(&mut self.world);
            return Err(StepError::Diverged { bodies: diverged });
        }

        Ok(FrameReport {
            tick: self.tick,
            dt,
            steering_angle,
            speed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dt_sanitation() {
        assert_eq!(sanitize_dt(1.0 / 60.0), 1.0 / 60.0);
        assert_eq!(sanitize_dt(f32::NAN), DEFAULT_DT);
        assert_eq!(sanitize_dt(-0.5), DEFAULT_DT);
        assert_eq!(sanitize_dt(0.0), DEFAULT_DT);
        assert_eq!(sanitize_dt(3.0), MAX_FRAME_DT);
    }

    #[test]
    fn simulation_settles_on_the_spawn_pad() {
        let mut sim = Simulation::new(KeyMap::standard().unwrap(), 1);
        for _ in 0..120 {
            sim.step_frame(1.0 / 60.0).unwrap();
        }
        let y = sim.world.bodies[sim.rig.chassis].translation().y;
        assert!(y > 0.0 && y < 2.0, "chassis did not settle: y = {y}");
    }

    #[test]
    fn reset_key_is_edge_triggered() {
        let mut sim = Simulation::new(KeyMap::standard().unwrap(), 1);
        sim.handle_key("w", true);
        assert!(sim.controls.forward);
        sim.handle_key("w", false);
        assert!(!sim.controls.forward);

        // keyup of 'r' does not request a reset
        sim.handle_key("r", false);
        assert!(!sim.reset_requested);
        sim.handle_key("r", true);
        assert!(sim.reset_requested);
    }
}
