// ==============================================================================
// state.rs — CLIENT REGISTRY + SNAPSHOTS (SERVER -> RENDERER)
// ------------------------------------------------------------------------------
// The render side is an external WebSocket client; once per frame it gets a
// JSON snapshot of every tracked transform (chassis, wheels, bumper
// particles) plus the realized steering angle and speed. This is the only
// place simulation state is copied toward presentation.
// ==============================================================================

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::sim::{FrameReport, Simulation};

#[derive(Clone, Serialize)]
pub struct Pose {
    pub pos: [f32; 3],
    pub rot: [f32; 4], // quaternion [i, j, k, w]
}

#[derive(Clone, Serialize)]
pub struct Snapshot {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub tick: u64,
    pub steering_angle: f32,
    pub speed: f32,
    pub chassis: Pose,
    pub wheels: Vec<Pose>,
    /// Particles are spheres; orientation is irrelevant to the renderer.
    pub bumper: Vec<[f32; 3]>,
}

pub struct SharedState {
    clients: Vec<UnboundedSender<String>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self { clients: Vec::new() }
    }

    pub fn register_client(&mut self, tx: UnboundedSender<String>) {
        self.clients.push(tx);
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Send to every live client, dropping the ones that went away.
    pub fn broadcast(&mut self, json: &str) {
        self.clients.retain(|tx| tx.send(json.to_string()).is_ok());
    }
}

fn pose_of(sim: &Simulation, handle: rapier3d::prelude::RigidBodyHandle) -> Pose {
    let iso = sim.world.bodies[handle].position();
    Pose {
        pos: [
            iso.translation.vector.x,
            iso.translation.vector.y,
            iso.translation.vector.z,
        ],
        rot: [
            iso.rotation.i,
            iso.rotation.j,
            iso.rotation.k,
            iso.rotation.w,
        ],
    }
}

/// Copy every tracked body's transform into one serializable snapshot.
pub fn build_snapshot(sim: &Simulation, report: &FrameReport) -> Snapshot {
    let wheels = sim.rig.wheels.iter().map(|w| pose_of(sim, w.body)).collect();

    let bumper = sim
        .rig
        .bumper
        .particles
        .iter()
        .map(|&h| {
            let p = sim.world.bodies[h].translation();
            [p.x, p.y, p.z]
        })
        .collect();

    Snapshot {
        kind: "snapshot",
        tick: report.tick,
        steering_angle: report.steering_angle,
        speed: report.speed,
        chassis: pose_of(sim, sim.rig.chassis),
        wheels,
        bumper,
    }
}
