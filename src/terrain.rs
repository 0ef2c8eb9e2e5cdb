// ==============================================================================
// terrain.rs — PROCEDURAL GRID TERRAIN
// ------------------------------------------------------------------------------
// Generates a heightfield from a few seeded sine octaves, flattens a spawn
// pad around the origin, and inserts it as a single fixed collider. The
// height grid is also exported once to each render client so the browser can
// build the same mesh (the server never renders anything).
// ==============================================================================

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use nalgebra::DMatrix;
use rapier3d::prelude::*;
use serde::Serialize;

use crate::physics::{PhysicsWorld, GROUP_BUMPER, GROUP_CHASSIS, GROUP_TERRAIN, GROUP_WHEEL};

/// Sent once per client on connect.
#[derive(Clone, Serialize)]
pub struct TerrainMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub nx: usize,
    pub nz: usize,
    pub width: f32,
    pub depth: f32,
    /// Row-major, nz rows of nx samples.
    pub heights: Vec<f32>,
}

pub struct TerrainConfig {
    pub nx: usize,       // samples along x
    pub nz: usize,       // samples along z
    pub width: f32,      // meters
    pub depth: f32,      // meters
    pub amplitude: f32,  // meters, max bump height
    pub pad_radius: f32, // meters, flat circle around the spawn point
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            nx: 65,
            nz: 65,
            width: 200.0,
            depth: 200.0,
            amplitude: 1.2,
            pad_radius: 18.0,
        }
    }
}

struct Octave {
    amp: f32,
    fx: f32,
    fz: f32,
    px: f32,
    pz: f32,
}

pub struct Terrain {
    pub config: TerrainConfig,
    heights: Vec<f32>, // row-major [iz * nx + ix]
}

impl Terrain {
    pub fn generate(config: TerrainConfig, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);

        let octaves: Vec<Octave> = (0..4)
            .map(|i| Octave {
                amp: config.amplitude / (1.5f32.powi(i)),
                fx: rng.gen_range(0.02..0.08) * (i + 1) as f32,
                fz: rng.gen_range(0.02..0.08) * (i + 1) as f32,
                px: rng.gen_range(0.0..std::f32::consts::TAU),
                pz: rng.gen_range(0.0..std::f32::consts::TAU),
            })
            .collect();

        let mut heights = vec![0.0_f32; config.nx * config.nz];
        for iz in 0..config.nz {
            for ix in 0..config.nx {
                let x = -config.width * 0.5 + config.width * ix as f32 / (config.nx - 1) as f32;
                let z = -config.depth * 0.5 + config.depth * iz as f32 / (config.nz - 1) as f32;

                let mut h = 0.0;
                for o in &octaves {
                    h += o.amp * (o.fx * x + o.px).sin() * (o.fz * z + o.pz).cos();
                }

                // Smoothly flatten the spawn pad so the vehicle settles on
                // level ground before reaching the bumps.
                let d = (x * x + z * z).sqrt();
                h *= pad_fade(d, config.pad_radius);

                heights[iz * config.nx + ix] = h;
            }
        }

        Self { config, heights }
    }

    /// Height sample at grid indices (no interpolation).
    pub fn height_at(&self, ix: usize, iz: usize) -> f32 {
        self.heights[iz * self.config.nx + ix]
    }

    /// Insert the heightfield as a fixed body. Top of the spawn pad sits at
    /// y = 0, matching the chassis spawn convention.
    pub fn spawn(&self, world: &mut PhysicsWorld) -> RigidBodyHandle {
        let ground = world.bodies.insert(RigidBodyBuilder::fixed().build());

        let matrix = DMatrix::from_fn(self.config.nz, self.config.nx, |iz, ix| {
            self.heights[iz * self.config.nx + ix]
        });

        let collider = ColliderBuilder::heightfield(
            matrix,
            vector![self.config.width, 1.0, self.config.depth],
        )
        .collision_groups(InteractionGroups::new(
            GROUP_TERRAIN,
            GROUP_CHASSIS | GROUP_WHEEL | GROUP_BUMPER,
        ))
        .friction(1.2)
        .restitution(0.0)
        .build();

        world
            .colliders
            .insert_with_parent(collider, ground, &mut world.bodies);

        ground
    }

    pub fn to_message(&self) -> TerrainMessage {
        TerrainMessage {
            kind: "terrain",
            nx: self.config.nx,
            nz: self.config.nz,
            width: self.config.width,
            depth: self.config.depth,
            heights: self.heights.clone(),
        }
    }
}

/// 0 inside the pad, 1 past twice the pad radius, smoothstep in between.
fn pad_fade(dist: f32, pad_radius: f32) -> f32 {
    let t = ((dist - pad_radius) / pad_radius).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_pad_is_flat() {
        let t = Terrain::generate(TerrainConfig::default(), 7);
        let (cx, cz) = (t.config.nx / 2, t.config.nz / 2);
        for dz in 0..3 {
            for dx in 0..3 {
                let h = t.height_at(cx + dx, cz + dz);
                assert!(h.abs() < 1e-4, "pad sample not flat: {h}");
            }
        }
    }

    #[test]
    fn generation_is_deterministic() {
        let a = Terrain::generate(TerrainConfig::default(), 42);
        let b = Terrain::generate(TerrainConfig::default(), 42);
        assert_eq!(a.heights, b.heights);
    }

    #[test]
    fn bumps_stay_within_amplitude_bound() {
        let t = Terrain::generate(TerrainConfig::default(), 3);
        // 4 octaves of decaying amplitude: worst case ~2.6x the base.
        let bound = t.config.amplitude * 3.0;
        assert!(t.heights.iter().all(|h| h.abs() <= bound));
    }
}
