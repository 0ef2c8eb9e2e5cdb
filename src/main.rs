use std::sync::Arc;
use std::time::Instant;

use log::{info, warn};
use tokio::sync::Mutex;
use tokio::time::{interval, Duration};

use bumper_physics_server::controls::KeyMap;
use bumper_physics_server::net::start_websocket_server;
use bumper_physics_server::sim::Simulation;
use bumper_physics_server::state::{build_snapshot, SharedState};

const LISTEN_ADDR: &str = "0.0.0.0:9001";
const TERRAIN_SEED: u64 = 2026;

#[tokio::main]
async fn main() {
    env_logger::init();
    info!("🚀 starting soft-bumper physics server");

    let keymap = KeyMap::standard().expect("invalid key bindings");
    let sim = Arc::new(Mutex::new(Simulation::new(keymap, TERRAIN_SEED)));
    let state = Arc::new(Mutex::new(SharedState::new()));

    tokio::spawn(start_websocket_server(
        LISTEN_ADDR.to_string(),
        Arc::clone(&state),
        Arc::clone(&sim),
    ));

    // One simulation step per tick; the step itself clamps the measured
    // delta, so a stalled ticker cannot blow up the integration.
    let mut ticker = interval(Duration::from_millis(16));
    let mut last = Instant::now();

    loop {
        ticker.tick().await;
        let dt = last.elapsed().as_secs_f32();
        last = Instant::now();

        let mut sim = sim.lock().await;
        match sim.step_frame(dt) {
            Ok(report) => {
                let snapshot = build_snapshot(&sim, &report);
                drop(sim);

                match serde_json::to_string(&snapshot) {
                    Ok(json) => state.lock().await.broadcast(&json),
                    Err(e) => warn!("snapshot serialization failed: {e}"),
                }
            }
            Err(e) => {
                // Skip this frame's snapshot; the rig was already recovered.
                warn!("step failed: {e}");
            }
        }
    }
}
