// ==============================================================================
// drive_scenario.rs — FULL-RIG SCENARIOS THROUGH THE FRAME DRIVER
// ------------------------------------------------------------------------------
// End-to-end checks that run the real Simulation (terrain + rig + controls)
// for many frames at the nominal 60 Hz step, the same path the server loop
// takes. Unit behavior of the individual pieces lives next to each module;
// here we only assert whole-vehicle outcomes.
// ==============================================================================

use approx::assert_relative_eq;
use rapier3d::prelude::vector;

use bumper_physics_server::controls::KeyMap;
use bumper_physics_server::error::StepError;
use bumper_physics_server::sim::Simulation;

const DT: f32 = 1.0 / 60.0;
const SEED: u64 = 7;

fn fresh_sim() -> Simulation {
    Simulation::new(KeyMap::standard().unwrap(), SEED)
}

fn run(sim: &mut Simulation, frames: usize) {
    for _ in 0..frames {
        sim.step_frame(DT).unwrap();
    }
}

#[test]
fn holding_forward_drives_the_chassis_forward() {
    let mut sim = fresh_sim();

    // Let the rig settle onto the spawn pad before driving.
    run(&mut sim, 60);
    let start = *sim.world.bodies[sim.rig.chassis].translation();

    sim.handle_key("w", true);
    run(&mut sim, 120); // two simulated seconds

    let end = *sim.world.bodies[sim.rig.chassis].translation();
    assert!(
        end.x - start.x > 0.05,
        "expected forward (+x) displacement, got {}",
        end.x - start.x
    );
    // Still rolling on the pad, not airborne or buried.
    assert!(end.y > -1.0 && end.y < 3.0, "chassis y left the band: {}", end.y);
}

#[test]
fn braking_sheds_speed_faster_than_coasting() {
    let coast = {
        let mut sim = fresh_sim();
        run(&mut sim, 60);
        sim.handle_key("w", true);
        run(&mut sim, 180);
        sim.handle_key("w", false);
        run(&mut sim, 59);
        sim.step_frame(DT).unwrap().speed
    };

    let braked = {
        let mut sim = fresh_sim();
        run(&mut sim, 60);
        sim.handle_key("w", true);
        run(&mut sim, 180);
        sim.handle_key("w", false);
        sim.handle_key("space", true);
        run(&mut sim, 59);
        sim.step_frame(DT).unwrap().speed
    };

    assert!(
        braked < coast,
        "brake should slow the rig: braked = {braked}, coast = {coast}"
    );
}

#[test]
fn steering_reaches_the_clamp_and_recenters() {
    let mut sim = fresh_sim();
    run(&mut sim, 30);

    sim.handle_key("a", true);
    let mut angle = 0.0;
    for _ in 0..120 {
        let report = sim.step_frame(DT).unwrap();
        angle = report.steering_angle;
        assert!(angle.abs() <= sim.rig.config.max_steering_angle + 1e-6);
    }
    assert_relative_eq!(angle, sim.rig.config.max_steering_angle, epsilon = 1e-5);

    sim.handle_key("a", false);
    for _ in 0..120 {
        angle = sim.step_frame(DT).unwrap().steering_angle;
    }
    assert_eq!(angle, 0.0, "steering did not recenter");
}

#[test]
fn reset_restores_the_whole_rig_to_rest() {
    let mut sim = fresh_sim();

    // Drive and steer long enough that everything has moved and deformed.
    sim.handle_key("w", true);
    sim.handle_key("a", true);
    run(&mut sim, 240);

    let moved = sim.world.bodies[sim.rig.chassis].translation().x;
    assert!(moved.abs() > 0.01, "precondition: rig never moved");

    sim.rig.reset(&mut sim.world);

    let rest = *sim.world.bodies[sim.rig.chassis].translation();
    assert_relative_eq!(rest.x, 0.0, epsilon = 1e-5);
    assert_relative_eq!(rest.y, 1.0, epsilon = 1e-5);
    assert_relative_eq!(rest.z, 0.0, epsilon = 1e-5);
    assert_eq!(sim.world.bodies[sim.rig.chassis].linvel().magnitude(), 0.0);

    // Wheels sit exactly at chassis rest + their fixed local offsets.
    for wheel in &sim.rig.wheels {
        let p = sim.world.bodies[wheel.body].translation();
        assert_relative_eq!(p.x, rest.x + wheel.offset.x, epsilon = 1e-5);
        assert_relative_eq!(p.y, rest.y + wheel.offset.y, epsilon = 1e-5);
        assert_relative_eq!(p.z, rest.z + wheel.offset.z, epsilon = 1e-5);
        assert_eq!(sim.world.bodies[wheel.body].linvel().magnitude(), 0.0);
    }

    // Bumper particles back on their arc, motionless.
    for (&h, offset) in sim.rig.bumper.particles.iter().zip(sim.rig.bumper.rest_offsets()) {
        let p = sim.world.bodies[h].translation();
        assert_relative_eq!(p.x, rest.x + offset.x, epsilon = 1e-5);
        assert_relative_eq!(p.y, rest.y + offset.y, epsilon = 1e-5);
        assert_relative_eq!(p.z, rest.z + offset.z, epsilon = 1e-5);
        assert_eq!(sim.world.bodies[h].linvel().magnitude(), 0.0);
    }

    // And the rig keeps simulating cleanly afterwards.
    run(&mut sim, 60);
}

#[test]
fn divergence_surfaces_as_an_error_and_recovers() {
    let mut sim = fresh_sim();
    run(&mut sim, 10);

    // Teleport the chassis far outside the world bound.
    sim.world
        .bodies
        .get_mut(sim.rig.chassis)
        .unwrap()
        .set_translation(rapier3d::prelude::vector![5000.0, 1.0, 0.0], true);

    match sim.step_frame(DT) {
        Err(StepError::Diverged { bodies }) => assert!(bodies > 0),
        other => panic!("expected divergence, got {other:?}"),
    }

    // The failed step already put the rig back; the next frames are normal.
    let p = *sim.world.bodies[sim.rig.chassis].translation();
    assert_relative_eq!(p.x, 0.0, epsilon = 1e-5);
    run(&mut sim, 30);
}
