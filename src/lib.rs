//! Soft-bumper vehicle physics server.
//!
//! A headless driving demo: one vehicle rig (chassis, four hinged wheels,
//! point-to-point suspension) with a mass-spring soft-body front bumper,
//! rolling over a procedurally generated heightfield. rapier3d does all the
//! collision detection and integration; this crate only configures it and
//! streams body transforms to render clients over WebSocket.

pub mod controls;
pub mod error;
pub mod net;
pub mod physics;
pub mod sim;
pub mod softbody;
pub mod state;
pub mod terrain;
pub mod vehicle;
