//! Utility re-exports for the Line-Trace Bot.
//!
//! This module re-exports the control loop, timing, and math components:
//!
//! - `controllers`: capability seams, the per-cycle control loop, and the
//!   concrete drivers for the sensor array, motors, buttons, and display
//! - `math`: the steering law and differential-drive wheel allocation

pub mod controllers;
pub mod math;

pub use controllers::LineFollower;
pub use embassy_time::*;
pub use math::drive::DifferentialDrive;
pub use math::steering::SteeringLaw;
