//! Core control loop and device drivers for the Line-Trace Bot on no-std
//! embedded platforms.
//!
//! For a runnable host-side session, see the `mock-rig` binary in this
//! workspace.
#![no_std]

pub mod utils;
