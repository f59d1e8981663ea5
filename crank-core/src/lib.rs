#![no_std]

// Shared logic for the window crank controller.
//
// Everything here runs unchanged on the MCU firmware and the host emulator.
// Nothing allocates or touches a peripheral; the firmware and emulator crates
// supply the hardware seams.

pub mod config;
pub mod controller;
pub mod debounce;
pub mod display;
pub mod effects;
pub mod position;
pub mod remote;
pub mod scheduler;
pub mod telemetry;
pub mod time;
