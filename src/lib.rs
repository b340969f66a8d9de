// ABOUTME: Library root for guardian-angel — exposes the gate, config, and errors for hosts and tests.
// ABOUTME: The `guardian` binary in main.rs drives the same library from the command line.

pub mod config;
pub mod error;
pub mod gate;
