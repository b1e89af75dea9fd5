//! bootkit command line.
//!
//! The binary in `main.rs` parses [`cli::Cli`], initialises [`tracing`] and
//! dispatches to [`commands`]. Everything below is a library so the command
//! implementations can be tested without spawning the binary.

pub mod cli;
pub mod commands;
pub mod progress;
pub mod tracing;
