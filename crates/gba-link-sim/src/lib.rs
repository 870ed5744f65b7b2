//! Host-side simulator for the GBA multiplayer link protocol.
//!
//! Wires up to four [`gba_link_core::LinkConnection`]s to a simulated cable,
//! runs a demo host program on each console and replays scripted scenarios
//! (unplugging, replugging, injected errors) from a TOML file.

/// Simulated link cable and per-console hardware.
pub mod cable;

/// Scenario file format and loading.
pub mod config;

/// Simulator errors.
pub mod error;

/// Demo host program run by each console.
pub mod host;

/// Scenario runner and end-of-run report.
pub mod scenario;

pub use config::SimConfig;
pub use error::SimError;
pub use scenario::{Report, Simulation};
