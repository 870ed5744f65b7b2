//! GBA multiplayer link protocol driver.
//!
//! Turns the raw 4-slot multiplayer serial exchange into a per-player message
//! channel: presence tracking for up to four consoles, bounded inbound queues
//! per player, master-paced outbound transmission and automatic recovery
//! from desync or prolonged silence.
//!
//! The register transport is injected through [`transport::LinkTransport`];
//! interrupt wiring and the host application live outside this crate and drive
//! the [`connection`] facade.

/// Connection controller and its interrupt reactions.
pub mod connection;

/// Construction-time errors.
pub mod error;

/// Fixed-capacity drop-oldest message queue.
pub mod queue;

/// Link configuration and reserved protocol words.
pub mod settings;

/// Per-connection protocol bookkeeping.
pub mod state;

/// Register-level hardware seam and an in-memory register file.
pub mod transport;

pub use connection::{LinkConnection, ResetReason};
pub use error::SettingsError;
pub use settings::{
    BaudRate, LINK_DISCONNECTED, LINK_MAX_PLAYERS, LINK_NO_DATA, LinkSettings, TimerId,
};
pub use transport::{LinkTransport, RegisterFile};
