use thiserror::Error;

/// Rejected link settings.
///
/// Only construction-time input can fail; the running protocol absorbs every
/// anomaly into its own state instead.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsError {
    #[error("invalid baud rate selector {0} (expected 0-3)")]
    InvalidBaudRate(u8),
    #[error("invalid timer id {0} (expected 0-3)")]
    InvalidTimerId(u8),
    #[error("queue capacity must be at least 1")]
    ZeroQueueCapacity,
}
