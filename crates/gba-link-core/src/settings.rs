use crate::error::SettingsError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of hardware slots in one multiplayer exchange.
pub const LINK_MAX_PLAYERS: usize = 4;
/// Slot value meaning "nobody is plugged into this slot".
pub const LINK_DISCONNECTED: u16 = 0xFFFF;
/// Slot value meaning "present, but nothing to say this exchange".
pub const LINK_NO_DATA: u16 = 0x0000;

/// Returns whether `value` is one of the two reserved protocol words.
#[inline]
pub const fn is_reserved(value: u16) -> bool {
    value == LINK_NO_DATA || value == LINK_DISCONNECTED
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
/// Multiplayer baud rate, in the order of the SIOCNT baud field.
pub enum BaudRate {
    #[cfg_attr(feature = "serde", serde(rename = "9600"))]
    Bps9600,
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "38400"))]
    Bps38400,
    #[cfg_attr(feature = "serde", serde(rename = "57600"))]
    Bps57600,
    #[cfg_attr(feature = "serde", serde(rename = "115200"))]
    Bps115200,
}

impl BaudRate {
    /// Value of the two-bit SIOCNT baud field.
    #[inline]
    pub const fn bits(self) -> u16 {
        match self {
            BaudRate::Bps9600 => 0,
            BaudRate::Bps38400 => 1,
            BaudRate::Bps57600 => 2,
            BaudRate::Bps115200 => 3,
        }
    }

    pub const fn bits_per_second(self) -> u32 {
        match self {
            BaudRate::Bps9600 => 9600,
            BaudRate::Bps38400 => 38400,
            BaudRate::Bps57600 => 57600,
            BaudRate::Bps115200 => 115200,
        }
    }
}

impl TryFrom<u8> for BaudRate {
    type Error = SettingsError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(BaudRate::Bps9600),
            1 => Ok(BaudRate::Bps38400),
            2 => Ok(BaudRate::Bps57600),
            3 => Ok(BaudRate::Bps115200),
            other => Err(SettingsError::InvalidBaudRate(other)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "u8", into = "u8")
)]
/// Hardware timer used to pace master transmissions.
pub enum TimerId {
    Timer0,
    Timer1,
    Timer2,
    #[default]
    Timer3,
}

impl TimerId {
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            TimerId::Timer0 => 0,
            TimerId::Timer1 => 1,
            TimerId::Timer2 => 2,
            TimerId::Timer3 => 3,
        }
    }
}

impl TryFrom<u8> for TimerId {
    type Error = SettingsError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TimerId::Timer0),
            1 => Ok(TimerId::Timer1),
            2 => Ok(TimerId::Timer2),
            3 => Ok(TimerId::Timer3),
            other => Err(SettingsError::InvalidTimerId(other)),
        }
    }
}

impl From<TimerId> for u8 {
    fn from(id: TimerId) -> Self {
        id.index() as u8
    }
}

/// Immutable configuration of a [`LinkConnection`](crate::LinkConnection).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(default, rename_all = "kebab-case")
)]
pub struct LinkSettings {
    pub baud_rate: BaudRate,
    /// Frames without a completed exchange before the connection is reset.
    pub silence_timeout: u32,
    /// Consecutive `0xFFFF` exchanges before a player is marked offline.
    pub remote_timeout: u32,
    /// Messages each queue retains (per player, and outgoing).
    pub queue_capacity: usize,
    /// Timer ticks (1024 cycles, ~61us each) between master transmissions.
    pub interval: u16,
    pub timer_id: TimerId,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            baud_rate: BaudRate::Bps38400,
            silence_timeout: 3,
            remote_timeout: 5,
            queue_capacity: 30,
            interval: 50,
            timer_id: TimerId::Timer3,
        }
    }
}

impl LinkSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.queue_capacity == 0 {
            return Err(SettingsError::ZeroQueueCapacity);
        }
        Ok(())
    }
}
