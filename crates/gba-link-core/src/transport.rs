use std::cell::RefCell;
use std::rc::Rc;

use crate::settings::{LINK_DISCONNECTED, LINK_MAX_PLAYERS, TimerId};

// SIOCNT bits in multiplayer mode.
pub const SIOCNT_BAUD_MASK: u16 = 0b11;
pub const SIOCNT_SLAVE: u16 = 1 << 2;
pub const SIOCNT_READY: u16 = 1 << 3;
pub const SIOCNT_ID_SHIFT: u16 = 4;
pub const SIOCNT_ID_MASK: u16 = 0b11 << SIOCNT_ID_SHIFT;
pub const SIOCNT_ERROR: u16 = 1 << 6;
pub const SIOCNT_START: u16 = 1 << 7;
pub const SIOCNT_MULTIPLAYER: u16 = 1 << 13;
pub const SIOCNT_IRQ: u16 = 1 << 14;

/// SIOCNT bits driven by the link hardware; software writes leave them alone.
pub const SIOCNT_HARDWARE_BITS: u16 = SIOCNT_SLAVE | SIOCNT_READY | SIOCNT_ID_MASK | SIOCNT_ERROR;

// RCNT bits selecting between serial and general-purpose mode.
pub const RCNT_GENERAL_PURPOSE_LOW: u16 = 1 << 14;
pub const RCNT_GENERAL_PURPOSE_HIGH: u16 = 1 << 15;

// TMxCNT_H bits.
pub const TIMER_FREQ_1024: u16 = 0b11;
pub const TIMER_IRQ: u16 = 1 << 6;
pub const TIMER_ENABLE: u16 = 1 << 7;

/// Register-level access to the link port and the pacing timers.
///
/// Implemented by the real memory-mapped registers on hardware, and by
/// [`RegisterFile`] (optionally shared through `Rc<RefCell<_>>`) when the
/// protocol runs against a simulated cable.
pub trait LinkTransport {
    /// SIOCNT: serial control/status.
    fn read_siocnt(&self) -> u16;
    fn write_siocnt(&mut self, value: u16);

    /// SIOMULTI0..3: word received from each slot in the last exchange.
    fn read_siomulti(&self, slot: usize) -> u16;

    /// SIOMLT_SEND: word transmitted in the next exchange.
    fn write_siomlt_send(&mut self, value: u16);

    /// RCNT: serial / general-purpose mode select.
    fn read_rcnt(&self) -> u16;
    fn write_rcnt(&mut self, value: u16);

    /// TMxCNT_L: timer reload value.
    fn write_timer_reload(&mut self, timer: TimerId, reload: u16);

    /// TMxCNT_H: timer control.
    fn read_timer_control(&self, timer: TimerId) -> u16;
    fn write_timer_control(&mut self, timer: TimerId, value: u16);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimerRegisters {
    pub reload: u16,
    pub control: u16,
}

impl TimerRegisters {
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.control & TIMER_ENABLE != 0
    }

    #[inline]
    pub fn irq_enabled(&self) -> bool {
        self.control & TIMER_IRQ != 0
    }

    /// CPU cycles between overflows at the configured prescaler.
    pub fn period_cycles(&self) -> u32 {
        let prescaler = match self.control & 0b11 {
            0 => 1,
            1 => 64,
            2 => 256,
            _ => 1024,
        };
        (0x1_0000 - self.reload as u32) * prescaler
    }
}

/// Plain in-memory copy of the link and timer registers.
///
/// SIOCNT writes keep [`SIOCNT_HARDWARE_BITS`] as they were, like the real
/// register does; the hardware side sets those bits through the public
/// fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterFile {
    pub siocnt: u16,
    pub siomulti: [u16; LINK_MAX_PLAYERS],
    pub siomlt_send: u16,
    pub rcnt: u16,
    pub timers: [TimerRegisters; 4],
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self {
            siocnt: 0,
            siomulti: [LINK_DISCONNECTED; LINK_MAX_PLAYERS],
            siomlt_send: 0,
            rcnt: 0,
            timers: [TimerRegisters::default(); 4],
        }
    }
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Multiplayer mode is active: RCNT selects serial and SIOCNT bit 13 is set.
    pub fn is_multiplayer(&self) -> bool {
        self.rcnt & RCNT_GENERAL_PURPOSE_HIGH == 0 && self.siocnt & SIOCNT_MULTIPLAYER != 0
    }

    pub fn is_general_purpose(&self) -> bool {
        self.rcnt & RCNT_GENERAL_PURPOSE_HIGH != 0 && self.rcnt & RCNT_GENERAL_PURPOSE_LOW == 0
    }

    pub fn set_hardware_bit(&mut self, bit: u16, high: bool) {
        if high {
            self.siocnt |= bit;
        } else {
            self.siocnt &= !bit;
        }
    }

    pub fn set_player_id(&mut self, id: u8) {
        self.siocnt = (self.siocnt & !SIOCNT_ID_MASK)
            | ((u16::from(id) << SIOCNT_ID_SHIFT) & SIOCNT_ID_MASK);
    }

    pub fn timer(&self, timer: TimerId) -> &TimerRegisters {
        &self.timers[timer.index()]
    }
}

impl LinkTransport for RegisterFile {
    fn read_siocnt(&self) -> u16 {
        self.siocnt
    }

    fn write_siocnt(&mut self, value: u16) {
        self.siocnt = (value & !SIOCNT_HARDWARE_BITS) | (self.siocnt & SIOCNT_HARDWARE_BITS);
    }

    fn read_siomulti(&self, slot: usize) -> u16 {
        self.siomulti
            .get(slot)
            .copied()
            .unwrap_or(LINK_DISCONNECTED)
    }

    fn write_siomlt_send(&mut self, value: u16) {
        self.siomlt_send = value;
    }

    fn read_rcnt(&self) -> u16 {
        self.rcnt
    }

    fn write_rcnt(&mut self, value: u16) {
        self.rcnt = value;
    }

    fn write_timer_reload(&mut self, timer: TimerId, reload: u16) {
        self.timers[timer.index()].reload = reload;
    }

    fn read_timer_control(&self, timer: TimerId) -> u16 {
        self.timers[timer.index()].control
    }

    fn write_timer_control(&mut self, timer: TimerId, value: u16) {
        self.timers[timer.index()].control = value;
    }
}

/// Lets the hardware side of a simulation keep a handle on the same registers
/// the connection drives.
impl<T: LinkTransport> LinkTransport for Rc<RefCell<T>> {
    fn read_siocnt(&self) -> u16 {
        self.borrow().read_siocnt()
    }

    fn write_siocnt(&mut self, value: u16) {
        self.borrow_mut().write_siocnt(value)
    }

    fn read_siomulti(&self, slot: usize) -> u16 {
        self.borrow().read_siomulti(slot)
    }

    fn write_siomlt_send(&mut self, value: u16) {
        self.borrow_mut().write_siomlt_send(value)
    }

    fn read_rcnt(&self) -> u16 {
        self.borrow().read_rcnt()
    }

    fn write_rcnt(&mut self, value: u16) {
        self.borrow_mut().write_rcnt(value)
    }

    fn write_timer_reload(&mut self, timer: TimerId, reload: u16) {
        self.borrow_mut().write_timer_reload(timer, reload)
    }

    fn read_timer_control(&self, timer: TimerId) -> u16 {
        self.borrow().read_timer_control(timer)
    }

    fn write_timer_control(&mut self, timer: TimerId, value: u16) {
        self.borrow_mut().write_timer_control(timer, value)
    }
}
