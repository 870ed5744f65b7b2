use std::cell::{Cell, RefCell};

use log::{debug, info, trace};

use crate::settings::{
    LINK_DISCONNECTED, LINK_MAX_PLAYERS, LINK_NO_DATA, LinkSettings, is_reserved,
};
use crate::state::LinkState;
use crate::transport::{
    LinkTransport, RCNT_GENERAL_PURPOSE_HIGH, RCNT_GENERAL_PURPOSE_LOW, SIOCNT_ERROR,
    SIOCNT_ID_MASK, SIOCNT_ID_SHIFT, SIOCNT_IRQ, SIOCNT_MULTIPLAYER, SIOCNT_READY, SIOCNT_SLAVE,
    SIOCNT_START, TIMER_ENABLE, TIMER_FREQ_1024, TIMER_IRQ,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Why the connection last went through a full reset.
pub enum ResetReason {
    /// [`LinkConnection::activate`] was called.
    Activation,
    /// The port reported not-ready or a communication error after an exchange.
    HardwareFault,
    /// No exchange completed for `silence_timeout` frames.
    SilenceTimeout,
}

struct Inner<T> {
    state: LinkState,
    transport: T,
}

impl<T: LinkTransport> Inner<T> {
    #[inline]
    fn siocnt_bit(&self, bit: u16) -> bool {
        self.transport.read_siocnt() & bit != 0
    }

    fn is_ready(&self) -> bool {
        self.siocnt_bit(SIOCNT_READY)
    }

    fn has_error(&self) -> bool {
        self.siocnt_bit(SIOCNT_ERROR)
    }

    fn is_master(&self) -> bool {
        !self.siocnt_bit(SIOCNT_SLAVE)
    }

    fn is_sending(&self) -> bool {
        self.siocnt_bit(SIOCNT_START)
    }

    fn assigned_player_id(&self) -> u8 {
        ((self.transport.read_siocnt() & SIOCNT_ID_MASK) >> SIOCNT_ID_SHIFT) as u8
    }

    fn set_siocnt_bit(&mut self, bit: u16) {
        let value = self.transport.read_siocnt() | bit;
        self.transport.write_siocnt(value);
    }

    fn transfer(&mut self, data: u16) {
        self.transport.write_siomlt_send(data);
        if self.is_master() {
            self.set_siocnt_bit(SIOCNT_START);
        }
    }

    fn send_pending_data(&mut self) {
        let data = self.state.outgoing.pop();
        trace!("transfer {data:#06x}");
        self.transfer(data);
    }

    fn stop(&mut self, settings: &LinkSettings) {
        let timer = settings.timer_id;
        let control = self.transport.read_timer_control(timer);
        self.transport.write_timer_control(timer, control & !TIMER_ENABLE);

        // Back to general-purpose mode: SI/SO idle.
        let rcnt = self.transport.read_rcnt();
        self.transport
            .write_rcnt((rcnt & !RCNT_GENERAL_PURPOSE_LOW) | RCNT_GENERAL_PURPOSE_HIGH);
    }

    fn start(&mut self, settings: &LinkSettings) {
        let timer = settings.timer_id;
        self.transport
            .write_timer_reload(timer, 0u16.wrapping_sub(settings.interval));
        self.transport
            .write_timer_control(timer, TIMER_ENABLE | TIMER_IRQ | TIMER_FREQ_1024);

        let rcnt = self.transport.read_rcnt();
        self.transport.write_rcnt(rcnt & !RCNT_GENERAL_PURPOSE_HIGH);
        self.transport.write_siocnt(settings.baud_rate.bits());
        self.transport.write_siomlt_send(LINK_NO_DATA);
        self.set_siocnt_bit(SIOCNT_MULTIPLAYER);
        self.set_siocnt_bit(SIOCNT_IRQ);
    }
}

/// Reliable per-player message channel over the multiplayer link port.
///
/// The three `on_*` reactions are meant to be called from the VBlank, timer
/// and serial interrupt handlers. Everything else is called from the main
/// program. All mutable state sits behind a single [`RefCell`]: a reaction
/// that finds it borrowed (the main program was interrupted mid-call) skips
/// its work for that invocation instead of waiting.
pub struct LinkConnection<T: LinkTransport> {
    settings: LinkSettings,
    enabled: Cell<bool>,
    inner: RefCell<Inner<T>>,
    reset_count: Cell<u32>,
    last_reset: Cell<Option<ResetReason>>,
}

impl<T: LinkTransport> LinkConnection<T> {
    /// Allocates the message queues and parks the port in general-purpose
    /// mode. The connection starts inactive; call [`activate`](Self::activate).
    pub fn new(settings: LinkSettings, transport: T) -> Self {
        let mut inner = Inner {
            state: LinkState::new(settings.queue_capacity),
            transport,
        };
        inner.stop(&settings);

        Self {
            settings,
            enabled: Cell::new(false),
            inner: RefCell::new(inner),
            reset_count: Cell::new(0),
            last_reset: Cell::new(None),
        }
    }

    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    pub fn is_active(&self) -> bool {
        self.enabled.get()
    }

    pub fn activate(&self) {
        let Ok(mut inner) = self.inner.try_borrow_mut() else {
            debug!("activate skipped: connection busy");
            return;
        };
        self.reset(&mut inner, ResetReason::Activation);
        self.enabled.set(true);
    }

    pub fn deactivate(&self) {
        self.enabled.set(false);
        let Ok(mut inner) = self.inner.try_borrow_mut() else {
            debug!("deactivate could not reach the port: connection busy");
            return;
        };
        let was_connected = inner.state.is_connected();
        inner.state.reset();
        inner.stop(&self.settings);
        if was_connected {
            info!("link disconnected (deactivated)");
        }
    }

    /// Queues `data` for transmission. The reserved words `0x0000` and
    /// `0xFFFF` are silently ignored.
    pub fn send(&self, data: u16) {
        if is_reserved(data) {
            return;
        }
        if let Ok(mut inner) = self.inner.try_borrow_mut() {
            inner.state.outgoing.push(data);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner
            .try_borrow()
            .is_ok_and(|inner| inner.state.is_connected())
    }

    pub fn has_message(&self, player_id: u8) -> bool {
        self.inner
            .try_borrow()
            .is_ok_and(|inner| inner.state.has_message(player_id))
    }

    /// Pops the oldest message from `player_id`, or `0x0000` if there is none.
    pub fn read_message(&self, player_id: u8) -> u16 {
        match self.inner.try_borrow_mut() {
            Ok(mut inner) => inner.state.read_message(player_id),
            Err(_) => LINK_NO_DATA,
        }
    }

    pub fn player_count(&self) -> u8 {
        self.inner
            .try_borrow()
            .map_or(0, |inner| inner.state.player_count())
    }

    pub fn current_player_id(&self) -> u8 {
        self.inner
            .try_borrow()
            .map_or(0, |inner| inner.state.current_player_id())
    }

    pub fn is_peer_online(&self, player_id: u8) -> bool {
        self.inner
            .try_borrow()
            .is_ok_and(|inner| inner.state.is_peer_online(player_id))
    }

    /// Messages waiting in the outgoing queue.
    pub fn pending_outgoing(&self) -> usize {
        self.inner
            .try_borrow()
            .map_or(0, |inner| inner.state.pending_outgoing())
    }

    /// Number of full resets since construction.
    pub fn reset_count(&self) -> u32 {
        self.reset_count.get()
    }

    pub fn last_reset(&self) -> Option<ResetReason> {
        self.last_reset.get()
    }

    /// VBlank reaction: counts frames that saw no completed exchange.
    pub fn on_vblank(&self) {
        if !self.enabled.get() {
            return;
        }
        let Ok(mut inner) = self.inner.try_borrow_mut() else {
            return;
        };
        let state = &mut inner.state;
        if !state.irq_flag {
            state.irq_timeout = state.irq_timeout.saturating_add(1);
        }
        state.irq_flag = false;
    }

    /// Timer reaction: enforces the silence timeout and, on the master, starts
    /// the next exchange.
    pub fn on_timer(&self) {
        if !self.enabled.get() {
            return;
        }
        let Ok(mut inner) = self.inner.try_borrow_mut() else {
            return;
        };

        if inner.state.irq_timeout >= self.settings.silence_timeout {
            self.reset(&mut inner, ResetReason::SilenceTimeout);
            return;
        }

        if inner.is_master() && inner.is_ready() && !inner.is_sending() {
            inner.send_pending_data();
        }
    }

    /// Serial reaction: consumes one completed 4-slot exchange.
    pub fn on_serial(&self) {
        if !self.enabled.get() {
            return;
        }
        let Ok(mut inner) = self.inner.try_borrow_mut() else {
            return;
        };

        if !inner.is_ready() || inner.has_error() {
            self.reset(&mut inner, ResetReason::HardwareFault);
            return;
        }

        let was_connected = inner.state.is_connected();
        let own_slot = usize::from(inner.state.current_player_id);
        let mut new_player_count = 0u8;

        inner.state.irq_flag = true;
        inner.state.irq_timeout = 0;

        for slot in 0..LINK_MAX_PLAYERS {
            let data = inner.transport.read_siomulti(slot);
            let state = &mut inner.state;

            if data != LINK_DISCONNECTED {
                if data != LINK_NO_DATA && slot != own_slot {
                    state.incoming[slot].push(data);
                }
                state.timeouts[slot] = Some(0);
                new_player_count += 1;
            } else if let Some(silent) = state.timeouts[slot] {
                let silent = silent.saturating_add(1);
                if silent >= self.settings.remote_timeout {
                    debug!("player {slot} timed out after {silent} silent exchanges");
                    state.incoming[slot].clear();
                    state.timeouts[slot] = None;
                } else {
                    state.timeouts[slot] = Some(silent);
                    new_player_count += 1;
                }
            }
        }

        inner.state.player_count = new_player_count;
        inner.state.current_player_id = inner.assigned_player_id();

        let is_connected = inner.state.is_connected();
        if is_connected != was_connected {
            if is_connected {
                info!(
                    "link connected: {} players, local id {}",
                    inner.state.player_count, inner.state.current_player_id
                );
            } else {
                info!("link disconnected ({} players left)", new_player_count);
            }
        }

        if !inner.is_master() {
            inner.send_pending_data();
        }
    }

    fn reset(&self, inner: &mut Inner<T>, reason: ResetReason) {
        if inner.state.is_connected() {
            info!("link disconnected ({reason:?})");
        }
        debug!("full link reset: {reason:?}");

        inner.state.reset();
        inner.stop(&self.settings);
        inner.start(&self.settings);

        self.reset_count.set(self.reset_count.get().wrapping_add(1));
        self.last_reset.set(Some(reason));
    }
}

impl<T: LinkTransport> Drop for LinkConnection<T> {
    fn drop(&mut self) {
        let settings = &self.settings;
        self.inner.get_mut().stop(settings);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::{LinkConnection, ResetReason};
    use crate::settings::{LINK_NO_DATA, LinkSettings};
    use crate::transport::{RegisterFile, SIOCNT_READY, SIOCNT_START};

    type Shared = Rc<RefCell<RegisterFile>>;

    fn active_master() -> (Shared, LinkConnection<Shared>) {
        let regs = RegisterFile::shared();
        regs.borrow_mut().set_hardware_bit(SIOCNT_READY, true);
        let conn = LinkConnection::new(LinkSettings::default(), Rc::clone(&regs));
        conn.activate();
        (regs, conn)
    }

    #[test]
    fn timer_reaction_skips_while_main_program_holds_the_state() {
        let (regs, conn) = active_master();
        conn.send(0x0042);

        {
            let _held = conn.inner.borrow_mut();
            conn.on_timer();
        }
        assert_eq!(regs.borrow().siocnt & SIOCNT_START, 0);
        assert_eq!(conn.pending_outgoing(), 1);

        // Next invocation runs normally.
        conn.on_timer();
        assert_ne!(regs.borrow().siocnt & SIOCNT_START, 0);
        assert_eq!(regs.borrow().siomlt_send, 0x0042);
    }

    #[test]
    fn vblank_reaction_skips_while_guarded() {
        let (_regs, conn) = active_master();

        {
            let _held = conn.inner.borrow();
            conn.on_vblank();
            conn.on_vblank();
        }
        assert_eq!(conn.inner.borrow().state.irq_timeout, 0);

        conn.on_vblank();
        assert_eq!(conn.inner.borrow().state.irq_timeout, 1);
    }

    #[test]
    fn serial_reaction_skips_while_guarded() {
        let (regs, conn) = active_master();
        regs.borrow_mut().siomulti = [0x0001, 0x0002, 0xFFFF, 0xFFFF];

        {
            let _held = conn.inner.borrow_mut();
            conn.on_serial();
        }
        assert_eq!(conn.player_count(), 0);

        conn.on_serial();
        assert_eq!(conn.player_count(), 2);
    }

    #[test]
    fn reentrant_api_calls_degrade_to_nothing() {
        let (_regs, conn) = active_master();
        conn.inner.borrow_mut().state.player_count = 2;
        conn.inner.borrow_mut().state.incoming[1].push(0x0077);

        let held = conn.inner.borrow_mut();
        conn.send(0x0100);
        assert_eq!(conn.read_message(1), LINK_NO_DATA);
        assert!(!conn.has_message(1));
        assert!(!conn.is_connected());
        drop(held);

        assert_eq!(conn.pending_outgoing(), 0);
        assert!(conn.has_message(1));
        assert_eq!(conn.read_message(1), 0x0077);
    }

    #[test]
    fn activation_is_recorded_as_a_reset() {
        let (_regs, conn) = active_master();
        assert_eq!(conn.reset_count(), 1);
        assert_eq!(conn.last_reset(), Some(ResetReason::Activation));
    }
}
