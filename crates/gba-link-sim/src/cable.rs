//! A multiplayer link cable joining up to four simulated consoles.
//!
//! Each [`Node`] owns a [`LinkConnection`] and a shared handle on the same
//! [`RegisterFile`] the connection drives. The cable plays the hardware: it
//! runs every node's pacing timer, performs an exchange whenever the master
//! raises the start bit, and fires the serial and VBlank reactions.

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use gba_link_core::transport::{
    SIOCNT_ERROR, SIOCNT_IRQ, SIOCNT_READY, SIOCNT_SLAVE, SIOCNT_START,
};
use gba_link_core::{
    LINK_DISCONNECTED, LINK_MAX_PLAYERS, LinkConnection, LinkSettings, RegisterFile,
};
use log::trace;

use crate::error::SimError;

/// CPU cycles in one 59.73 Hz frame.
pub const CYCLES_PER_FRAME: u32 = 280_896;
/// Granularity of the simulation clock (one prescaler-1024 timer tick).
const TICK_CYCLES: u32 = 1024;

pub type SharedRegisters = Rc<RefCell<RegisterFile>>;

pub struct Node {
    regs: SharedRegisters,
    conn: LinkConnection<SharedRegisters>,
    plugged: bool,
    pending_error: bool,
    timer_cycles: u32,
}

impl Node {
    pub fn new(settings: LinkSettings) -> Self {
        let regs = RegisterFile::shared();
        let conn = LinkConnection::new(settings, Rc::clone(&regs));
        Self {
            regs,
            conn,
            plugged: true,
            pending_error: false,
            timer_cycles: 0,
        }
    }

    pub fn connection(&self) -> &LinkConnection<SharedRegisters> {
        &self.conn
    }

    pub fn registers(&self) -> Ref<'_, RegisterFile> {
        self.regs.borrow()
    }

    pub fn is_plugged(&self) -> bool {
        self.plugged
    }

    pub fn set_plugged(&mut self, plugged: bool) {
        self.plugged = plugged;
    }

    /// Flags a communication error on this node's next exchange.
    pub fn inject_error(&mut self) {
        self.pending_error = true;
    }

    fn in_multiplayer(&self) -> bool {
        self.plugged && self.regs.borrow().is_multiplayer()
    }

    fn advance_timer(&mut self, cycles: u32) -> u32 {
        let timer = *self.regs.borrow().timer(self.conn.settings().timer_id);
        if !timer.is_enabled() {
            self.timer_cycles = 0;
            return 0;
        }

        self.timer_cycles += cycles;
        let period = timer.period_cycles();
        let mut overflows = 0;
        while self.timer_cycles >= period {
            self.timer_cycles -= period;
            if timer.irq_enabled() {
                overflows += 1;
            }
        }
        overflows
    }
}

pub struct Cable {
    nodes: Vec<Node>,
    exchanges: u64,
}

impl Cable {
    pub fn new(node_count: usize, settings: &LinkSettings) -> Result<Self, SimError> {
        if !(1..=LINK_MAX_PLAYERS).contains(&node_count) {
            return Err(SimError::NodeCount(node_count));
        }
        let nodes = (0..node_count)
            .map(|_| Node::new(settings.clone()))
            .collect();
        Ok(Self {
            nodes,
            exchanges: 0,
        })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn node_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.nodes.get_mut(index)
    }

    /// Completed exchanges since the cable was built.
    pub fn exchanges(&self) -> u64 {
        self.exchanges
    }

    /// Runs one frame of hardware time, ending with VBlank on every node.
    pub fn run_frame(&mut self) {
        let mut remaining = CYCLES_PER_FRAME;
        while remaining > 0 {
            let step = remaining.min(TICK_CYCLES);
            self.tick(step);
            remaining -= step;
        }

        for node in &self.nodes {
            node.conn.on_vblank();
        }
    }

    fn tick(&mut self, cycles: u32) {
        self.refresh_status();

        for i in 0..self.nodes.len() {
            let overflows = self.nodes[i].advance_timer(cycles);
            for _ in 0..overflows {
                self.nodes[i].conn.on_timer();
                self.poll_exchange();
            }
        }
    }

    /// Nodes taking part in the next exchange, in slot order.
    fn participants(&self) -> Vec<usize> {
        (0..self.nodes.len())
            .filter(|&i| self.nodes[i].in_multiplayer())
            .collect()
    }

    /// Drives the hardware-owned SIOCNT bits: the first participant is the
    /// master, and the line is ready only when every plugged console is in
    /// multiplayer mode.
    fn refresh_status(&mut self) {
        let participants = self.participants();
        let all_ready = self
            .nodes
            .iter()
            .filter(|n| n.plugged)
            .all(|n| n.in_multiplayer());

        for (i, node) in self.nodes.iter().enumerate() {
            let slot = participants.iter().position(|&p| p == i);
            let mut regs = node.regs.borrow_mut();
            regs.set_hardware_bit(SIOCNT_READY, slot.is_some() && all_ready);
            regs.set_hardware_bit(SIOCNT_SLAVE, slot.is_some_and(|s| s > 0));
        }
    }

    fn poll_exchange(&mut self) {
        let participants = self.participants();
        let Some(&master) = participants.first() else {
            return;
        };
        {
            let regs = self.nodes[master].regs.borrow();
            if regs.siocnt & SIOCNT_START == 0 || regs.siocnt & SIOCNT_READY == 0 {
                return;
            }
        }

        let mut slots = [LINK_DISCONNECTED; LINK_MAX_PLAYERS];
        for (slot, &i) in participants.iter().enumerate() {
            slots[slot] = self.nodes[i].regs.borrow().siomlt_send;
        }
        trace!("exchange {}: {:04x?}", self.exchanges, slots);

        for (slot, &i) in participants.iter().enumerate() {
            let node = &mut self.nodes[i];
            let mut regs = node.regs.borrow_mut();
            regs.siomulti = slots;
            regs.set_player_id(slot as u8);
            regs.siocnt &= !SIOCNT_START;
            regs.set_hardware_bit(SIOCNT_ERROR, node.pending_error);
            node.pending_error = false;
        }
        self.exchanges += 1;

        for &i in &participants {
            let irq = self.nodes[i].regs.borrow().siocnt & SIOCNT_IRQ != 0;
            if irq {
                self.nodes[i].conn.on_serial();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Cable;
    use crate::error::SimError;
    use gba_link_core::LinkSettings;
    use gba_link_core::transport::{SIOCNT_READY, SIOCNT_SLAVE};

    fn activated(nodes: usize) -> Cable {
        let cable = Cable::new(nodes, &LinkSettings::default()).unwrap();
        for node in cable.nodes() {
            node.connection().activate();
        }
        cable
    }

    #[test]
    fn rejects_empty_or_oversized_cable() {
        let settings = LinkSettings::default();
        assert!(matches!(
            Cable::new(0, &settings),
            Err(SimError::NodeCount(0))
        ));
        assert!(matches!(
            Cable::new(5, &settings),
            Err(SimError::NodeCount(5))
        ));
    }

    #[test]
    fn inactive_consoles_never_exchange() {
        let mut cable = Cable::new(2, &LinkSettings::default()).unwrap();
        cable.run_frame();
        assert_eq!(cable.exchanges(), 0);
    }

    #[test]
    fn first_console_becomes_master() {
        let mut cable = activated(3);
        cable.run_frame();

        let siocnt: Vec<u16> = cable.nodes().iter().map(|n| n.registers().siocnt).collect();
        assert_eq!(siocnt[0] & SIOCNT_SLAVE, 0);
        assert_ne!(siocnt[1] & SIOCNT_SLAVE, 0);
        assert_ne!(siocnt[2] & SIOCNT_SLAVE, 0);
        assert!(siocnt.iter().all(|s| s & SIOCNT_READY != 0));
    }

    #[test]
    fn master_timer_paces_several_exchanges_per_frame() {
        let mut cable = activated(2);
        cable.run_frame();

        // 280896 cycles / (50 * 1024) cycles per transfer.
        assert_eq!(cable.exchanges(), 5);
        assert!(cable.nodes().iter().all(|n| n.connection().is_connected()));
        assert_eq!(cable.node(1).unwrap().connection().current_player_id(), 1);
    }

    #[test]
    fn unplugged_master_hands_over_to_next_console() {
        let mut cable = activated(3);
        cable.run_frame();
        cable.node_mut(0).unwrap().set_plugged(false);
        for _ in 0..4 {
            cable.run_frame();
        }

        let regs = cable.node(1).unwrap().registers();
        assert_eq!(regs.siocnt & SIOCNT_SLAVE, 0);
        drop(regs);
        let conn = cable.node(2).unwrap().connection();
        assert!(conn.is_connected());
        assert_eq!(conn.player_count(), 2);
        assert_eq!(conn.current_player_id(), 1);
    }
}
