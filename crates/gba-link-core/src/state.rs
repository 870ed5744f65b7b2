use crate::queue::MessageQueue;
use crate::settings::{LINK_MAX_PLAYERS, LINK_NO_DATA};

/// Protocol bookkeeping for one link connection.
///
/// Owned by [`LinkConnection`](crate::LinkConnection); the connection is
/// responsible for guarding access from the interrupt reactions.
#[derive(Clone, Debug)]
pub struct LinkState {
    pub(crate) player_count: u8,
    pub(crate) current_player_id: u8,
    pub(crate) incoming: [MessageQueue; LINK_MAX_PLAYERS],
    pub(crate) outgoing: MessageQueue,
    /// `None` while a slot is offline, otherwise consecutive silent exchanges.
    pub(crate) timeouts: [Option<u32>; LINK_MAX_PLAYERS],
    /// Set by every completed exchange, cleared every frame.
    pub(crate) irq_flag: bool,
    /// Frames in a row without a completed exchange.
    pub(crate) irq_timeout: u32,
}

impl LinkState {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            player_count: 0,
            current_player_id: 0,
            incoming: std::array::from_fn(|_| MessageQueue::new(queue_capacity)),
            outgoing: MessageQueue::new(queue_capacity),
            timeouts: [None; LINK_MAX_PLAYERS],
            irq_flag: false,
            irq_timeout: 0,
        }
    }

    #[inline]
    pub fn player_count(&self) -> u8 {
        self.player_count
    }

    #[inline]
    pub fn current_player_id(&self) -> u8 {
        self.current_player_id
    }

    pub fn is_connected(&self) -> bool {
        self.player_count > 1 && self.current_player_id < self.player_count
    }

    pub fn has_message(&self, player_id: u8) -> bool {
        if player_id >= self.player_count {
            return false;
        }
        self.incoming
            .get(usize::from(player_id))
            .is_some_and(|q| !q.is_empty())
    }

    pub fn read_message(&mut self, player_id: u8) -> u16 {
        match self.incoming.get_mut(usize::from(player_id)) {
            Some(q) => q.pop(),
            None => LINK_NO_DATA,
        }
    }

    pub fn is_peer_online(&self, player_id: u8) -> bool {
        self.timeouts
            .get(usize::from(player_id))
            .is_some_and(|t| t.is_some())
    }

    pub fn pending_outgoing(&self) -> usize {
        self.outgoing.len()
    }

    pub fn reset(&mut self) {
        self.player_count = 0;
        self.current_player_id = 0;
        for (queue, timeout) in self.incoming.iter_mut().zip(self.timeouts.iter_mut()) {
            queue.clear();
            *timeout = None;
        }
        self.outgoing.clear();
        self.irq_flag = false;
        self.irq_timeout = 0;
    }
}
