use gba_link_core::{LINK_MAX_PLAYERS, LinkConnection, LinkTransport};

/// Host program running on one simulated console.
///
/// Every frame it queues one counter value and, while connected, drains the
/// queue of every player on the cable.
#[derive(Clone, Debug, Default)]
pub struct DemoHost {
    counter: u16,
    sent: u64,
    connected_frames: u64,
    received: [u64; LINK_MAX_PLAYERS],
    last_received: [Option<u16>; LINK_MAX_PLAYERS],
    out_of_order: u64,
}

impl DemoHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next payload in `1..=0xFFFE`, skipping both reserved words.
    fn next_payload(&mut self) -> u16 {
        self.counter = self.counter % 0xFFFE + 1;
        self.counter
    }

    pub fn update<T: LinkTransport>(&mut self, conn: &LinkConnection<T>) {
        let payload = self.next_payload();
        conn.send(payload);
        self.sent += 1;

        if !conn.is_connected() {
            return;
        }
        self.connected_frames += 1;

        for id in 0..conn.player_count() {
            while conn.has_message(id) {
                let value = conn.read_message(id);
                self.record(usize::from(id), value);
            }
        }
    }

    fn record(&mut self, id: usize, value: u16) {
        if let Some(last) = self.last_received[id] {
            // Ignore counter wrap-around.
            if value <= last && last - value < 0x8000 {
                self.out_of_order += 1;
            }
        }
        self.last_received[id] = Some(value);
        self.received[id] += 1;
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn connected_frames(&self) -> u64 {
        self.connected_frames
    }

    pub fn received(&self) -> &[u64; LINK_MAX_PLAYERS] {
        &self.received
    }

    pub fn last_received(&self) -> &[Option<u16>; LINK_MAX_PLAYERS] {
        &self.last_received
    }

    pub fn out_of_order(&self) -> u64 {
        self.out_of_order
    }
}
