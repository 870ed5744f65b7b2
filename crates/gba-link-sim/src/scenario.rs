use std::fmt;

use gba_link_core::{LINK_MAX_PLAYERS, ResetReason};
use log::info;

use crate::cable::Cable;
use crate::config::{EventAction, SimConfig};
use crate::error::SimError;
use crate::host::DemoHost;

/// A cable of consoles, one demo host per console, and the scripted events
/// of a scenario.
pub struct Simulation {
    config: SimConfig,
    cable: Cable,
    hosts: Vec<DemoHost>,
    frame: u64,
}

impl Simulation {
    /// Builds the cable and activates every console's connection.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        let cable = Cable::new(config.nodes, &config.link)?;
        for node in cable.nodes() {
            node.connection().activate();
        }
        let hosts = vec![DemoHost::new(); config.nodes];
        Ok(Self {
            config,
            cable,
            hosts,
            frame: 0,
        })
    }

    pub fn cable(&self) -> &Cable {
        &self.cable
    }

    pub fn host(&self, index: usize) -> Option<&DemoHost> {
        self.hosts.get(index)
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Runs one frame: scripted events, host main loops, then hardware time.
    pub fn step(&mut self) {
        self.apply_events();

        for (host, node) in self.hosts.iter_mut().zip(self.cable.nodes()) {
            host.update(node.connection());
        }

        self.cable.run_frame();
        self.frame += 1;
    }

    /// Runs until the configured frame count and reports the final state.
    pub fn run(&mut self) -> Report {
        while self.frame < self.config.frames {
            self.step();
        }
        self.report()
    }

    fn apply_events(&mut self) {
        let frame = self.frame;
        let events: Vec<_> = self.config.events_at(frame).cloned().collect();
        for event in events {
            let Some(node) = self.cable.node_mut(event.node) else {
                continue;
            };
            info!("frame {frame}: node {} {:?}", event.node, event.action);
            match event.action {
                EventAction::Unplug => node.set_plugged(false),
                EventAction::Plug => node.set_plugged(true),
                EventAction::Error => node.inject_error(),
                EventAction::Deactivate => node.connection().deactivate(),
                EventAction::Activate => node.connection().activate(),
            }
        }
    }

    pub fn report(&self) -> Report {
        let nodes = self
            .cable
            .nodes()
            .iter()
            .zip(&self.hosts)
            .enumerate()
            .map(|(index, (node, host))| {
                let conn = node.connection();
                NodeReport {
                    index,
                    plugged: node.is_plugged(),
                    active: conn.is_active(),
                    connected: conn.is_connected(),
                    player_count: conn.player_count(),
                    player_id: conn.current_player_id(),
                    sent: host.sent(),
                    connected_frames: host.connected_frames(),
                    received: *host.received(),
                    out_of_order: host.out_of_order(),
                    resets: conn.reset_count(),
                    last_reset: conn.last_reset(),
                }
            })
            .collect();

        Report {
            frames: self.frame,
            exchanges: self.cable.exchanges(),
            nodes,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeReport {
    pub index: usize,
    pub plugged: bool,
    pub active: bool,
    pub connected: bool,
    pub player_count: u8,
    pub player_id: u8,
    pub sent: u64,
    pub connected_frames: u64,
    pub received: [u64; LINK_MAX_PLAYERS],
    pub out_of_order: u64,
    pub resets: u32,
    pub last_reset: Option<ResetReason>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    pub frames: u64,
    pub exchanges: u64,
    pub nodes: Vec<NodeReport>,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} frames, {} exchanges", self.frames, self.exchanges)?;
        writeln!(
            f,
            "node plugged active connected players id    sent  conn-frames  received[0..4]               ooo resets last-reset"
        )?;
        for n in &self.nodes {
            let last_reset = match n.last_reset {
                Some(reason) => format!("{reason:?}"),
                None => "-".to_string(),
            };
            writeln!(
                f,
                "{:>4} {:>7} {:>6} {:>9} {:>7} {:>2} {:>7} {:>12}  {:>6} {:>6} {:>6} {:>6}  {:>4} {:>6} {}",
                n.index,
                n.plugged,
                n.active,
                n.connected,
                n.player_count,
                n.player_id,
                n.sent,
                n.connected_frames,
                n.received[0],
                n.received[1],
                n.received[2],
                n.received[3],
                n.out_of_order,
                n.resets,
                last_reset,
            )?;
        }
        Ok(())
    }
}
