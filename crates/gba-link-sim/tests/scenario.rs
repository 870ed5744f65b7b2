//! End-to-end scenarios: several consoles running the link protocol over the
//! simulated cable, with scripted plug/unplug/error events.

use gba_link_core::{LinkSettings, ResetReason};
use gba_link_sim::config::{self, EventAction, ScenarioEvent};
use gba_link_sim::{SimConfig, Simulation};

fn scenario(nodes: usize, frames: u64, events: Vec<ScenarioEvent>) -> SimConfig {
    SimConfig {
        nodes,
        frames,
        link: LinkSettings::default(),
        events,
    }
}

fn event(frame: u64, node: usize, action: EventAction) -> ScenarioEvent {
    ScenarioEvent {
        frame,
        node,
        action,
    }
}

#[test]
fn two_consoles_exchange_one_message_per_frame() {
    let mut sim = Simulation::new(scenario(2, 120, Vec::new())).unwrap();
    let report = sim.run();

    assert_eq!(report.frames, 120);
    let (master, slave) = (&report.nodes[0], &report.nodes[1]);

    assert!(master.connected && slave.connected);
    assert_eq!(master.player_count, 2);
    assert_eq!((master.player_id, slave.player_id), (0, 1));
    assert!(master.received[1] >= 100, "master got {:?}", master.received);
    assert!(slave.received[0] >= 100, "slave got {:?}", slave.received);
    assert_eq!(master.received[0], 0);
    assert_eq!(master.out_of_order + slave.out_of_order, 0);
    assert_eq!((master.resets, slave.resets), (1, 1));
}

#[test]
fn four_consoles_all_see_each_other() {
    let mut sim = Simulation::new(scenario(4, 60, Vec::new())).unwrap();
    let report = sim.run();

    for (i, node) in report.nodes.iter().enumerate() {
        assert!(node.connected);
        assert_eq!(node.player_count, 4);
        assert_eq!(usize::from(node.player_id), i);
        for peer in (0..4).filter(|&p| p != i) {
            assert!(node.received[peer] >= 50, "node {i} from {peer}: {:?}", node.received);
        }
        assert_eq!(node.out_of_order, 0);
    }
}

#[test]
fn unplugged_console_is_evicted_and_rejoins() {
    let events = vec![
        event(60, 2, EventAction::Unplug),
        event(120, 2, EventAction::Plug),
    ];
    let mut sim = Simulation::new(scenario(3, 180, events)).unwrap();

    while sim.frame() < 90 {
        sim.step();
    }
    let mid = sim.report();
    assert_eq!(mid.nodes[0].player_count, 2);
    assert_eq!(mid.nodes[1].player_count, 2);
    assert!(mid.nodes[0].connected && mid.nodes[1].connected);
    assert!(!mid.nodes[2].connected);
    assert!(!sim.cable().node(0).unwrap().connection().is_peer_online(2));

    let end = sim.run();
    for node in &end.nodes {
        assert!(node.connected);
        assert_eq!(node.player_count, 3);
    }
}

#[test]
fn injected_error_resets_only_that_console() {
    let events = vec![event(30, 1, EventAction::Error)];
    let mut sim = Simulation::new(scenario(2, 60, events)).unwrap();
    let report = sim.run();

    let (master, slave) = (&report.nodes[0], &report.nodes[1]);
    assert_eq!(slave.resets, 2);
    assert_eq!(slave.last_reset, Some(ResetReason::HardwareFault));
    assert_eq!(master.resets, 1);
    assert!(master.connected && slave.connected);
}

#[test]
fn deactivated_console_stalls_the_cable_until_reactivated() {
    let events = vec![
        event(20, 1, EventAction::Deactivate),
        event(40, 1, EventAction::Activate),
    ];
    let mut sim = Simulation::new(scenario(2, 80, events)).unwrap();

    while sim.frame() < 35 {
        sim.step();
    }
    let mid = sim.report();
    assert!(!mid.nodes[0].connected);
    assert!(!mid.nodes[1].active);
    assert_eq!(mid.nodes[0].last_reset, Some(ResetReason::SilenceTimeout));

    let end = sim.run();
    assert!(end.nodes.iter().all(|n| n.connected && n.active));
    assert_eq!(end.nodes[1].resets, 2);
    assert_eq!(end.nodes[1].last_reset, Some(ResetReason::Activation));
}

#[test]
fn lone_console_exchanges_but_never_connects() {
    let mut sim = Simulation::new(scenario(1, 30, Vec::new())).unwrap();
    let report = sim.run();

    assert!(report.exchanges > 0);
    assert!(!report.nodes[0].connected);
    assert_eq!(report.nodes[0].player_count, 1);
    assert_eq!(report.nodes[0].connected_frames, 0);
    assert_eq!(report.nodes[0].resets, 1);
}

#[test]
fn scenario_file_drives_the_simulation() {
    let cfg = config::parse(
        r#"
        nodes = 2
        frames = 40

        [link]
        baud-rate = "115200"
        interval = 25
        timer-id = 0
        "#,
    )
    .unwrap();
    let mut sim = Simulation::new(cfg).unwrap();
    let report = sim.run();

    // Twice the pace of the default interval.
    assert!(report.exchanges >= 40 * 10);
    assert!(report.nodes.iter().all(|n| n.connected));

    let text = report.to_string();
    assert!(text.starts_with("40 frames"));
    assert!(text.contains("last-reset"));
}
