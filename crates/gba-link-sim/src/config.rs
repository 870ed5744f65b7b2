use std::path::Path;

use gba_link_core::{LINK_MAX_PLAYERS, LinkSettings};
use serde::{Deserialize, Serialize};

use crate::error::SimError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventAction {
    /// Pull the console's plug out of the cable.
    Unplug,
    Plug,
    /// Report a communication error on the console's next exchange.
    Error,
    Deactivate,
    Activate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioEvent {
    pub frame: u64,
    pub node: usize,
    pub action: EventAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SimConfig {
    pub nodes: usize,
    pub frames: u64,
    pub link: LinkSettings,
    #[serde(rename = "event")]
    pub events: Vec<ScenarioEvent>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            nodes: 2,
            frames: 300,
            link: LinkSettings::default(),
            events: Vec::new(),
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        if !(1..=LINK_MAX_PLAYERS).contains(&self.nodes) {
            return Err(SimError::NodeCount(self.nodes));
        }
        self.link.validate()?;
        if let Some(event) = self.events.iter().find(|e| e.node >= self.nodes) {
            return Err(SimError::UnknownNode {
                frame: event.frame,
                node: event.node,
                nodes: self.nodes,
            });
        }
        Ok(())
    }

    /// Events scheduled for `frame`, in file order.
    pub fn events_at(&self, frame: u64) -> impl Iterator<Item = &ScenarioEvent> {
        self.events.iter().filter(move |e| e.frame == frame)
    }
}

pub fn parse(text: &str) -> Result<SimConfig, SimError> {
    let cfg = toml::from_str::<SimConfig>(text)?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_from_file(path: &Path) -> Result<SimConfig, SimError> {
    let text = std::fs::read_to_string(path).map_err(|source| SimError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gba_link_core::{BaudRate, SettingsError, TimerId};
    use std::io::Write;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg, SimConfig::default());
    }

    #[test]
    fn full_scenario_parses() {
        let cfg = parse(
            r#"
            nodes = 3
            frames = 600

            [link]
            baud-rate = "115200"
            silence-timeout = 4
            remote-timeout = 6
            queue-capacity = 10
            interval = 40
            timer-id = 2

            [[event]]
            frame = 120
            node = 2
            action = "unplug"

            [[event]]
            frame = 240
            node = 2
            action = "plug"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.nodes, 3);
        assert_eq!(cfg.frames, 600);
        assert_eq!(cfg.link.baud_rate, BaudRate::Bps115200);
        assert_eq!(cfg.link.silence_timeout, 4);
        assert_eq!(cfg.link.remote_timeout, 6);
        assert_eq!(cfg.link.queue_capacity, 10);
        assert_eq!(cfg.link.interval, 40);
        assert_eq!(cfg.link.timer_id, TimerId::Timer2);
        assert_eq!(cfg.events.len(), 2);
        assert_eq!(cfg.events_at(240).next().unwrap().action, EventAction::Plug);
        assert_eq!(cfg.events_at(7).count(), 0);
    }

    #[test]
    fn rejects_bad_node_counts_and_targets() {
        assert!(matches!(parse("nodes = 0"), Err(SimError::NodeCount(0))));
        assert!(matches!(parse("nodes = 5"), Err(SimError::NodeCount(5))));

        let err = parse(
            r#"
            nodes = 2
            [[event]]
            frame = 10
            node = 3
            action = "error"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, SimError::UnknownNode { node: 3, nodes: 2, .. }));
    }

    #[test]
    fn rejects_invalid_link_settings() {
        assert!(matches!(
            parse("[link]\nqueue-capacity = 0"),
            Err(SimError::Settings(SettingsError::ZeroQueueCapacity))
        ));
        assert!(matches!(
            parse("[link]\ntimer-id = 4"),
            Err(SimError::Parse(_))
        ));
        assert!(matches!(
            parse("[[event]]\nframe = 1\nnode = 0\naction = \"explode\""),
            Err(SimError::Parse(_))
        ));
    }

    #[test]
    fn load_reads_file_and_reports_missing_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "nodes = 4\nframes = 10").unwrap();

        let cfg = load_from_file(file.path()).unwrap();
        assert_eq!(cfg.nodes, 4);
        assert_eq!(cfg.frames, 10);

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let err = load_from_file(&missing).unwrap_err();
        assert!(matches!(err, SimError::Io { .. }));
        assert!(err.to_string().contains("missing.toml"));
    }
}
