use std::path::PathBuf;

use gba_link_core::SettingsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("failed to read scenario {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse scenario: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid link settings: {0}")]
    Settings(#[from] SettingsError),
    #[error("node count {0} out of range (1-4)")]
    NodeCount(usize),
    #[error("event at frame {frame} targets node {node}, but the cable has {nodes} nodes")]
    UnknownNode {
        frame: u64,
        node: usize,
        nodes: usize,
    },
}
