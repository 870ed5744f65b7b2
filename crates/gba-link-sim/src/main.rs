use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use gba_link_sim::{SimConfig, SimError, Simulation, config};
use log::{error, info};

#[derive(Parser)]
#[command(about = "Run GBA multiplayer link connections over a simulated cable")]
struct Args {
    /// Path to a TOML scenario file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of consoles on the cable (1-4)
    #[arg(long)]
    nodes: Option<usize>,

    /// Number of frames to simulate
    #[arg(long)]
    frames: Option<u64>,

    /// Enable debug logging of link resets and peer timeouts
    #[arg(long)]
    debug: bool,
}

fn run(args: Args) -> Result<(), SimError> {
    let mut cfg = match &args.config {
        Some(path) => config::load_from_file(path)?,
        None => SimConfig::default(),
    };
    if let Some(nodes) = args.nodes {
        cfg.nodes = nodes;
    }
    if let Some(frames) = args.frames {
        cfg.frames = frames;
    }

    info!(
        "simulating {} consoles for {} frames ({} bps, interval {})",
        cfg.nodes,
        cfg.frames,
        cfg.link.baud_rate.bits_per_second(),
        cfg.link.interval
    );

    let mut sim = Simulation::new(cfg)?;
    let report = sim.run();
    print!("{report}");
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_filter = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
