use std::{collections::BTreeSet, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use tokio::sync::mpsc;

use formcheck_lib::{
    init_logging, load_pattern, BodySnapshot, CaptureController, CoachConfig, CoachController,
    SummaryArchive,
};

#[derive(Parser, Debug)]
#[command(name = "formcheck", about = "Compare live joint streams against a recorded exercise")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print frame count, time span and bones of a pattern log
    Inspect { pattern: PathBuf },
    /// Run a recorded live log through an exercise session and print the summary
    Replay {
        #[arg(long)]
        pattern: PathBuf,
        #[arg(long)]
        live: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    match Cli::parse().command {
        Command::Inspect { pattern } => inspect(pattern),
        Command::Replay {
            pattern,
            live,
            config,
        } => replay(pattern, live, config).await,
    }
}

fn inspect(path: PathBuf) -> Result<()> {
    let pattern =
        load_pattern(&path).with_context(|| format!("failed to load {}", path.display()))?;

    println!("frames: {}", pattern.len());
    if let (Some(start), Some(end)) = (pattern.start_time(), pattern.end_time()) {
        let span = (end - start).num_milliseconds() as f64 / 1000.0;
        println!("span:   {} .. {} ({span:.3}s)", start.to_rfc3339(), end.to_rfc3339());
    }

    let bones: BTreeSet<_> = pattern
        .frames()
        .iter()
        .flat_map(|frame| frame.bones().keys().copied())
        .collect();
    let names: Vec<String> = bones.iter().map(|joint| joint.to_string()).collect();
    println!("bones:  {}", names.join(", "));
    Ok(())
}

async fn replay(pattern: PathBuf, live: PathBuf, config: Option<PathBuf>) -> Result<()> {
    let mut config = match config {
        Some(path) => CoachConfig::load(&path)?,
        None => CoachConfig::default(),
    };
    config.pattern_path = pattern;
    // the log is fed straight in, so there is nobody to count down for
    config.countdown_secs = 0;

    let live_log =
        load_pattern(&live).with_context(|| format!("failed to load {}", live.display()))?;

    let archive = match &config.archive_path {
        Some(path) => Some(SummaryArchive::open(path.clone())?),
        None => None,
    };
    let interval = Duration::from_millis(config.frame_interval_ms);
    let coach = CoachController::new(config, archive);
    coach.start_exercise().await?;

    let (tx, rx) = mpsc::channel(64);
    let mut capture = CaptureController::new();
    capture.start(coach.clone(), rx)?;

    info!("Replaying {} frames from {}", live_log.len(), live.display());
    for frame in live_log.frames() {
        if tx.send(BodySnapshot::from_frame(frame)).await.is_err() {
            break;
        }
        if !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
    }
    drop(tx);

    let stats = capture.join().await?;
    info!("Replay fed {} frames ({} failed)", stats.received, stats.failed);

    let summary = coach.end_exercise().await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
