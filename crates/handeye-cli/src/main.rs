use std::{
    fs,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use handeye_core::ScriptedPoseSource;
use handeye_pipeline::{
    calibrate_from_file, io::read_pose_pairs, CaptureSession, FinalizeOutcome, HandEyeConfig,
    SessionCommand, SessionEvent,
};
use log::{info, warn};

/// Hand-eye (AX = XB) calibration.
#[derive(Debug, Parser)]
#[command(author, version, about = "Hand-eye calibration from robot and camera pose pairs")]
struct Args {
    /// Optional path to a JSON HandEyeConfig. Defaults are used if omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Calibrate from a recorded pose-pair file.
    Calibrate {
        /// Pose-pair file (defaults to the configured load file).
        #[arg(long)]
        pairs: Option<PathBuf>,
        /// Result file (defaults to the configured result file).
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Interactive session replaying a recorded pose stream.
    ///
    /// Reads one command per line from stdin: `s` capture, `d` undo,
    /// `q` finalize.
    Session {
        /// Pose-pair file replayed as the live pose source.
        #[arg(long)]
        stream: PathBuf,
        /// File rewritten with the captured pairs after every capture.
        #[arg(long)]
        record: Option<PathBuf>,
        /// Result file (defaults to the configured result file).
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> Result<HandEyeConfig> {
    let Some(path) = path else {
        return Ok(HandEyeConfig::default());
    };
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("invalid config {}", path.display()))
}

fn run_calibrate(config: &HandEyeConfig) -> Result<FinalizeOutcome> {
    let pairs_file = &config.pairs_load_file;
    calibrate_from_file(pairs_file, config)
        .with_context(|| format!("calibration from {} failed", pairs_file.display()))
}

/// Drive a capture session from line commands until finalized or input ends.
fn run_session<R: BufRead, W: Write>(
    stream: &Path,
    config: HandEyeConfig,
    input: R,
    mut out: W,
) -> Result<Option<FinalizeOutcome>> {
    let mut source = ScriptedPoseSource::new();
    for pair in read_pose_pairs(stream)? {
        source.push_pose(&config.frames.stream_a(), pair.pose_a);
        source.push_pose(&config.frames.stream_b(), pair.pose_b);
    }

    let mut session = CaptureSession::new(source, config);
    writeln!(out, "commands: s = capture, d = undo, q = finalize")?;

    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let command = match line.parse::<SessionCommand>() {
            Ok(command) => command,
            Err(msg) => {
                warn!("{msg}");
                continue;
            }
        };

        match session.handle(command) {
            Ok(SessionEvent::Captured(outcome)) => {
                writeln!(out, "captured pair #{}", outcome.num_pairs)?;
            }
            Ok(SessionEvent::Undone(Some(_))) => {
                writeln!(out, "removed last pair, {} left", session.store().len())?;
            }
            Ok(SessionEvent::Undone(None)) => {
                writeln!(out, "nothing to undo")?;
            }
            Ok(SessionEvent::Finalized(outcome)) => return Ok(Some(*outcome)),
            // capture and estimation failures are recoverable, keep reading
            Err(err) => warn!("{err}"),
        }
    }

    info!("input closed before finalize, {} pairs captured", session.store().len());
    Ok(None)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = try_main() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;

    let outcome = match args.command {
        Command::Calibrate { pairs, output } => {
            if let Some(pairs) = pairs {
                config.pairs_load_file = pairs;
            }
            if let Some(output) = output {
                config.result_file = output;
            }
            Some(run_calibrate(&config)?)
        }
        Command::Session {
            stream,
            record,
            output,
        } => {
            if let Some(record) = record {
                config.pairs_record_file = record;
            }
            if let Some(output) = output {
                config.result_file = output;
            }
            let stdin = io::stdin();
            run_session(&stream, config, stdin.lock(), io::stdout())?
        }
    };

    if let Some(outcome) = outcome {
        println!("{}", outcome.report);
    }
    Ok(())
}
