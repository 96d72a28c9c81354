//!
//! This binary provides a CLI for fusing one session's recording streams.
#![allow(clippy::uninlined_format_args)]

use clap::{Parser, Subcommand};
use sessionfuse_core::SessionFusion;
use sessionfuse_io::{open_session, FileBehaviorSource, FileOpticalSource, SessionManifest};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    SessionIo(#[from] sessionfuse_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] sessionfuse_core::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0} consistency check(s) failed")]
    Validation(usize),
}

/// Session data fusion for behavior + two-photon recordings.
#[derive(Parser)]
#[command(name = "sessionfuse")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show session metadata and the sync channel inventory
    Info {
        /// Session manifest file
        manifest: PathBuf,
    },

    /// Run the full fusion pipeline and report artifact shapes
    Process {
        /// Session manifest file
        manifest: PathBuf,

        /// Print the session metadata record as JSON
        #[arg(long)]
        json: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Run the consistency checks without materializing outputs
    Validate {
        /// Session manifest file
        manifest: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

type Session = SessionFusion<FileOpticalSource, FileBehaviorSource>;

fn open(manifest: &Path) -> Result<Session> {
    let manifest = SessionManifest::load(manifest)?;
    let (optical, behavior) = open_session(manifest);
    Ok(SessionFusion::new(optical, behavior))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Info { manifest } => {
            let mut session = open(&manifest)?;

            let timeline = session.sync_timeline()?;
            println!("Session: {}", session.ophys_experiment_id());
            println!("Sync channels:");
            for name in timeline.channel_names() {
                let pulses = timeline.require(name)?;
                println!("  {}: {} pulses", name, pulses.len());
            }

            let metadata = session.metadata()?;
            println!("Structure: {}", metadata.targeted_structure);
            println!("Depth: {} um", metadata.imaging_depth_um);
            println!("Session type: {}", metadata.session_type);
            println!("Equipment: {}", metadata.equipment_name);
            match metadata.plane_group {
                Some(group) => println!("Plane group: {}", group),
                None => println!("Plane group: none"),
            }
        }

        Commands::Process {
            manifest,
            json,
            verbose,
        } => {
            let start = Instant::now();
            let mut session = open(&manifest)?;

            let timestamps = session.ophys_timestamps()?;
            if verbose {
                eprintln!("Aligned {} imaging frames", timestamps.len());
            }

            let dff = session.dff_traces()?;
            let demixed = session.demixed_traces()?;
            let events = session.events()?;
            let licks = session.licks()?;
            let rewards = session.rewards()?;
            let trials = session.trials()?;
            if verbose {
                eprintln!("Reconciled {} ROIs across 3 trace modalities", dff.roi_ids.len());
            }

            let metadata = session.metadata()?;
            if json {
                println!("{}", serde_json::to_string_pretty(metadata.as_ref())?);
            } else {
                println!(
                    "Processed session {} in {:.2}s",
                    metadata.ophys_experiment_id,
                    start.elapsed().as_secs_f64()
                );
                println!("Imaging frames: {}", timestamps.len());
                println!("ROIs: {}", dff.roi_ids.len());
                println!("Demixed frames: {}", demixed.data.ncols());
                println!("Event frames: {}", events.events.ncols());
                println!("Licks: {}", licks.len());
                println!("Rewards: {}", rewards.len());
                println!("Trials: {}", trials.len());
            }
        }

        Commands::Validate { manifest } => {
            let mut session = open(&manifest)?;
            let mut failures = 0usize;

            let checks: [(&str, fn(&mut Session) -> Result<()>); 4] = [
                ("frame alignment", check_alignment),
                ("clock rebase", check_rebase),
                ("roi identity", check_identity),
                ("mask geometry", check_masks),
            ];
            for (name, check) in checks {
                match check(&mut session) {
                    Ok(()) => println!("ok   {}", name),
                    Err(error) => {
                        failures += 1;
                        println!("FAIL {}: {}", name, error);
                    }
                }
            }

            if failures > 0 {
                return Err(CliError::Validation(failures));
            }
        }
    }

    Ok(())
}

fn check_alignment(session: &mut Session) -> Result<()> {
    session.ophys_timestamps()?;
    Ok(())
}

fn check_rebase(session: &mut Session) -> Result<()> {
    session.rebase_function()?;
    Ok(())
}

fn check_identity(session: &mut Session) -> Result<()> {
    session.dff_traces()?;
    session.demixed_traces()?;
    session.events()?;
    Ok(())
}

fn check_masks(session: &mut Session) -> Result<()> {
    session.roi_masks(None)?;
    Ok(())
}
