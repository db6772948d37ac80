use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::time::Instant;

use detector_common::{DetectorConfig, OutputFormat, ReplayEvent};
use detector_engine::{output, process_table};
use detector_engine::RunContext;

/// Command-line arguments for the replay driver
#[derive(Parser, Debug)]
#[command(author, version, about = "Aggregates recorded detector steps into per-event records", long_about = None)]
struct Args {
    /// Recorded step stream (.json, .bin or .msgpack)
    #[arg(short, long)]
    input: PathBuf,

    /// Path to the config.toml file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Number of worker threads (overrides run.workers from the config)
    #[arg(long)]
    workers: Option<usize>,
}

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();

    let args = Args::parse();
    info!("Starting Detector Engine...");

    // --- Load Configuration ---
    let mut config = DetectorConfig::load(&args.config)?;
    if let Some(workers) = args.workers {
        config.run.workers = workers;
    }
    debug!("Configuration: {:#?}", config);

    // --- Load Recorded Steps ---
    let input_format = OutputFormat::from_path(&args.input)?;
    let load_start = Instant::now();
    let events: Vec<ReplayEvent> = output::read_data(&args.input, input_format)
        .with_context(|| format!("Failed to load replay input '{}'", args.input.display()))?;
    let total_steps: usize = events.iter().map(|e| e.step_count()).sum();
    info!(
        "Loaded {} events ({} steps) from {} in {:.2} s",
        events.len(),
        total_steps,
        args.input.display(),
        load_start.elapsed().as_secs_f64()
    );
    if events.is_empty() {
        warn!("Replay input contains no events.");
    }

    // --- Replay ---
    let run = RunContext::new(config);
    let progress = ProgressBar::new(events.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} events ({eta})")?
            .progress_chars("#>-"),
    );

    let start_time = Instant::now();
    let results = run.run(&events, &progress)?;
    progress.finish_and_clear();
    let total_duration = start_time.elapsed();
    let total_edep: f64 = results.events.iter().map(|r| r.total_energy).sum();
    let total_hits: u64 = results.events.iter().map(|r| r.hit_count as u64).sum();
    info!(
        "Replay finished in {:.3} seconds: {} events, {} hits, {:.3} MeV deposited.",
        total_duration.as_secs_f64(),
        results.events.len(),
        total_hits,
        total_edep
    );

    // --- Run End (this process is the coordinator) ---
    let process_map = run.end_run(&results.finished, true)?;
    let config = run.config();

    // --- Save Recorded Data ---
    info!("Saving recorded data...");
    let format = config.output.format;
    if config.output.save_events {
        let path = output::output_path(&config.output.base_filename, "events", format);
        if let Err(e) = output::write_data(&path, &results.events, format) {
            error!("Error saving event records: {:#}", e);
            anyhow::bail!("Failed to save event records.");
        }
    } else {
        info!("Skipping saving event records as per config (save_events is false).");
    }

    if config.output.save_trajectories {
        let path = output::output_path(&config.output.base_filename, "trajectories", format);
        if let Err(e) = output::write_data(&path, &results.trajectories, format) {
            error!("Error saving trajectories: {:#}", e);
        }
    }

    if config.boundary.enabled && config.output.save_exit_counts {
        let path = format!("{}_exit_counts.csv", config.output.base_filename);
        if let Err(e) = run.exits().write_csv(&path) {
            error!("Error saving exit counts: {:#}", e);
        }
    }

    if let Some(mapping) = process_map {
        process_table::write_process_map(&config.output.process_map_file, &mapping)?;
    }

    info!("Detector Engine Complete.");
    Ok(())
}
