//! # CLI Module
//!
//! Command-line interface for the similarity-scan engine.
//!
//! ## Usage
//! ```bash
//! # Scan an exported selection of photos
//! photo-prune scan selection.json
//!
//! # Explain why photos were or were not compared
//! photo-prune scan selection.json --explain --verbose
//!
//! # JSON output
//! photo-prune scan selection.json --output json
//!
//! # Show the settings a scan would use
//! photo-prune settings --config scan.toml
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use photo_prune_engine::config::ScanSettings;
use photo_prune_engine::core::comparator::PhotoGroup;
use photo_prune_engine::core::photo::PhotoItem;
use photo_prune_engine::core::pipeline::{counters, ScanEngine, ScanResult};
use photo_prune_engine::error::EngineError;
use photo_prune_engine::events::{Event, EventChannel, HashEvent, HashStage, ScanEvent};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use thiserror::Error;

/// Photo Prune - find duplicate photos in a selection
#[derive(Parser, Debug)]
#[command(name = "photo-prune")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan a JSON list of photos for exact and near duplicates
    Scan {
        /// JSON file holding an array of photos
        photos: PathBuf,

        /// Settings file (any format the config crate reads)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Include narrowing diagnostics (ignored in prod)
        #[arg(long)]
        explain: bool,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
    /// Print the resolved settings as JSON
    Settings {
        /// Settings file (any format the config crate reads)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// The full scan result as JSON
    Json,
    /// One line of photo ids per group
    Minimal,
}

/// Failures the CLI reports before exiting non-zero
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a JSON array of photos: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to render output: {0}")]
    Render(#[from] serde_json::Error),
}

/// Run the CLI
pub fn run() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            photos,
            config,
            explain,
            output,
            verbose,
        } => run_scan(&photos, config.as_deref(), explain, output, verbose),
        Commands::Settings { config } => {
            let settings = ScanSettings::load(config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
    }
}

fn load_photos(path: &Path) -> Result<Vec<PhotoItem>, CliError> {
    let text = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn run_scan(
    photos_path: &Path,
    config: Option<&Path>,
    explain: bool,
    output: OutputFormat,
    verbose: bool,
) -> Result<(), CliError> {
    let term = Term::stderr();

    if matches!(output, OutputFormat::Pretty) {
        term.write_line(&format!(
            "{} {}",
            style("Photo Prune").bold().cyan(),
            style(concat!("v", env!("CARGO_PKG_VERSION"))).dim()
        ))
        .ok();
        term.write_line("").ok();
    }

    let settings = ScanSettings::load(config)?;
    let photos = load_photos(photos_path)?;
    let engine = ScanEngine::new(settings);

    let (sender, receiver) = EventChannel::new();

    // Progress bar for pretty output
    let progress = if matches!(output, OutputFormat::Pretty) {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        Some(pb)
    } else {
        None
    };

    let progress_clone = progress.clone();

    // Handle events in a separate thread
    let event_thread = thread::spawn(move || {
        let Some(pb) = progress_clone else {
            // drain so the engine never waits on a full channel
            for _ in receiver.iter() {}
            return;
        };
        for event in receiver.iter() {
            match event {
                Event::Scan(ScanEvent::PhaseChanged { phase }) => {
                    pb.set_message(phase.to_string());
                }
                Event::Scan(ScanEvent::FallbackApplied { candidate_items }) if verbose => {
                    pb.println(format!(
                        "  comparing all {} photos as one set",
                        candidate_items
                    ));
                }
                Event::Hash(HashEvent::Started { total_photos, .. }) => {
                    pb.set_length(total_photos as u64);
                    pb.set_position(0);
                }
                Event::Hash(HashEvent::Progress(p)) => {
                    pb.set_position(p.completed as u64);
                    if verbose {
                        let stage = match p.stage {
                            HashStage::Bytes => "digest",
                            HashStage::Perceptual => "perceptual",
                        };
                        pb.set_message(format!("{} {}", stage, p.photo_id));
                    }
                }
                Event::Scan(ScanEvent::Completed { .. }) => pb.finish_and_clear(),
                Event::Scan(ScanEvent::Error { .. }) => pb.abandon(),
                _ => {}
            }
        }
    });

    let result = engine.run_with_events(&photos, explain, &sender);

    // Drop sender to signal event thread to finish
    drop(sender);
    event_thread.join().ok();

    let result = result?;
    match output {
        OutputFormat::Pretty => print_pretty_results(&term, &result, verbose),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Minimal => print_minimal_results(&result),
    }

    Ok(())
}

fn print_pretty_results(term: &Term, result: &ScanResult, verbose: bool) {
    let metrics = &result.stage_metrics;

    term.write_line("").ok();
    term.write_line(&format!("{} Scan Complete", style("✓").green().bold()))
        .ok();
    term.write_line("").ok();

    term.write_line(&format!(
        "  {} photos selected, {} in candidate sets",
        style(result.input_count).cyan(),
        style(metrics.count(counters::CANDIDATE_ITEMS)).cyan()
    ))
    .ok();
    term.write_line(&format!(
        "  {} downloads, {} comparisons",
        style(metrics.count(counters::DOWNLOADS_PERFORMED)).cyan(),
        style(metrics.count(counters::COMPARISONS_EXECUTED)).cyan()
    ))
    .ok();
    term.write_line(&format!(
        "  {} estimated cost",
        style(format!("${:.6}", result.cost_estimate.total_cost)).yellow()
    ))
    .ok();
    if verbose {
        for (stage, millis) in &metrics.timings_ms {
            term.write_line(&format!("  {} {:.2} ms", style(stage).dim(), millis))
                .ok();
        }
    }
    term.write_line("").ok();

    if result.group_count() == 0 {
        term.write_line(&format!("  {} No duplicates found!", style("🎉").green()))
            .ok();
    } else {
        print_groups(term, "Exact Duplicates:", &result.groups_exact, verbose);
        print_groups(term, "Very Similar:", &result.groups_very_similar, verbose);
        print_groups(term, "Possibly Similar:", &result.groups_possibly_similar, verbose);
    }

    if let Some(debug) = &metrics.debug {
        term.write_line(&format!("{}", style("Narrowing:").bold().underlined()))
            .ok();
        for (size, buckets) in &debug.candidate_bucket_sizes {
            term.write_line(&format!("  {} bucket(s) of size {}", buckets, size))
                .ok();
        }
        if let Some(reasons) = &debug.narrowing_reasons {
            term.write_line(&format!(
                "  isolated by: {} missing dimensions, {} capture day, {} mime type",
                reasons.missing_dims.len(),
                reasons.time_bucket_mismatch.len(),
                reasons.mime_mismatch.len()
            ))
            .ok();
        }
        term.write_line("").ok();
    }

    term.write_line(&format!(
        "{}",
        style("Remember: No photos were deleted. Review carefully before taking action.").dim()
    ))
    .ok();
}

fn print_groups(term: &Term, title: &str, groups: &[PhotoGroup], verbose: bool) {
    if groups.is_empty() {
        return;
    }
    term.write_line(&format!("{}", style(title).bold().underlined()))
        .ok();
    term.write_line("").ok();

    for group in groups {
        term.write_line(&format!(
            "  {} ({} photos)",
            style(&group.group_id).bold(),
            group.len()
        ))
        .ok();
        for photo in &group.items {
            let name = photo.filename.as_deref().unwrap_or(&photo.id);
            term.write_line(&format!(
                "    {} {} {}",
                style("○").dim(),
                name,
                style(photo.create_time.format("%Y-%m-%d %H:%M:%S")).dim()
            ))
            .ok();
        }
        if verbose {
            term.write_line(&format!(
                "    {} {} -> {}",
                style("Earliest/latest:").dim(),
                group.representative_pair.earliest.id,
                group.representative_pair.latest.id
            ))
            .ok();
        }
        term.write_line("").ok();
    }
}

fn print_minimal_results(result: &ScanResult) {
    for group in result.all_groups() {
        println!("{}", group.ids().join(" "));
    }
}
