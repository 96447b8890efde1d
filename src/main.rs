//! # photo-prune CLI
//!
//! Command-line interface for the similarity-scan engine.
//!
//! ## Usage
//! ```bash
//! photo-prune scan selection.json --explain
//! photo-prune scan selection.json --verbose --output json
//! ```

mod cli;

use console::style;
use std::process::ExitCode;

fn main() -> ExitCode {
    photo_prune_engine::init_tracing();

    match cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{} {}", style("error:").red().bold(), error);
            ExitCode::FAILURE
        }
    }
}
