//
// cli.rs
// Dicom-Deface
//
// Defines the CLI surface with Clap and dispatches user-selected commands to the corresponding modules.
//
// Thales Matheus Mendonça Santos - October 2026

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::Level;

use crate::anonymize::{self, anonymize};
use crate::batch::{self, BatchConfig};
use crate::image::{self, PreviewOptions};
use crate::metadata;
use crate::plane::DEFAULT_THRESHOLD;
use crate::progress::TracingSink;
use crate::slice::{maybe_mask, RawSlice};
use crate::web;

/// Command-line interface glue code: defines the available verbs and dispatches to modules.
#[derive(Parser)]
#[command(name = "dicom-deface")]
#[command(about = "Anonymize DICOM slices, sort them by plane and mask sagittal faces", long_about = None)]
pub struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Anonymize, classify and mask a whole folder of patients
    Run {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f64,
        /// Process files one at a time instead of in parallel
        #[arg(long)]
        sequential: bool,
    },
    /// Print the plane of a single file
    Classify {
        file: PathBuf,
        #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f64,
    },
    /// Show patient, series and orientation fields
    Info {
        file: PathBuf,
        #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f64,
    },
    /// Anonymize a single DICOM file
    Anonymize {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, default_value = "Patient_0001")]
        patient_tag: String,
    },
    /// Run the full per-file pipeline on one file
    Process {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, default_value = "Patient_0001")]
        patient_tag: String,
        #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f64,
    },
    /// Export PNG previews of the sagittal slices in a folder
    Preview {
        dir: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Export every slice, not only sagittal ones
        #[arg(long)]
        all: bool,
        /// Apply the redaction mask to sagittal previews
        #[arg(long)]
        masked: bool,
        #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f64,
    },
    /// Start the web job server
    Web {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(short, long, default_value_t = 3000)]
        port: u16,
    },
}

impl Commands {
    /// Plane threshold of the verbs that classify slices.
    fn threshold(&self) -> Option<f64> {
        match self {
            Commands::Run { threshold, .. }
            | Commands::Classify { threshold, .. }
            | Commands::Info { threshold, .. }
            | Commands::Process { threshold, .. }
            | Commands::Preview { threshold, .. } => Some(*threshold),
            Commands::Anonymize { .. } | Commands::Web { .. } => None,
        }
    }
}

pub fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

pub async fn run() -> Result<()> {
    // Parse the raw CLI arguments once and dispatch to a subcommand handler.
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Some(threshold) = cli.command.threshold() {
        check_threshold(threshold)?;
    }

    match cli.command {
        Commands::Run {
            input,
            output,
            threshold,
            sequential,
        } => {
            let config = BatchConfig {
                input,
                output,
                threshold,
                parallel: !sequential,
            };
            // Blocking file work; keep it off the runtime's async workers.
            let summary =
                tokio::task::spawn_blocking(move || batch::run(&config, &TracingSink)).await??;
            println!(
                "Anonymized {} of {} files ({} failed, {} masked) into {:?}",
                summary.processed, summary.total_files, summary.failed, summary.masked, summary.output
            );
            for (plane, count) in &summary.planes {
                println!("  {:<14} {}", plane, count);
            }
        }
        Commands::Classify { file, threshold } => classify_file(&file, threshold)?,
        Commands::Info { file, threshold } => metadata::print_info(&file, threshold)?,
        Commands::Anonymize {
            input,
            output,
            patient_tag,
        } => {
            let saved = anonymize::process_file(&input, output, &patient_tag)?;
            println!("Anonymized file saved to: {:?}", saved);
        }
        Commands::Process {
            input,
            output,
            patient_tag,
            threshold,
        } => process_file(&input, &output, &patient_tag, threshold)?,
        Commands::Preview {
            dir,
            output,
            all,
            masked,
            threshold,
        } => {
            let options = PreviewOptions {
                threshold,
                all,
                masked,
            };
            let written = image::export_previews(&dir, &output, &options)?;
            println!("Exported {} preview(s) to {:?}", written.len(), output);
        }
        Commands::Web { host, port } => web::start_server(&host, port).await?,
    }

    Ok(())
}

fn check_threshold(threshold: f64) -> Result<()> {
    if !(threshold > 0.0 && threshold <= 1.0) {
        bail!("Threshold must be in (0, 1], got {}", threshold);
    }
    Ok(())
}

fn classify_file(file: &Path, threshold: f64) -> Result<()> {
    let info = metadata::read_slice_metadata(file, threshold)?;
    match info.orientation {
        Some(o) => {
            println!("Row:    {:?}", o.row);
            println!("Column: {:?}", o.col);
            println!("Normal: {:?}", o.normal());
        }
        None => println!("Orientation: N/A"),
    }
    println!("Plane:  {}", info.plane);
    Ok(())
}

fn process_file(input: &Path, output: &Path, patient_tag: &str, threshold: f64) -> Result<()> {
    let slice = anonymize(RawSlice::open(input)?, patient_tag);
    let plane = slice.classify(threshold);
    let processed = maybe_mask(slice, plane)?;
    processed.write_to(output)?;

    println!(
        "[{}] {:?} -> {:?}{}",
        plane,
        input,
        output,
        if processed.was_masked() { " (masked)" } else { "" }
    );
    Ok(())
}
