//! fgsm - adversarial perturbations from the command line
//!
//! Usage:
//!   fgsm attack cat.png                      # Attack one image, print the report
//!   fgsm attack cat.png --label 281 --json   # Ascend against a ground-truth class
//!   fgsm attack cat.png --out-dir ./out      # Also write clean.png / adversarial.png
//!   fgsm eval ./images -o results.csv        # Every image at every epsilon
//!   fgsm bounds                              # Per-channel normalized bounds

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use fgsm::config::RunConfig;
use fgsm::device::Device;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod output;

use commands::{attack, bounds, eval};
use error::Result;

/// fgsm - Fast Gradient Sign Method
///
/// Perturb images so a classifier changes its mind, and measure how often
/// it does.
#[derive(Parser)]
#[command(name = "fgsm")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML run configuration
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Device override: cpu, accel or accel:N
    #[arg(long, global = true)]
    device: Option<Device>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Attack a single image
    Attack {
        /// PNG or JPEG image
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Perturbation budget in normalized units
        #[arg(short, long)]
        epsilon: Option<f32>,

        /// Ground-truth class; defaults to the clean prediction
        #[arg(short, long)]
        label: Option<usize>,

        /// Class label file, one label per line
        #[arg(long, value_name = "FILE")]
        labels: Option<PathBuf>,

        /// Reference model weights (JSON)
        #[arg(long, value_name = "FILE")]
        weights: Option<PathBuf>,

        /// Write clean.png and adversarial.png here
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
    },

    /// Evaluate every image in a directory over an epsilon grid
    Eval {
        /// Directory of PNG/JPEG images
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// Comma-separated epsilon grid
        #[arg(long, value_delimiter = ',')]
        epsilons: Option<Vec<f32>>,

        /// Reference model weights (JSON)
        #[arg(long, value_name = "FILE")]
        weights: Option<PathBuf>,

        /// CSV output file; stdout when omitted
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Print the per-channel bounds of the normalized image space
    Bounds,
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default = if verbose {
        "fgsm=debug,info"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .try_init();
}

fn load_config(cli: &Cli) -> Result<RunConfig> {
    let mut config = match &cli.config {
        Some(path) if !path.exists() => return Err(error::CliError::FileNotFound(path.clone())),
        Some(path) => RunConfig::from_path(path)?,
        None => RunConfig::default(),
    };
    if let Some(device) = cli.device {
        config.device = device;
    }
    Ok(config)
}

fn execute(cli: Cli) -> Result<()> {
    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Attack {
            image,
            epsilon,
            label,
            labels,
            weights,
            out_dir,
        } => {
            if let Some(epsilon) = epsilon {
                config.epsilon = epsilon;
            }
            if labels.is_some() {
                config.labels = labels;
            }
            if weights.is_some() {
                config.weights = weights;
            }
            config.validate()?;
            attack::run(&config, &image, label, out_dir.as_deref(), cli.json)
        }

        Commands::Eval {
            dir,
            epsilons,
            weights,
            output,
        } => {
            if let Some(epsilons) = epsilons {
                config.epsilons = epsilons;
            }
            if weights.is_some() {
                config.weights = weights;
            }
            config.validate()?;
            eval::run(&config, &dir, output.as_deref(), cli.quiet)
        }

        Commands::Bounds => bounds::run(&config, cli.json),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&e.to_string());
            e.exit_code()
        }
    }
}
