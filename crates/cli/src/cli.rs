use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "veil")]
#[command(about = "Mask personal information in scanned identity documents", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (default: <config dir>/veil/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Redact images and store the masked copies
    Mask {
        /// Image files to process
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Where masked copies are written (overrides config)
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Re-run OCR on each result and report residual PII
        #[arg(long)]
        verify: bool,

        /// Worker threads, one OCR engine each (overrides config)
        #[arg(long)]
        jobs: Option<usize>,
    },

    /// Check whether a piece of text counts as PII
    Classify {
        text: String,
    },

    /// Copy a stored masked image out of the output directory
    Fetch {
        /// Output name, e.g. masked_card.png
        output_name: String,

        /// Destination file or directory
        dest: PathBuf,

        /// Output directory to read from (overrides config)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Show the effective configuration
    Config {
        /// Write the default configuration to the config path
        #[arg(long)]
        init: bool,
    },
}
