//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - generate: description → validated model file
//! - validate: check an existing model file
//! - preview: show extracted intent and its rendering
//! - info: configuration and tool status
//! - batch: repeat generation to gauge reliability

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Accordo - generate validated Concerto models from plain-language contracts
#[derive(Parser, Debug)]
#[command(name = "accordo")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a model from a description
    Generate {
        /// Plain-language description of the contract or model
        description: String,

        /// Namespace to use instead of the extracted one
        #[arg(short, long)]
        namespace: Option<String>,

        /// Additional context or constraints
        #[arg(short = 'x', long)]
        context: Option<String>,

        /// Output directory (defaults to the configured one)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the model without writing a file
        #[arg(long)]
        no_save: bool,

        /// Only print the model text
        #[arg(short, long)]
        quiet: bool,
    },

    /// Validate an existing .cto file
    Validate {
        /// Path to the model file
        file: PathBuf,
    },

    /// Show the extracted intent and its rendering without validating
    Preview {
        /// Plain-language description of the contract or model
        description: String,

        /// Namespace to use instead of the extracted one
        #[arg(short, long)]
        namespace: Option<String>,
    },

    /// Show configuration and validator status
    Info,

    /// Run generation several times and report the success rate
    Batch {
        /// Plain-language description of the contract or model
        description: String,

        /// Number of runs
        #[arg(short, long, default_value_t = 3)]
        iterations: u32,
    },
}
