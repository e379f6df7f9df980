//! CLI argument parsing for idveil

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "idveil")]
#[command(version)]
#[command(about = "Identity masking and runtime interception engine", long_about = None)]
pub struct Cli {
    /// Enable debug tracing output (to stderr)
    #[arg(long = "debug", global = true)]
    pub debug: bool,

    /// Engine configuration TOML (defaults are used when omitted)
    #[arg(long = "engine-config", value_name = "FILE", global = true)]
    pub engine_config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve identifier values for an application against a snapshot
    Resolve {
        /// Configuration snapshot (JSON)
        #[arg(short = 'c', long = "config", value_name = "FILE")]
        config: PathBuf,

        /// Calling application package
        #[arg(short = 'a', long = "app", value_name = "PACKAGE")]
        app: String,

        /// Identifier types to resolve (default: all)
        #[arg(short = 't', long = "type", value_name = "TYPE")]
        types: Vec<String>,

        /// Session salt for fallback values (random when omitted)
        #[arg(long = "salt", value_name = "N")]
        salt: Option<u64>,
    },

    /// Generate well-formed identifier values
    Generate {
        /// Identifier type (e.g. IMEI, WIFI_MAC)
        #[arg(short = 't', long = "type", value_name = "TYPE")]
        ty: String,

        /// Number of values
        #[arg(short = 'n', long = "count", default_value = "1")]
        count: usize,

        /// Seed for reproducible output (random when omitted)
        #[arg(long = "seed", value_name = "N")]
        seed: Option<u64>,
    },

    /// Check a value against the format of an identifier type
    Validate {
        /// Identifier type (e.g. IMEI, WIFI_MAC)
        #[arg(short = 't', long = "type", value_name = "TYPE")]
        ty: String,

        /// Value to check
        value: String,
    },

    /// List the hook catalog
    Catalog {
        /// Catalog TOML (default: built-in catalog)
        #[arg(long = "file", value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Report whether the engine may attach to a process
    CheckProcess {
        /// Package name of the process
        package: String,

        /// Process name when it differs from the package
        #[arg(long = "process", value_name = "NAME")]
        process: Option<String>,
    },

    /// Filter a stack trace (one symbol per line) through stack concealment
    ConcealStack {
        /// Input file (default: stdin)
        input: Option<PathBuf>,
    },

    /// Filter a process metadata file (e.g. a maps dump) line by line
    ConcealMaps {
        /// Input file (default: stdin)
        input: Option<PathBuf>,
    },
}
