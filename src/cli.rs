//! Command-line interface for voxrelay
//!
//! Provides argument parsing using clap derive macros.

use clap::Parser;
use std::path::PathBuf;

/// Real-time speech translation relay
#[derive(Parser, Debug)]
#[command(name = "voxrelay", version, about = "Real-time speech translation relay")]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Bind address (overrides config)
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Port (overrides config)
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Keep engine sets resident instead of evicting on mode switch
    #[arg(long)]
    pub keep_resident: bool,

    /// Verbose logging (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
