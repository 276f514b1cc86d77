//! Command-line arguments for the `emulated-roku` binary
use clap::Parser;
use std::path::PathBuf;

/// Command-line flags; each one overrides the config file
#[derive(Parser, Debug, Default)]
#[command(
    name = "emulated-roku",
    about = "Emulated Roku device: answers SSDP discovery and turns ECP key presses into events",
    long_about = None,
    version,
)]
pub struct Args {
    /// Path to TOML config file (default: ./emulated-roku.toml if present)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Device name shown to Roku controllers [default: ESPHome Roku]
    #[arg(short, long)]
    pub name: Option<String>,

    /// ECP HTTP port [default: 8060]
    #[arg(short, long)]
    pub port: Option<u16>,
}
