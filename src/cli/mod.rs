// src/cli/mod.rs
//! CLI definitions for uhu
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.
//!
//! Command groups:
//! - `package` - Edit the local package, build archives, push and pull
//! - `hardware` - Supported hardware of the local package
//! - `config` - Credentials and signing key

use clap::{Parser, Subcommand};

mod config;
mod hardware;
mod package;

pub use config::ConfigCommands;
pub use hardware::HardwareCommands;
pub use package::PackageCommands;

#[derive(Parser)]
#[command(name = "uhu")]
#[command(author = "uhu Contributors")]
#[command(version)]
#[command(about = "Prepare, sign, push and pull UpdateHub firmware update packages", long_about = None)]
pub struct Cli {
    /// Log progress and protocol details
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Local package management and server transactions
    #[command(subcommand)]
    Package(PackageCommands),

    /// Supported hardware of the local package
    #[command(subcommand)]
    Hardware(HardwareCommands),

    /// Global configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}
