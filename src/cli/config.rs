// src/cli/config.rs
//! Global configuration commands

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Store the server credentials
    Init {
        #[arg(long)]
        access_id: String,

        #[arg(long)]
        access_secret: String,
    },

    /// Set a value, addressed as section.key
    Set {
        key: String,
        value: String,
    },

    /// Print a value, addressed as section.key
    Get {
        key: String,
    },

    /// Set the private key used to sign packages
    SetPrivateKey {
        path: PathBuf,
    },

    /// Remove the global configuration file
    Cleanup,
}
