// src/cli/hardware.rs
//! Supported hardware commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum HardwareCommands {
    /// Add a hardware name, replacing its revisions
    Add {
        name: String,

        /// Hardware revision (repeatable)
        #[arg(short, long = "revision")]
        revisions: Vec<String>,
    },

    /// Remove a hardware name and its revisions
    Remove {
        name: String,
    },

    /// Add a revision to a supported hardware
    AddRevision {
        name: String,
        revision: String,
    },

    /// Remove a revision from a supported hardware
    RemoveRevision {
        name: String,
        revision: String,
    },
}
