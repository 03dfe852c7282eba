// src/cli/package.rs
//! Package commands

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum PackageCommands {
    /// Start a new package in the current directory
    New {
        /// Product UID (64 hex characters)
        product: String,

        /// Number of installation sets (1 or 2)
        #[arg(long, default_value_t = 2)]
        sets: usize,
    },

    /// Show the local package
    Show,

    /// Set the package version
    Version {
        #[arg(value_name = "VERSION")]
        value: String,
    },

    /// Add an object to every installation set
    Add {
        /// File to install
        file: String,

        /// Installation mode (copy, flash, imxkobs, raw, tarball, ubifs)
        #[arg(short, long)]
        mode: String,

        /// Object option as key=value; repeat a key once per installation set
        /// to give each set its own value
        #[arg(short = 'o', long = "option", value_parser = parse_key_value)]
        options: Vec<(String, String)>,
    },

    /// Change one option of an object
    Edit {
        /// Object index as listed by `package show`
        index: usize,

        option: String,

        value: String,

        /// Installation set, for options that differ between sets
        #[arg(long)]
        set: Option<usize>,
    },

    /// Remove an object from every installation set
    Remove {
        index: usize,
    },

    /// Print the package metadata as sent to the server
    Metadata,

    /// Write the package template, without version, to a file
    Export {
        path: PathBuf,
    },

    /// Write a signed package archive
    Archive {
        /// Output file (default: <product>-<version>.uhupkg)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing archive
        #[arg(long)]
        force: bool,
    },

    /// Upload the package to the server
    Push,

    /// Download a package and its objects into the current directory
    Pull {
        /// Package UID
        uid: String,

        /// Replace an existing local package
        #[arg(long)]
        force: bool,
    },

    /// Show the processing status of a pushed package
    Status {
        /// Package UID
        uid: String,
    },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got {:?}", raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("target=/dev/sda").unwrap(),
            ("target".to_string(), "/dev/sda".to_string())
        );
        assert_eq!(
            parse_key_value("format-options=-O ^metadata_csum=1").unwrap(),
            ("format-options".to_string(), "-O ^metadata_csum=1".to_string())
        );
        assert!(parse_key_value("target").is_err());
        assert!(parse_key_value("=value").is_err());
    }
}
