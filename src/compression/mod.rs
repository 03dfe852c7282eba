// src/compression/mod.rs
//! Compression probe for objects
//!
//! Identifies gzip, lzop and xz payloads from their magic bytes and asks the
//! matching host utility for the uncompressed size, which the device agent
//! needs to reserve space before installing.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::debug;

/// Compression-related errors
#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("{tool} is required to inspect {format} objects but was not found in PATH")]
    ToolNotFound {
        tool: &'static str,
        format: &'static str,
    },

    #[error("{} is not a valid {format} file", path.display())]
    Corrupted { path: PathBuf, format: &'static str },

    #[error("Failed to run {tool}: {source}")]
    CommandFailed { tool: &'static str, source: io::Error },

    #[error("Unexpected {tool} output: {output}")]
    UnexpectedOutput { tool: &'static str, output: String },

    #[error("Failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
}

/// Supported compression formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    /// Gzip compression (.gz)
    Gzip,
    /// LZO compression (.lzo)
    Lzop,
    /// XZ/LZMA compression (.xz)
    Xz,
}

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const LZOP_MAGIC: &[u8] = &[0x89, 0x4c, 0x5a, 0x4f, 0x00, 0x0d, 0x0a, 0x1a, 0x0a];
const XZ_MAGIC: &[u8] = &[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00];

/// Longest magic sequence
const MAGIC_LEN: usize = 9;

impl CompressionFormat {
    /// Detect compression format from magic bytes
    ///
    /// Magic bytes:
    /// - Gzip: `1f 8b`
    /// - LZOP: `89 4c 5a 4f 00 0d 0a 1a 0a` (0x89 + "LZO" + NUL CR LF SUB LF)
    /// - XZ: `fd 37 7a 58 5a 00` (FD + "7zXZ" + NUL)
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.starts_with(GZIP_MAGIC) {
            Some(Self::Gzip)
        } else if data.starts_with(LZOP_MAGIC) {
            Some(Self::Lzop)
        } else if data.starts_with(XZ_MAGIC) {
            Some(Self::Xz)
        } else {
            None
        }
    }

    /// Get a human-readable name for this format
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Lzop => "lzop",
            Self::Xz => "xz",
        }
    }

    /// Host utility able to list and test this format
    pub fn tool(&self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Lzop => "lzop",
            Self::Xz => "xz",
        }
    }

    fn list_args(&self) -> &'static [&'static str] {
        match self {
            Self::Gzip | Self::Lzop => &["-l"],
            Self::Xz => &["--robot", "--list"],
        }
    }

    /// Extract the uncompressed size from the utility's listing
    ///
    /// - `gzip -l`: header line, then `compressed uncompressed ratio name`
    /// - `lzop -l`: header line, then `method compressed uncompressed ratio name`
    /// - `xz --robot --list`: a tab separated `file` line whose 5th field is
    ///   the uncompressed size
    fn parse_listing(&self, output: &str) -> Option<u64> {
        match self {
            Self::Gzip => output.lines().nth(1)?.split_whitespace().nth(1)?.parse().ok(),
            Self::Lzop => output.lines().nth(1)?.split_whitespace().nth(2)?.parse().ok(),
            Self::Xz => output
                .lines()
                .find(|line| line.starts_with("file\t"))?
                .split('\t')
                .nth(4)?
                .parse()
                .ok(),
        }
    }
}

impl std::fmt::Display for CompressionFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Result of probing a compressed object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionInfo {
    pub format: CompressionFormat,
    pub uncompressed_size: u64,
}

/// Detect the compression format of a file from its first bytes
pub fn detect_file(path: &Path) -> Result<Option<CompressionFormat>, CompressionError> {
    let read_error = |source| CompressionError::Read {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(read_error)?;
    let mut magic = Vec::with_capacity(MAGIC_LEN);
    file.take(MAGIC_LEN as u64)
        .read_to_end(&mut magic)
        .map_err(read_error)?;
    Ok(CompressionFormat::from_magic_bytes(&magic))
}

/// Probe a file: `None` when it is not in a recognized compressed format
///
/// The file is integrity-tested with the host utility before its listing
/// is trusted.
pub fn probe(path: &Path) -> Result<Option<CompressionInfo>, CompressionError> {
    let Some(format) = detect_file(path)? else {
        return Ok(None);
    };

    let tool = which::which(format.tool()).map_err(|_| CompressionError::ToolNotFound {
        tool: format.tool(),
        format: format.name(),
    })?;

    let test = Command::new(&tool)
        .arg("-t")
        .arg(path)
        .output()
        .map_err(|source| CompressionError::CommandFailed {
            tool: format.tool(),
            source,
        })?;
    if !test.status.success() {
        return Err(CompressionError::Corrupted {
            path: path.to_path_buf(),
            format: format.name(),
        });
    }

    let listing = Command::new(&tool)
        .args(format.list_args())
        .arg(path)
        .output()
        .map_err(|source| CompressionError::CommandFailed {
            tool: format.tool(),
            source,
        })?;
    let output = String::from_utf8_lossy(&listing.stdout);
    let uncompressed_size =
        format
            .parse_listing(&output)
            .ok_or_else(|| CompressionError::UnexpectedOutput {
                tool: format.tool(),
                output: output.trim().to_string(),
            })?;

    debug!(
        "{} is {} compressed ({} bytes uncompressed)",
        path.display(),
        format,
        uncompressed_size
    );
    Ok(Some(CompressionInfo {
        format,
        uncompressed_size,
    }))
}
