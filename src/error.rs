// src/error.rs

//! Crate-wide error type
//!
//! Every fallible library operation returns [`Result`]. Variants map to the
//! error kinds the command line reports, so the binary can translate them
//! into exit codes without string matching.

use crate::compression::CompressionError;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by option validation, object inspection and the
/// push/pull protocol
#[derive(Error, Debug)]
pub enum Error {
    /// Option unknown to the mode, wrong type, out of bounds or bad choice
    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// Mode-required option absent
    #[error("missing option: {0}")]
    MissingOption(String),

    /// An option's requirements are not met by its sibling values
    #[error("unsatisfied requirement: {0}")]
    UnsatisfiedRequirement(String),

    /// Install-condition scan found no version string
    #[error("could not extract version from {path}: {reason}")]
    VersionExtractionFailed { path: String, reason: String },

    /// Compression probe failure
    #[error(transparent)]
    Compression(#[from] CompressionError),

    /// Transport-level failure (connect, DNS, timeout, invalid URL)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Server answered 401
    #[error("authentication required: check your access id and secret")]
    AuthRequired,

    /// Protocol failure at any push phase, or aggregated object failures
    #[error("upload failed: {0}")]
    Upload(String),

    /// Server error or unreadable body on pull
    #[error("download failed: {0}")]
    Download(String),

    /// A local file diverges from the pulled package and would be clobbered
    #[error("{} exists and differs from the package object; refusing to overwrite", .0.display())]
    FileWouldBeOverwritten(PathBuf),

    /// Metadata rejected by the schema check
    #[error("invalid metadata: {}", .0.join("; "))]
    InvalidMetadata(Vec<String>),

    /// Output file exists and overwriting was not requested
    #[error("{} already exists", .0.display())]
    FileExists(PathBuf),

    /// Resource not found on the server or locally
    #[error("not found: {0}")]
    NotFound(String),

    /// Configuration file or environment problem
    #[error("configuration error: {0}")]
    Config(String),

    /// Private key loading or signing failure
    #[error("signing error: {0}")]
    Signing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Convenience constructor for [`Error::VersionExtractionFailed`]
    pub fn version_extraction(path: &std::path::Path, reason: impl Into<String>) -> Self {
        Self::VersionExtractionFailed {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors raised while validating option maps
    pub fn is_option_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidOption(_) | Self::MissingOption(_) | Self::UnsatisfiedRequirement(_)
        )
    }

    /// True for errors in the download family (server errors on pull and
    /// refusals to clobber divergent local files)
    pub fn is_download_error(&self) -> bool {
        matches!(self, Self::Download(_) | Self::FileWouldBeOverwritten(_))
    }
}
