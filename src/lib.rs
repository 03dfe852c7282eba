// src/lib.rs

//! UpdateHub package utilities
//!
//! Library behind the `uhu` command: build firmware update packages, sign
//! them, and move them to and from the update-distribution server.
//!
//! # Architecture
//!
//! - Options: every installation mode declares typed options; objects are
//!   validated against their mode on creation and on every edit
//! - Objects: files plus their mode options, grouped in one or two
//!   installation sets that must agree on everything but the target
//! - Packages: product, version, supported hardware and objects, with a
//!   template form (local state) and a metadata form (wire)
//! - Transactions: push, pull and status over an HMAC-signed HTTP API

pub mod compression;
pub mod config;
mod error;
pub mod hardware;
pub mod http;
pub mod install_condition;
pub mod object;
pub mod options;
pub mod package;
pub mod progress;
pub mod signing;
pub mod transaction;

pub use config::{GlobalConfig, LocalState, Settings};
pub use error::{Error, Result};
pub use hardware::HardwareManager;
pub use object::{Mode, Object, ObjectsManager};
pub use package::Package;
pub use progress::{CallbackProgress, CliProgress, LogProgress, SilentProgress, TransferProgress};
pub use signing::PackageSigner;
pub use transaction::{TransactionEngine, UploadResult};
