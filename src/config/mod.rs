// src/config/mod.rs
//! Configuration
//!
//! - `settings`: process settings read from the environment
//! - `global`: the user's INI file with credentials and the signing key
//! - `local`: the package state file of the working directory

pub mod global;
pub mod local;
pub mod settings;

pub use global::GlobalConfig;
pub use local::LocalState;
pub use settings::Settings;
