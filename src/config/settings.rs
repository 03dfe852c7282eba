// src/config/settings.rs
//! Environment settings
//!
//! Every setting has a default and an environment override:
//!
//! | Variable | Default |
//! |---|---|
//! | `UHU_CHUNK_SIZE` | 131072 |
//! | `UHU_SERVER_URL` | `http://0.0.0.0` |
//! | `UHU_GLOBAL_CONFIG` | `~/.uhu` |
//! | `UHU_LOCAL_CONFIG` | `.uhu` |
//! | `UHU_PRIVATE_KEY` | unset (falls back to the global config) |

use crate::error::{Error, Result};
use crate::object::DEFAULT_CHUNK_SIZE;
use std::path::PathBuf;

pub const CHUNK_SIZE_VAR: &str = "UHU_CHUNK_SIZE";
pub const SERVER_URL_VAR: &str = "UHU_SERVER_URL";
pub const GLOBAL_CONFIG_VAR: &str = "UHU_GLOBAL_CONFIG";
pub const LOCAL_CONFIG_VAR: &str = "UHU_LOCAL_CONFIG";
pub const PRIVATE_KEY_VAR: &str = "UHU_PRIVATE_KEY";

pub const DEFAULT_SERVER_URL: &str = "http://0.0.0.0";
const GLOBAL_CONFIG_NAME: &str = ".uhu";
const LOCAL_CONFIG_NAME: &str = ".uhu";

/// Settings threaded through the commands and the transaction engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub chunk_size: usize,
    pub server_url: String,
    pub global_config: PathBuf,
    pub local_config: PathBuf,
    /// Private key override; takes precedence over the global config
    pub private_key: Option<PathBuf>,
}

impl Settings {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through a variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| lookup(name).filter(|value| !value.is_empty());

        let chunk_size = match value(CHUNK_SIZE_VAR) {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(size) if size > 0 => size,
                _ => {
                    return Err(Error::Config(format!(
                        "{} must be a positive integer, got {:?}",
                        CHUNK_SIZE_VAR, raw
                    )));
                }
            },
            None => DEFAULT_CHUNK_SIZE,
        };

        let global_config = match value(GLOBAL_CONFIG_VAR) {
            Some(path) => PathBuf::from(path),
            None => dirs::home_dir()
                .map(|home| home.join(GLOBAL_CONFIG_NAME))
                .ok_or_else(|| Error::Config("cannot determine the home directory".to_string()))?,
        };

        Ok(Self {
            chunk_size,
            server_url: value(SERVER_URL_VAR).unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
            global_config,
            local_config: value(LOCAL_CONFIG_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG_NAME)),
            private_key: value(PRIVATE_KEY_VAR).map(PathBuf::from),
        })
    }
}
