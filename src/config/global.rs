// src/config/global.rs

//! Global configuration file
//!
//! An INI file shared by every package the user works on:
//!
//! ```ini
//! [auth]
//! access_id = ...
//! access_secret = ...
//!
//! [settings]
//! private_key_path = /path/to/key.pem
//! ```

use crate::error::{Error, Result};
use ini::Ini;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const AUTH_SECTION: &str = "auth";
pub const SETTINGS_SECTION: &str = "settings";
pub const ACCESS_ID: &str = "access_id";
pub const ACCESS_SECRET: &str = "access_secret";
pub const PRIVATE_KEY_PATH: &str = "private_key_path";

/// The user's global configuration, bound to its file
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    path: PathBuf,
    ini: Ini,
}

impl GlobalConfig {
    /// Load the file at `path`; a missing file gives an empty configuration
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let ini = match Ini::load_from_file(&path) {
            Ok(ini) => ini,
            Err(ini::Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ini::new(),
            Err(ini::Error::Io(e)) => return Err(Error::Io(e)),
            Err(ini::Error::Parse(e)) => {
                return Err(Error::Config(format!("{}: {}", path.display(), e)));
            }
        };
        Ok(Self { path, ini })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the configuration back to its file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        self.ini.write_to_file(&self.path)?;
        debug!("Saved global config to {}", self.path.display());
        Ok(())
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.ini.get_from(Some(section), key)
    }

    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.ini
            .with_section(Some(section))
            .set(key, value);
    }

    /// Access id and secret; both must be configured
    pub fn credentials(&self) -> Result<(String, String)> {
        let access_id = self.get(AUTH_SECTION, ACCESS_ID);
        let access_secret = self.get(AUTH_SECTION, ACCESS_SECRET);
        match (access_id, access_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                Ok((id.to_string(), secret.to_string()))
            }
            _ => Err(Error::Config(format!(
                "access id and secret are not set in {}; run `uhu config init`",
                self.path.display()
            ))),
        }
    }

    pub fn set_credentials(&mut self, access_id: &str, access_secret: &str) {
        self.set(AUTH_SECTION, ACCESS_ID, access_id);
        self.set(AUTH_SECTION, ACCESS_SECRET, access_secret);
    }

    /// Path of the package signing key
    ///
    /// `env_override` (from `UHU_PRIVATE_KEY`) wins over the file. The result
    /// must name an existing file.
    pub fn private_key_path(&self, env_override: Option<&Path>) -> Result<PathBuf> {
        let path = match env_override {
            Some(path) => path.to_path_buf(),
            None => self
                .get(SETTINGS_SECTION, PRIVATE_KEY_PATH)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
                .ok_or_else(|| {
                    Error::Config("private key is not set; run `uhu config set-private-key`".to_string())
                })?,
        };
        if !path.is_file() {
            return Err(Error::Config(format!(
                "private key {} is not a file",
                path.display()
            )));
        }
        Ok(path)
    }

    pub fn set_private_key_path(&mut self, path: &Path) -> Result<()> {
        if !path.is_file() {
            return Err(Error::Config(format!("{} is not a file", path.display())));
        }
        let path = fs::canonicalize(path)?;
        self.set(SETTINGS_SECTION, PRIVATE_KEY_PATH, &path.to_string_lossy());
        Ok(())
    }

    /// Remove the configuration file at `path`
    pub fn cleanup(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => {
                debug!("Removed {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("{} was already removed", path.display())))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let config = GlobalConfig::load(dir.path().join("uhu.ini")).unwrap();
        assert_eq!(config.get(AUTH_SECTION, ACCESS_ID), None);
        assert!(matches!(config.credentials(), Err(Error::Config(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("uhu.ini");

        let mut config = GlobalConfig::load(&path).unwrap();
        config.set_credentials("my-id", "my-secret");
        config.set("settings", "color", "never");
        config.save().unwrap();

        let config = GlobalConfig::load(&path).unwrap();
        assert_eq!(
            config.credentials().unwrap(),
            ("my-id".to_string(), "my-secret".to_string())
        );
        assert_eq!(config.get("settings", "color"), Some("never"));
    }

    #[test]
    fn test_partial_credentials() {
        let dir = TempDir::new().unwrap();
        let mut config = GlobalConfig::load(dir.path().join("uhu.ini")).unwrap();
        config.set(AUTH_SECTION, ACCESS_ID, "only-id");
        assert!(matches!(config.credentials(), Err(Error::Config(_))));
    }

    #[test]
    fn test_private_key_path() {
        let dir = TempDir::new().unwrap();
        let key = dir.path().join("key.pem");
        let other = dir.path().join("other.pem");
        fs::write(&key, "key").unwrap();
        fs::write(&other, "other").unwrap();

        let mut config = GlobalConfig::load(dir.path().join("uhu.ini")).unwrap();
        assert!(config.private_key_path(None).is_err());

        assert!(config.set_private_key_path(dir.path()).is_err());
        config.set_private_key_path(&key).unwrap();
        assert_eq!(
            config.private_key_path(None).unwrap(),
            fs::canonicalize(&key).unwrap()
        );

        // Environment override wins
        assert_eq!(config.private_key_path(Some(&other)).unwrap(), other);
        assert!(config
            .private_key_path(Some(&dir.path().join("missing.pem")))
            .is_err());
    }

    #[test]
    fn test_cleanup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("uhu.ini");
        let mut config = GlobalConfig::load(&path).unwrap();
        config.set_credentials("id", "secret");
        config.save().unwrap();

        GlobalConfig::cleanup(&path).unwrap();
        assert!(!path.exists());
        assert!(matches!(GlobalConfig::cleanup(&path), Err(Error::NotFound(_))));
    }
}
