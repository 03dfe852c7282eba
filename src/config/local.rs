// src/config/local.rs

//! Local package state
//!
//! The package being edited in a working directory is kept as its template
//! in a JSON file (`.uhu` by default).

use crate::error::{Error, Result};
use crate::package::Package;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct LocalState {
    path: PathBuf,
}

impl LocalState {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Load the package; `NotFound` when no package was started here
    pub fn load(&self) -> Result<Package> {
        if !self.exists() {
            return Err(Error::NotFound(format!(
                "no package in {}; run `uhu package new` first",
                self.path.display()
            )));
        }
        Package::from_file(&self.path)
    }

    pub fn save(&self, package: &Package) -> Result<()> {
        package.dump(&self.path)?;
        debug!("Saved package state to {}", self.path.display());
        Ok(())
    }

    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("{} was already removed", self.path.display())))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }
}
