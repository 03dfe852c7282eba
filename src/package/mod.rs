// src/package/mod.rs

//! Firmware update packages
//!
//! A package aggregates a product identifier, a version, the supported
//! hardware and the installation sets of objects. It has two serialized
//! forms: the template, persisted locally and edited by the user, and the
//! metadata, sent to the server and stored in archives.

pub mod archive;
pub mod schema;

use crate::error::{Error, Result};
use crate::hardware::HardwareManager;
use crate::object::{Mode, ObjectsManager};
use crate::progress::TransferProgress;
use serde_json::{Map, Value, json};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tracing::debug;

pub use archive::dump_package_archive;

/// A firmware update package
#[derive(Debug, Clone, Default)]
pub struct Package {
    /// Product UID (64 hex characters)
    pub product: Option<String>,
    pub version: Option<String>,
    /// Assigned by the server when the metadata is uploaded
    pub uid: Option<String>,
    pub hardware: HardwareManager,
    pub objects: ObjectsManager,
}

impl Package {
    /// Empty package with two installation sets
    pub fn new(product: Option<String>, version: Option<String>) -> Self {
        Self {
            product,
            version,
            ..Self::default()
        }
    }

    /// Empty package with the given number of installation sets
    pub fn with_sets(n_sets: usize) -> Result<Self> {
        Ok(Self {
            objects: ObjectsManager::new(n_sets)?,
            ..Self::default()
        })
    }

    /// Add an object to every installation set
    pub fn add_object(&mut self, mode: Mode, options: &Map<String, Value>) -> Result<usize> {
        self.objects.create(mode, options)
    }

    /// Persisted form (no uid, no volatile object fields)
    pub fn to_template(&self) -> Value {
        json!({
            "product": self.product,
            "version": self.version,
            "supported-hardware": self.hardware.to_template(),
            "objects": self.objects.to_template(),
        })
    }

    /// Wire form; objects are loaded (hashed) as needed
    pub fn to_metadata(&mut self, progress: Option<&dyn TransferProgress>) -> Result<Value> {
        Ok(json!({
            "product": self.product,
            "version": self.version,
            "supported-hardware": self.hardware.to_metadata(),
            "objects": self.objects.to_metadata(progress)?,
        }))
    }

    /// Write the template with the version cleared
    pub fn export(&self, path: &Path) -> Result<()> {
        let mut template = self.to_template();
        template["version"] = Value::Null;
        write_json(path, &template)
    }

    /// Write the template as is
    pub fn dump(&self, path: &Path) -> Result<()> {
        write_json(path, &self.to_template())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let template: Value = serde_json::from_str(&content)?;
        debug!("Loaded package template from {}", path.display());
        Self::from_template(&template)
    }

    pub fn from_template(template: &Value) -> Result<Self> {
        Ok(Self {
            product: text_field(template, "product")?,
            version: text_field(template, "version")?,
            uid: None,
            hardware: HardwareManager::from_template(&template["supported-hardware"])?,
            objects: objects_field(template)?,
        })
    }

    /// Rebuild from wire metadata; `install-if-different` is expanded back
    /// into the install-condition options
    pub fn from_metadata(metadata: &Value) -> Result<Self> {
        Ok(Self {
            product: text_field(metadata, "product")?,
            version: text_field(metadata, "version")?,
            uid: None,
            hardware: HardwareManager::from_metadata(&metadata["supported-hardware"])?,
            objects: objects_field(metadata)?,
        })
    }

    /// Human readable description of the package
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Product: {}", self.product.as_deref().unwrap_or("(unset)"));
        let _ = writeln!(out, "Version: {}", self.version.as_deref().unwrap_or("(unset)"));
        if let Some(uid) = &self.uid {
            let _ = writeln!(out, "UID: {}", uid);
        }

        if self.hardware.is_empty() {
            let _ = writeln!(out, "Supported hardware: any");
        } else {
            let _ = writeln!(out, "Supported hardware:");
            for name in self.hardware.names() {
                let revisions = self
                    .hardware
                    .revisions(name)
                    .map(|revisions| revisions.iter().cloned().collect::<Vec<_>>().join(", "))
                    .unwrap_or_default();
                if revisions.is_empty() {
                    let _ = writeln!(out, "  {}", name);
                } else {
                    let _ = writeln!(out, "  {} ({})", name, revisions);
                }
            }
        }

        for set_index in 0..self.objects.n_sets() {
            let _ = writeln!(out, "Installation set {}:", set_index);
            let mut empty = true;
            for (index, object) in self.objects.set(set_index).enumerate() {
                let _ = writeln!(out, "  {}  {}", index, object.describe());
                empty = false;
            }
            if empty {
                let _ = writeln!(out, "  (no objects)");
            }
        }
        out
    }
}

fn text_field(document: &Value, key: &str) -> Result<Option<String>> {
    match document.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(Error::InvalidOption(format!(
            "{} must be a string, found {}",
            key, other
        ))),
    }
}

/// The number of installation sets is the length of the `objects` array
fn objects_field(document: &Value) -> Result<ObjectsManager> {
    match document.get("objects") {
        None | Some(Value::Null) => Ok(ObjectsManager::default()),
        Some(Value::Array(sets)) => ObjectsManager::from_dump(sets),
        Some(other) => Err(Error::InvalidOption(format!(
            "objects must be a list of installation sets, found {}",
            other
        ))),
    }
}

/// Pretty JSON with sorted keys
fn write_json(path: &Path, value: &Value) -> Result<()> {
    let mut content = serde_json::to_string_pretty(value)?;
    content.push('\n');
    fs::write(path, content)?;
    debug!("Wrote {}", path.display());
    Ok(())
}
