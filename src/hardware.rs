// src/hardware.rs

//! Supported hardware
//!
//! Each hardware name carries a sorted set of revisions. A package with no
//! hardware entries installs on any device.

use crate::error::{Error, Result};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Name → revisions of the hardware a package supports
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HardwareManager {
    hardware: BTreeMap<String, BTreeSet<String>>,
}

impl HardwareManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a hardware entry
    pub fn add<I, S>(&mut self, name: &str, revisions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let revisions = revisions.into_iter().map(Into::into).collect();
        self.hardware.insert(name.to_string(), revisions);
    }

    pub fn remove(&mut self, name: &str) -> Result<()> {
        self.hardware
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("hardware {} is not supported", name)))
    }

    pub fn add_revision(&mut self, name: &str, revision: &str) -> Result<()> {
        self.revisions_mut(name)?.insert(revision.to_string());
        Ok(())
    }

    pub fn remove_revision(&mut self, name: &str, revision: &str) -> Result<()> {
        if self.revisions_mut(name)?.remove(revision) {
            Ok(())
        } else {
            Err(Error::NotFound(format!(
                "hardware {} has no revision {}",
                name, revision
            )))
        }
    }

    fn revisions_mut(&mut self, name: &str) -> Result<&mut BTreeSet<String>> {
        self.hardware
            .get_mut(name)
            .ok_or_else(|| Error::NotFound(format!("hardware {} is not supported", name)))
    }

    pub fn revisions(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.hardware.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.hardware.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.hardware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hardware.is_empty()
    }

    /// Wire form: `"any"` or a flat list sorted by (hardware, revision)
    pub fn to_metadata(&self) -> Value {
        if self.hardware.is_empty() {
            return json!("any");
        }
        let mut entries = Vec::new();
        for (name, revisions) in &self.hardware {
            if revisions.is_empty() {
                entries.push(json!({ "hardware": name }));
            }
            for revision in revisions {
                entries.push(json!({ "hardware": name, "hardware-rev": revision }));
            }
        }
        Value::Array(entries)
    }

    /// Persisted form: `{name: {name, revisions}}`
    pub fn to_template(&self) -> Value {
        let entries: Map<String, Value> = self
            .hardware
            .iter()
            .map(|(name, revisions)| {
                (
                    name.clone(),
                    json!({ "name": name, "revisions": revisions }),
                )
            })
            .collect();
        Value::Object(entries)
    }

    pub fn from_template(template: &Value) -> Result<Self> {
        let mut manager = Self::new();
        let entries = match template {
            Value::Null => return Ok(manager),
            Value::Object(entries) => entries,
            other => {
                return Err(Error::InvalidOption(format!(
                    "supported-hardware must be an object, found {}",
                    other
                )));
            }
        };
        for (name, entry) in entries {
            let revisions = entry
                .get("revisions")
                .and_then(Value::as_array)
                .map(|revisions| revisions.iter().map(revision_text).collect::<Result<Vec<_>>>())
                .transpose()?
                .unwrap_or_default();
            manager.add(name, revisions);
        }
        Ok(manager)
    }

    pub fn from_metadata(metadata: &Value) -> Result<Self> {
        let mut manager = Self::new();
        let entries = match metadata {
            Value::String(any) if any == "any" => return Ok(manager),
            Value::Null => return Ok(manager),
            Value::Array(entries) => entries,
            other => {
                return Err(Error::InvalidOption(format!(
                    "supported-hardware must be \"any\" or a list, found {}",
                    other
                )));
            }
        };
        for entry in entries {
            let name = entry.get("hardware").and_then(Value::as_str).ok_or_else(|| {
                Error::InvalidOption(format!("supported-hardware entry without a name: {}", entry))
            })?;
            let revisions = manager.hardware.entry(name.to_string()).or_default();
            if let Some(revision) = entry.get("hardware-rev") {
                revisions.insert(revision_text(revision)?);
            }
        }
        Ok(manager)
    }
}

fn revision_text(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(Error::InvalidOption(format!("{} is not a valid hardware revision", other))),
    }
}
