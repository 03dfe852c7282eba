// src/object/mod.rs

//! Package objects
//!
//! An object is one file plus the options describing how the device agent
//! installs it. Its behaviour is selected by [`Mode`]; the option values are
//! validated eagerly on construction and on every update.
//!
//! Two serialized forms exist:
//! - template: persisted, human-editable, no derived (volatile) fields
//! - metadata: wire form for the server, with size, SHA-256, compression
//!   details and the legacy `install-if-different` spelling

mod chunks;
pub mod manager;
mod mode;

pub use chunks::ObjectChunks;
pub(crate) use chunks::read_full;
pub use manager::{ObjectEntry, ObjectsManager};
pub use mode::Mode;

use crate::compression;
use crate::error::{Error, Result};
use crate::install_condition::InstallCondition;
use crate::options::registry::{self, COMPRESSED, FILENAME, REQUIRED_UNCOMPRESSED_SIZE, SHA256SUM, SIZE};
use crate::options::{validate, OptionValue, OptionValues};
use crate::progress::TransferProgress;
use md5::Md5;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Default read chunk size (`UHU_CHUNK_SIZE`)
pub const DEFAULT_CHUNK_SIZE: usize = 131072;

/// Summary handed to the uploader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadInfo {
    pub filename: String,
    pub size: u64,
    pub sha256sum: String,
    pub md5: String,
    pub chunks: u64,
}

/// A file with its installation options
#[derive(Debug, Clone)]
pub struct Object {
    mode: Mode,
    values: OptionValues,
    md5: Option<String>,
    loaded: bool,
    chunk_size: usize,
}

impl Object {
    /// Build an object from a raw option map
    pub fn new(mode: Mode, options: &Map<String, Value>) -> Result<Self> {
        let values = validate::validate(mode, options)?;
        Ok(Self {
            mode,
            values,
            md5: None,
            loaded: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Build an object from a template or metadata entry carrying its `mode`
    pub fn from_map(entry: &Map<String, Value>) -> Result<Self> {
        let mode = match entry.get("mode") {
            Some(Value::String(name)) => Mode::from_str(name)
                .map_err(|_| Error::InvalidOption(format!("unknown mode: {}", name)))?,
            _ => return Err(Error::MissingOption("mode".to_string())),
        };
        let mut options = entry.clone();
        options.remove("mode");
        Self::new(mode, &options)
    }

    /// Set the size of chunks read while hashing and uploading
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.set_chunk_size(chunk_size);
        self
    }

    pub fn set_chunk_size(&mut self, chunk_size: usize) {
        self.chunk_size = chunk_size.max(1);
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn values(&self) -> &OptionValues {
        &self.values
    }

    pub fn get(&self, option: &str) -> Option<&OptionValue> {
        self.values.get(option)
    }

    pub fn filename(&self) -> &str {
        self.values
            .get(FILENAME)
            .and_then(OptionValue::as_text)
            .unwrap_or_default()
    }

    pub fn path(&self) -> &Path {
        Path::new(self.filename())
    }

    /// Size in bytes, from the last load or from server metadata
    pub fn size(&self) -> Option<u64> {
        self.values
            .get(SIZE)
            .and_then(OptionValue::as_integer)
            .map(|size| size as u64)
    }

    /// SHA-256 hex digest, from the last load or from server metadata
    pub fn sha256sum(&self) -> Option<&str> {
        self.values.get(SHA256SUM).and_then(OptionValue::as_text)
    }

    pub fn md5(&self) -> Option<&str> {
        self.md5.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Number of chunks the object splits into, once its size is known
    pub fn chunk_count(&self) -> Option<u64> {
        self.size().map(|size| size.div_ceil(self.chunk_size as u64))
    }

    /// Parsed install condition of the object
    pub fn install_condition(&self) -> Result<InstallCondition> {
        InstallCondition::from_values(&self.values)
    }

    /// Stream the file once, computing size, SHA-256 and MD5
    ///
    /// Every call re-reads the file.
    pub fn load(&mut self, progress: Option<&dyn TransferProgress>) -> Result<()> {
        let mut chunks = ObjectChunks::open(self.path(), self.chunk_size)?;
        let mut sha256 = Sha256::new();
        let mut md5 = Md5::new();
        let mut size: u64 = 0;

        while let Some(chunk) = chunks.next_chunk()? {
            sha256.update(chunk);
            md5.update(chunk);
            size += chunk.len() as u64;
            if let Some(progress) = progress {
                progress.object_read();
            }
        }

        let sha256sum = hex::encode(sha256.finalize());
        debug!("Loaded {} ({} bytes, sha256 {})", self.filename(), size, sha256sum);
        self.values.insert(SIZE.to_string(), OptionValue::Integer(size as i64));
        self.values.insert(SHA256SUM.to_string(), OptionValue::Text(sha256sum));
        self.md5 = Some(hex::encode(md5.finalize()));
        self.loaded = true;
        Ok(())
    }

    fn ensure_loaded(&mut self, progress: Option<&dyn TransferProgress>) -> Result<()> {
        if !self.loaded {
            self.load(progress)?;
        }
        Ok(())
    }

    /// Wire form of the object
    pub fn to_metadata(&mut self, progress: Option<&dyn TransferProgress>) -> Result<Map<String, Value>> {
        self.ensure_loaded(progress)?;

        let mut metadata = Map::new();
        for (name, value) in &self.values {
            let Some(decl) = registry::get(name) else {
                continue;
            };
            if decl.volatile || decl.is_install_condition() {
                continue;
            }
            metadata.insert(name.clone(), value.to_json());
        }
        metadata.insert("mode".into(), Value::from(self.mode.to_string()));
        metadata.insert(SIZE.into(), Value::from(self.size().unwrap_or_default()));
        metadata.insert(
            SHA256SUM.into(),
            Value::from(self.sha256sum().unwrap_or_default()),
        );

        if self.mode.allows_compression() {
            if let Some(info) = compression::probe(self.path())? {
                metadata.insert(COMPRESSED.into(), Value::Bool(true));
                metadata.insert(
                    REQUIRED_UNCOMPRESSED_SIZE.into(),
                    Value::from(info.uncompressed_size),
                );
            }
        }

        if self.mode.allows_install_condition() {
            if let Some(condition) = self.install_condition()?.to_install_if_different(self.path())? {
                metadata.insert(registry::INSTALL_IF_DIFFERENT.into(), condition);
            }
        }
        Ok(metadata)
    }

    /// Persisted form of the object (no volatile fields)
    pub fn to_template(&self) -> Map<String, Value> {
        let mut template = Map::new();
        for (name, value) in &self.values {
            if registry::get(name).is_some_and(|decl| decl.volatile) {
                continue;
            }
            template.insert(name.clone(), value.to_json());
        }
        template.insert("mode".into(), Value::from(self.mode.to_string()));
        template
    }

    /// Short summary the uploader needs
    pub fn to_upload(&mut self) -> Result<UploadInfo> {
        self.ensure_loaded(None)?;
        Ok(UploadInfo {
            filename: self.filename().to_string(),
            size: self.size().unwrap_or_default(),
            sha256sum: self.sha256sum().unwrap_or_default().to_string(),
            md5: self.md5.clone().unwrap_or_default(),
            chunks: self.chunk_count().unwrap_or_default(),
        })
    }

    /// Chunked reader over the object's file
    pub fn chunks(&self) -> Result<ObjectChunks> {
        Ok(ObjectChunks::open(self.path(), self.chunk_size)?)
    }

    /// Change one option, revalidating the whole map
    ///
    /// A `null` value removes the option. Options whose requirements on the
    /// changed option no longer hold are removed with it, transitively. On
    /// error the object is unchanged.
    pub fn update(&mut self, option: &str, value: &Value) -> Result<()> {
        let decl = registry::get(option).ok_or_else(|| {
            Error::InvalidOption(format!("{} is not a valid option", option))
        })?;
        let changed = if value.is_null() {
            None
        } else {
            Some(validate::validate_value(decl, value)?)
        };

        // Defaults are dropped so they get re-injected only where their
        // requirements still hold
        let mut options = Map::new();
        for (name, current) in &self.values {
            let is_default = registry::get(name)
                .and_then(|d| d.default)
                .is_some_and(|default| default.matches(current));
            if name != option && !is_default {
                options.insert(name.clone(), current.to_json());
            }
        }
        if !value.is_null() {
            options.insert(option.to_string(), value.clone());
        } else if self.mode.is_required(option) {
            return Err(Error::MissingOption(format!(
                "{} is required by mode {}",
                option, self.mode
            )));
        }

        drop_broken_dependents(&mut options, option, changed);

        let values = validate::validate(self.mode, &options)?;
        let filename_changed = decl.metadata == FILENAME && values.get(FILENAME) != self.values.get(FILENAME);
        self.values = values;
        if filename_changed {
            self.values.remove(SIZE);
            self.values.remove(SHA256SUM);
            self.md5 = None;
            self.loaded = false;
        }
        Ok(())
    }

    /// Human readable one-line description from the mode's display template
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let mut rest = self.mode.display_template();
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let Some(len) = rest[start..].find('}') else {
                break;
            };
            let name = &rest[start + 1..start + len];
            match self.values.get(name) {
                Some(value) => out.push_str(&value.to_string()),
                None => out.push('?'),
            }
            rest = &rest[start + len + 1..];
        }
        out.push_str(rest);
        out
    }
}

/// Remove options that require a value of `option` it no longer has
fn drop_broken_dependents(options: &mut Map<String, Value>, option: &str, value: Option<OptionValue>) {
    let mut pending = vec![(option.to_string(), value)];
    while let Some((changed, current)) = pending.pop() {
        let broken: Vec<String> = options
            .keys()
            .filter(|name| {
                registry::get(name).is_some_and(|decl| {
                    decl.requirements.iter().any(|(required, expected)| {
                        *required == changed
                            && !current.as_ref().is_some_and(|v| expected.matches(v))
                    })
                })
            })
            .cloned()
            .collect();
        for name in broken {
            debug!("Dropping {} along with {}", name, changed);
            options.remove(&name);
            pending.push((name, None));
        }
    }
}
