// src/install_condition/mod.rs

//! Install conditions
//!
//! An install condition tells the device agent when an object should be
//! installed: always, when the stored content differs, or when the version
//! found in the object differs from the one on the device.
//!
//! Locally the condition is spread over the `install-condition*` options.
//! On the wire the server speaks the legacy `install-if-different`
//! vocabulary:
//!
//! | Local | Wire |
//! |-------|------|
//! | `always` | (absent) |
//! | `content-diverges` | `"sha256sum"` |
//! | `version-diverges` + `linux-kernel`/`u-boot` | `{version, pattern: "<name>"}` |
//! | `version-diverges` + `regexp` | `{version, pattern: {regexp, seek, buffer-size}}` |

mod kernel;
mod scan;

pub use kernel::{detect_kernel_image, linux_kernel_version, KernelImage};
pub use scan::{regexp_version, uboot_version};

use crate::error::{Error, Result};
use crate::options::registry::{
    INSTALL_CONDITION, INSTALL_CONDITION_BUFFER_SIZE, INSTALL_CONDITION_PATTERN,
    INSTALL_CONDITION_PATTERN_TYPE, INSTALL_CONDITION_SEEK, INSTALL_CONDITION_VERSION,
    INSTALL_IF_DIFFERENT,
};
use crate::options::{OptionValue, OptionValues};
use serde_json::{json, Map, Value};
use std::path::Path;
use tracing::debug;

/// Pattern strategy used to find a version inside an object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionPattern {
    LinuxKernel,
    UBoot,
    Regexp {
        pattern: String,
        seek: u64,
        /// Bytes to scan, `-1` scans to the end of the file
        buffer_size: i64,
    },
}

impl VersionPattern {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LinuxKernel => "linux-kernel",
            Self::UBoot => "u-boot",
            Self::Regexp { .. } => "regexp",
        }
    }
}

/// Installation policy of an object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallCondition {
    Always,
    ContentDiverges,
    VersionDiverges(VersionPattern),
}

impl InstallCondition {
    /// Build the condition from validated option values
    pub fn from_values(values: &OptionValues) -> Result<Self> {
        let text = |name: &str| values.get(name).and_then(OptionValue::as_text);
        let integer = |name: &str| values.get(name).and_then(OptionValue::as_integer);

        match text(INSTALL_CONDITION).unwrap_or("always") {
            "always" => Ok(Self::Always),
            "content-diverges" => Ok(Self::ContentDiverges),
            "version-diverges" => {
                let pattern = match text(INSTALL_CONDITION_PATTERN_TYPE) {
                    Some("linux-kernel") => VersionPattern::LinuxKernel,
                    Some("u-boot") => VersionPattern::UBoot,
                    Some("regexp") => VersionPattern::Regexp {
                        pattern: text(INSTALL_CONDITION_PATTERN)
                            .ok_or_else(|| {
                                Error::MissingOption(INSTALL_CONDITION_PATTERN.to_string())
                            })?
                            .to_string(),
                        seek: integer(INSTALL_CONDITION_SEEK).unwrap_or(0).max(0) as u64,
                        buffer_size: integer(INSTALL_CONDITION_BUFFER_SIZE).unwrap_or(-1),
                    },
                    Some(other) => {
                        return Err(Error::InvalidOption(format!(
                            "unknown install-condition pattern type: {}",
                            other
                        )));
                    }
                    None => {
                        return Err(Error::MissingOption(
                            INSTALL_CONDITION_PATTERN_TYPE.to_string(),
                        ));
                    }
                };
                Ok(Self::VersionDiverges(pattern))
            }
            other => Err(Error::InvalidOption(format!(
                "unknown install-condition: {}",
                other
            ))),
        }
    }

    /// Wire form of the condition, scanning the object for a version when
    /// needed. `None` when the object is always installed.
    pub fn to_install_if_different(&self, path: &Path) -> Result<Option<Value>> {
        match self {
            Self::Always => Ok(None),
            Self::ContentDiverges => Ok(Some(json!("sha256sum"))),
            Self::VersionDiverges(pattern) => {
                let version = extract_version(path, pattern)?;
                debug!("{} version of {}: {}", pattern.name(), path.display(), version);
                let pattern_value = match pattern {
                    VersionPattern::Regexp {
                        pattern,
                        seek,
                        buffer_size,
                    } => json!({
                        "regexp": pattern,
                        "seek": seek,
                        "buffer-size": buffer_size,
                    }),
                    other => json!(other.name()),
                };
                Ok(Some(json!({ "version": version, "pattern": pattern_value })))
            }
        }
    }
}

/// Extract a version string from a file with the given strategy
pub fn extract_version(path: &Path, pattern: &VersionPattern) -> Result<String> {
    match pattern {
        VersionPattern::LinuxKernel => linux_kernel_version(path),
        VersionPattern::UBoot => uboot_version(path),
        VersionPattern::Regexp {
            pattern,
            seek,
            buffer_size,
        } => regexp_version(path, pattern, *seek, *buffer_size),
    }
}

/// Translate a wire `install-if-different` entry into the local
/// install-condition options. The key is removed from the map.
pub(crate) fn expand_install_if_different(map: &mut Map<String, Value>) -> Result<()> {
    let Some(value) = map.remove(INSTALL_IF_DIFFERENT) else {
        return Ok(());
    };

    match value {
        Value::Null => {}
        Value::String(s) if s == "sha256sum" => {
            map.insert(INSTALL_CONDITION.into(), json!("content-diverges"));
        }
        Value::Object(entry) => {
            let version = match entry.get("version") {
                Some(Value::String(v)) => v.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => {
                    return Err(Error::InvalidOption(
                        "install-if-different: missing version".to_string(),
                    ));
                }
            };
            map.insert(INSTALL_CONDITION.into(), json!("version-diverges"));
            map.insert(INSTALL_CONDITION_VERSION.into(), json!(version));

            match entry.get("pattern") {
                Some(Value::String(name)) if name == "linux-kernel" || name == "u-boot" => {
                    map.insert(INSTALL_CONDITION_PATTERN_TYPE.into(), json!(name));
                }
                Some(Value::Object(custom)) => {
                    let regexp = custom.get("regexp").filter(|r| !r.is_null()).ok_or_else(|| {
                        Error::InvalidOption(
                            "install-if-different: pattern is missing regexp".to_string(),
                        )
                    })?;
                    map.insert(INSTALL_CONDITION_PATTERN_TYPE.into(), json!("regexp"));
                    map.insert(INSTALL_CONDITION_PATTERN.into(), regexp.clone());
                    map.insert(
                        INSTALL_CONDITION_SEEK.into(),
                        custom.get("seek").cloned().unwrap_or(json!(0)),
                    );
                    map.insert(
                        INSTALL_CONDITION_BUFFER_SIZE.into(),
                        custom.get("buffer-size").cloned().unwrap_or(json!(-1)),
                    );
                }
                other => {
                    return Err(Error::InvalidOption(format!(
                        "install-if-different: unknown pattern {}",
                        other.cloned().unwrap_or(Value::Null)
                    )));
                }
            }
        }
        other => {
            return Err(Error::InvalidOption(format!(
                "install-if-different: unsupported value {}",
                other
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn expand(value: Value) -> Result<Map<String, Value>> {
        let mut map = Map::new();
        map.insert(INSTALL_IF_DIFFERENT.into(), value);
        expand_install_if_different(&mut map)?;
        Ok(map)
    }

    #[test]
    fn test_expand_sha256sum() {
        let map = expand(json!("sha256sum")).unwrap();
        assert_eq!(map[INSTALL_CONDITION], json!("content-diverges"));
        assert!(!map.contains_key(INSTALL_IF_DIFFERENT));
    }

    #[test]
    fn test_expand_known_pattern() {
        let map = expand(json!({"version": "4.1", "pattern": "linux-kernel"})).unwrap();
        assert_eq!(map[INSTALL_CONDITION], json!("version-diverges"));
        assert_eq!(map[INSTALL_CONDITION_PATTERN_TYPE], json!("linux-kernel"));
        assert_eq!(map[INSTALL_CONDITION_VERSION], json!("4.1"));
    }

    #[test]
    fn test_expand_regexp_defaults() {
        let map = expand(json!({"version": "1.0", "pattern": {"regexp": ".+"}})).unwrap();
        assert_eq!(map[INSTALL_CONDITION_PATTERN_TYPE], json!("regexp"));
        assert_eq!(map[INSTALL_CONDITION_PATTERN], json!(".+"));
        assert_eq!(map[INSTALL_CONDITION_SEEK], json!(0));
        assert_eq!(map[INSTALL_CONDITION_BUFFER_SIZE], json!(-1));
    }

    #[test]
    fn test_expand_rejects_incomplete_entries() {
        assert!(matches!(
            expand(json!({"pattern": "u-boot"})),
            Err(Error::InvalidOption(_))
        ));
        assert!(matches!(
            expand(json!({"version": "1.0", "pattern": {"seek": 3}})),
            Err(Error::InvalidOption(_))
        ));
        assert!(matches!(
            expand(json!({"version": "1.0", "pattern": "bios"})),
            Err(Error::InvalidOption(_))
        ));
        assert!(matches!(expand(json!("md5sum")), Err(Error::InvalidOption(_))));
    }

    #[test]
    fn test_emission_forms() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"\x00\x01firmware v2.7.1 build\x00").unwrap();

        assert_eq!(InstallCondition::Always.to_install_if_different(file.path()).unwrap(), None);
        assert_eq!(
            InstallCondition::ContentDiverges
                .to_install_if_different(file.path())
                .unwrap(),
            Some(json!("sha256sum"))
        );

        let condition = InstallCondition::VersionDiverges(VersionPattern::Regexp {
            pattern: r"v(\d+\.\d+\.\d+)".to_string(),
            seek: 0,
            buffer_size: -1,
        });
        assert_eq!(
            condition.to_install_if_different(file.path()).unwrap(),
            Some(json!({
                "version": "2.7.1",
                "pattern": {"regexp": r"v(\d+\.\d+\.\d+)", "seek": 0, "buffer-size": -1}
            }))
        );
    }
}
