// src/options/registry.rs

//! Compile-time table of every recognized object option
//!
//! Each entry is keyed by its stable wire name. Modes refer to options by
//! that name; the validator looks declarations up through [`get`].

use super::value::ConstValue;

/// Declared type of an option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Boolean,
    Integer,
    String,
    AbsolutePath,
}

impl OptionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::String => "string",
            Self::AbsolutePath => "absolute path",
        }
    }
}

/// Declaration of a single option
#[derive(Debug, Clone, Copy)]
pub struct OptionDecl {
    /// Stable wire name (`target-device`, `chunk-size`, ...)
    pub metadata: &'static str,
    pub kind: OptionKind,
    pub default: Option<ConstValue>,
    /// Inclusive lower bound (integer value or string length)
    pub min: Option<i64>,
    /// Inclusive upper bound (integer value or string length)
    pub max: Option<i64>,
    pub choices: &'static [&'static str],
    /// Derived at load time, never persisted in templates
    pub volatile: bool,
    /// Same value in every installation set
    pub symmetric: bool,
    /// Sibling values that must hold for this option to be set
    pub requirements: &'static [(&'static str, ConstValue)],
    pub help: &'static str,
}

impl OptionDecl {
    const fn new(metadata: &'static str, kind: OptionKind, help: &'static str) -> Self {
        Self {
            metadata,
            kind,
            default: None,
            min: None,
            max: None,
            choices: &[],
            volatile: false,
            symmetric: true,
            requirements: &[],
            help,
        }
    }

    const fn default(mut self, value: ConstValue) -> Self {
        self.default = Some(value);
        self
    }

    const fn min(mut self, min: i64) -> Self {
        self.min = Some(min);
        self
    }

    const fn max(mut self, max: i64) -> Self {
        self.max = Some(max);
        self
    }

    const fn choices(mut self, choices: &'static [&'static str]) -> Self {
        self.choices = choices;
        self
    }

    const fn volatile(mut self) -> Self {
        self.volatile = true;
        self
    }

    const fn asymmetric(mut self) -> Self {
        self.symmetric = false;
        self
    }

    const fn requires(mut self, requirements: &'static [(&'static str, ConstValue)]) -> Self {
        self.requirements = requirements;
        self
    }

    /// Whether the option belongs to the install-condition family, which is
    /// template-only and replaced by `install-if-different` on the wire
    pub fn is_install_condition(&self) -> bool {
        self.metadata.starts_with("install-condition")
    }
}

pub const FILENAME: &str = "filename";
pub const TARGET_TYPE: &str = "target-type";
pub const TARGET: &str = "target";
pub const TARGET_PATH: &str = "target-path";
pub const SIZE: &str = "size";
pub const SHA256SUM: &str = "sha256sum";
pub const COMPRESSED: &str = "compressed";
pub const REQUIRED_UNCOMPRESSED_SIZE: &str = "required-uncompressed-size";
pub const INSTALL_IF_DIFFERENT: &str = "install-if-different";
pub const INSTALL_CONDITION: &str = "install-condition";
pub const INSTALL_CONDITION_PATTERN_TYPE: &str = "install-condition-pattern-type";
pub const INSTALL_CONDITION_PATTERN: &str = "install-condition-pattern";
pub const INSTALL_CONDITION_SEEK: &str = "install-condition-seek";
pub const INSTALL_CONDITION_BUFFER_SIZE: &str = "install-condition-buffer-size";
pub const INSTALL_CONDITION_VERSION: &str = "install-condition-version";

const REGEXP_PATTERN: &[(&str, ConstValue)] =
    &[(INSTALL_CONDITION_PATTERN_TYPE, ConstValue::Text("regexp"))];
const VERSION_DIVERGES: &[(&str, ConstValue)] =
    &[(INSTALL_CONDITION, ConstValue::Text("version-diverges"))];

static OPTIONS: &[OptionDecl] = &[
    OptionDecl::new(FILENAME, OptionKind::String, "Object file name").min(1),
    OptionDecl::new(TARGET_TYPE, OptionKind::String, "Kind of installation target")
        .choices(&["device", "mtdname", "ubivolume"]),
    OptionDecl::new(TARGET, OptionKind::String, "Device, MTD name or UBI volume to install into")
        .min(1)
        .asymmetric(),
    OptionDecl::new(TARGET_PATH, OptionKind::AbsolutePath, "Path inside the target filesystem")
        .asymmetric(),
    OptionDecl::new("filesystem", OptionKind::String, "Filesystem type of the target")
        .choices(&["btrfs", "ext2", "ext3", "ext4", "f2fs", "jffs2", "ubifs", "vfat", "xfs"]),
    OptionDecl::new("format?", OptionKind::Boolean, "Format the target before installing")
        .default(ConstValue::Bool(false)),
    OptionDecl::new("format-options", OptionKind::String, "Options passed to mkfs")
        .requires(&[("format?", ConstValue::Bool(true))]),
    OptionDecl::new("mount-options", OptionKind::String, "Options passed to mount"),
    OptionDecl::new("chunk-size", OptionKind::Integer, "Block size used when writing")
        .default(ConstValue::Integer(131072))
        .min(1),
    OptionDecl::new("skip", OptionKind::Integer, "Blocks to skip from the start of the object")
        .default(ConstValue::Integer(0))
        .min(0),
    OptionDecl::new("seek", OptionKind::Integer, "Blocks to skip from the start of the target")
        .default(ConstValue::Integer(0))
        .min(0),
    OptionDecl::new("count", OptionKind::Integer, "Blocks to copy (-1 copies everything)")
        .default(ConstValue::Integer(-1))
        .min(-1),
    OptionDecl::new("truncate", OptionKind::Boolean, "Truncate the target before writing")
        .default(ConstValue::Bool(false)),
    OptionDecl::new("1k_padding", OptionKind::Boolean, "Pad the boot image with 1KiB")
        .default(ConstValue::Bool(false)),
    OptionDecl::new("search_exponent", OptionKind::Integer, "kobs-ng search exponent")
        .default(ConstValue::Integer(2))
        .min(1),
    OptionDecl::new("chip_0_device_path", OptionKind::AbsolutePath, "Device of the first NAND chip"),
    OptionDecl::new("chip_1_device_path", OptionKind::AbsolutePath, "Device of the second NAND chip"),
    OptionDecl::new(INSTALL_CONDITION, OptionKind::String, "When to install the object")
        .choices(&["always", "content-diverges", "version-diverges"])
        .default(ConstValue::Text("always")),
    OptionDecl::new(
        INSTALL_CONDITION_PATTERN_TYPE,
        OptionKind::String,
        "How to find the version inside the object",
    )
    .choices(&["linux-kernel", "u-boot", "regexp"])
    .requires(VERSION_DIVERGES),
    OptionDecl::new(
        INSTALL_CONDITION_PATTERN,
        OptionKind::String,
        "Regular expression whose first group is the version",
    )
    .min(1)
    .requires(REGEXP_PATTERN),
    OptionDecl::new(
        INSTALL_CONDITION_SEEK,
        OptionKind::Integer,
        "Byte offset where the version scan starts",
    )
    .default(ConstValue::Integer(0))
    .min(0)
    .requires(REGEXP_PATTERN),
    OptionDecl::new(
        INSTALL_CONDITION_BUFFER_SIZE,
        OptionKind::Integer,
        "Bytes scanned for the version (-1 scans to the end)",
    )
    .default(ConstValue::Integer(-1))
    .min(-1)
    .requires(REGEXP_PATTERN),
    OptionDecl::new(
        INSTALL_CONDITION_VERSION,
        OptionKind::String,
        "Version reported by the server",
    )
    .volatile()
    .requires(VERSION_DIVERGES),
    OptionDecl::new(SIZE, OptionKind::Integer, "Object size in bytes")
        .min(0)
        .volatile(),
    OptionDecl::new(SHA256SUM, OptionKind::String, "SHA-256 of the object")
        .min(64)
        .max(64)
        .volatile(),
    OptionDecl::new(COMPRESSED, OptionKind::Boolean, "Whether the object is compressed").volatile(),
    OptionDecl::new(
        REQUIRED_UNCOMPRESSED_SIZE,
        OptionKind::Integer,
        "Size of the object once uncompressed",
    )
    .min(0)
    .volatile()
    .requires(&[(COMPRESSED, ConstValue::Bool(true))]),
];

/// Look an option up by wire name
pub fn get(name: &str) -> Option<&'static OptionDecl> {
    OPTIONS.iter().find(|decl| decl.metadata == name)
}

/// Every declared option
pub fn all() -> &'static [OptionDecl] {
    OPTIONS
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_wire_names_unique() {
        let mut seen = HashSet::new();
        for decl in all() {
            assert!(seen.insert(decl.metadata), "duplicate option {}", decl.metadata);
        }
    }

    #[test]
    fn test_requirements_reference_declared_options() {
        for decl in all() {
            for (name, _) in decl.requirements {
                assert!(get(name).is_some(), "{} requires unknown {}", decl.metadata, name);
            }
        }
    }

    #[test]
    fn test_asymmetric_options() {
        let asymmetric: Vec<_> = all()
            .iter()
            .filter(|decl| !decl.symmetric)
            .map(|decl| decl.metadata)
            .collect();
        assert_eq!(asymmetric, vec![TARGET, TARGET_PATH]);
    }

    #[test]
    fn test_volatile_options() {
        for name in [SIZE, SHA256SUM, COMPRESSED, REQUIRED_UNCOMPRESSED_SIZE, INSTALL_CONDITION_VERSION] {
            assert!(get(name).unwrap().volatile, "{} should be volatile", name);
        }
        assert!(!get(FILENAME).unwrap().volatile);
    }
}
