// src/object/mode.rs

//! Installation modes
//!
//! A mode decides which options an object recognizes, which of them are
//! required, which target types are valid and whether compression or
//! install-condition metadata is emitted. The behaviour lives in a const
//! table keyed by [`Mode`].

use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Installation strategy of an object
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter, AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    Copy,
    Flash,
    Imxkobs,
    Raw,
    Tarball,
    Ubifs,
}

struct ModeSpec {
    options: &'static [&'static str],
    required: &'static [&'static str],
    target_types: &'static [&'static str],
    compression: bool,
    install_condition: bool,
    template: &'static str,
}

const RAW: ModeSpec = ModeSpec {
    options: &[
        "filename",
        "size",
        "sha256sum",
        "target-type",
        "target",
        "chunk-size",
        "skip",
        "seek",
        "count",
        "truncate",
        "compressed",
        "required-uncompressed-size",
        "install-condition",
        "install-condition-pattern-type",
        "install-condition-pattern",
        "install-condition-seek",
        "install-condition-buffer-size",
        "install-condition-version",
    ],
    required: &["filename", "target-type", "target"],
    target_types: &["device"],
    compression: true,
    install_condition: true,
    template: "{filename} [raw] -> {target} (skip {skip}, seek {seek}, count {count})",
};

const COPY: ModeSpec = ModeSpec {
    options: &[
        "filename",
        "size",
        "sha256sum",
        "target-type",
        "target",
        "target-path",
        "filesystem",
        "format?",
        "format-options",
        "mount-options",
        "compressed",
        "required-uncompressed-size",
        "install-condition",
        "install-condition-pattern-type",
        "install-condition-pattern",
        "install-condition-seek",
        "install-condition-buffer-size",
        "install-condition-version",
    ],
    required: &["filename", "target-type", "target", "target-path", "filesystem"],
    target_types: &["device", "mtdname", "ubivolume"],
    compression: true,
    install_condition: true,
    template: "{filename} [copy] -> {target}:{target-path} ({filesystem})",
};

const TARBALL: ModeSpec = ModeSpec {
    options: &[
        "filename",
        "size",
        "sha256sum",
        "target-type",
        "target",
        "target-path",
        "filesystem",
        "format?",
        "format-options",
        "mount-options",
    ],
    required: &["filename", "target-type", "target", "target-path", "filesystem"],
    target_types: &["device", "mtdname", "ubivolume"],
    compression: false,
    install_condition: false,
    template: "{filename} [tarball] -> {target}:{target-path} ({filesystem})",
};

const FLASH: ModeSpec = ModeSpec {
    options: &[
        "filename",
        "size",
        "sha256sum",
        "target-type",
        "target",
        "install-condition",
        "install-condition-pattern-type",
        "install-condition-pattern",
        "install-condition-seek",
        "install-condition-buffer-size",
        "install-condition-version",
    ],
    required: &["filename", "target-type", "target"],
    target_types: &["device", "mtdname"],
    compression: false,
    install_condition: true,
    template: "{filename} [flash] -> {target}",
};

const UBIFS: ModeSpec = ModeSpec {
    options: &[
        "filename",
        "size",
        "sha256sum",
        "target-type",
        "target",
        "compressed",
        "required-uncompressed-size",
    ],
    required: &["filename", "target-type", "target"],
    target_types: &["ubivolume"],
    compression: true,
    install_condition: false,
    template: "{filename} [ubifs] -> volume {target}",
};

const IMXKOBS: ModeSpec = ModeSpec {
    options: &[
        "filename",
        "size",
        "sha256sum",
        "1k_padding",
        "search_exponent",
        "chip_0_device_path",
        "chip_1_device_path",
        "install-condition",
        "install-condition-pattern-type",
        "install-condition-pattern",
        "install-condition-seek",
        "install-condition-buffer-size",
        "install-condition-version",
    ],
    required: &["filename"],
    target_types: &[],
    compression: false,
    install_condition: true,
    template: "{filename} [imxkobs] (search exponent {search_exponent})",
};

impl Mode {
    fn spec(self) -> &'static ModeSpec {
        match self {
            Self::Copy => &COPY,
            Self::Flash => &FLASH,
            Self::Imxkobs => &IMXKOBS,
            Self::Raw => &RAW,
            Self::Tarball => &TARBALL,
            Self::Ubifs => &UBIFS,
        }
    }

    /// Options recognized by the mode, in display order
    pub fn options(self) -> &'static [&'static str] {
        self.spec().options
    }

    pub fn recognizes(self, option: &str) -> bool {
        self.spec().options.contains(&option)
    }

    pub fn required(self) -> &'static [&'static str] {
        self.spec().required
    }

    pub fn is_required(self, option: &str) -> bool {
        self.spec().required.contains(&option)
    }

    /// Allowed values of `target-type`
    pub fn target_types(self) -> &'static [&'static str] {
        self.spec().target_types
    }

    pub fn allows_compression(self) -> bool {
        self.spec().compression
    }

    pub fn allows_install_condition(self) -> bool {
        self.spec().install_condition
    }

    /// Human display layout; `{option}` placeholders are substituted
    pub fn display_template(self) -> &'static str {
        self.spec().template
    }
}
