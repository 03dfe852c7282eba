// src/package/schema.rs

//! Structural check of package metadata before it leaves the machine
//!
//! Every problem found is collected, so the user sees the full list in one
//! go instead of fixing errors one at a time.

use crate::error::{Error, Result};
use crate::object::Mode;
use crate::options::registry::{self, FILENAME, INSTALL_IF_DIFFERENT, SHA256SUM, SIZE};
use serde_json::{Map, Value};
use std::str::FromStr;

/// Validate wire metadata, returning every violation found
pub fn validate(metadata: &Value) -> Result<()> {
    let mut errors = Vec::new();
    let Some(document) = metadata.as_object() else {
        return Err(Error::InvalidMetadata(vec![
            "metadata must be a JSON object".to_string(),
        ]));
    };

    match document.get("product") {
        Some(Value::String(product)) if is_hex(product, 64) => {}
        _ => errors.push("product must be a 64 character hexadecimal string".to_string()),
    }

    match document.get("version") {
        Some(Value::String(version)) if !version.is_empty() => {}
        _ => errors.push("version must be a non-empty string".to_string()),
    }

    check_hardware(document.get("supported-hardware"), &mut errors);
    check_objects(document.get("objects"), &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidMetadata(errors))
    }
}

fn check_hardware(hardware: Option<&Value>, errors: &mut Vec<String>) {
    match hardware {
        Some(Value::String(any)) if any == "any" => {}
        Some(Value::Array(entries)) if !entries.is_empty() => {
            for (index, entry) in entries.iter().enumerate() {
                let Some(entry) = entry.as_object() else {
                    errors.push(format!("supported-hardware[{}] must be an object", index));
                    continue;
                };
                if !entry.get("hardware").is_some_and(Value::is_string) {
                    errors.push(format!("supported-hardware[{}].hardware must be a string", index));
                }
                if entry.get("hardware-rev").is_some_and(|rev| !rev.is_string()) {
                    errors.push(format!(
                        "supported-hardware[{}].hardware-rev must be a string",
                        index
                    ));
                }
                for key in entry.keys() {
                    if key != "hardware" && key != "hardware-rev" {
                        errors.push(format!("supported-hardware[{}] has unknown key {}", index, key));
                    }
                }
            }
        }
        _ => errors.push("supported-hardware must be \"any\" or a non-empty list".to_string()),
    }
}

fn check_objects(objects: Option<&Value>, errors: &mut Vec<String>) {
    let Some(sets) = objects.and_then(Value::as_array) else {
        errors.push("objects must be a list of installation sets".to_string());
        return;
    };
    if sets.is_empty() || sets.len() > 2 {
        errors.push(format!(
            "objects must hold 1 or 2 installation sets, found {}",
            sets.len()
        ));
        return;
    }

    let mut lengths = Vec::with_capacity(sets.len());
    for (set_index, set) in sets.iter().enumerate() {
        let Some(set) = set.as_array() else {
            errors.push(format!("objects[{}] must be a list", set_index));
            continue;
        };
        if set.is_empty() {
            errors.push(format!("objects[{}] must hold at least one object", set_index));
        }
        lengths.push(set.len());
        for (index, object) in set.iter().enumerate() {
            let location = format!("objects[{}][{}]", set_index, index);
            match object.as_object() {
                Some(object) => check_object(&location, object, errors),
                None => errors.push(format!("{} must be an object", location)),
            }
        }
    }
    if lengths.windows(2).any(|pair| pair[0] != pair[1]) {
        errors.push("installation sets must hold the same number of objects".to_string());
    }
}

fn check_object(location: &str, object: &Map<String, Value>, errors: &mut Vec<String>) {
    let mode = match object.get("mode").and_then(Value::as_str) {
        Some(name) => match Mode::from_str(name) {
            Ok(mode) => Some(mode),
            Err(_) => {
                errors.push(format!("{}.mode {} is not a known mode", location, name));
                None
            }
        },
        None => {
            errors.push(format!("{}.mode is missing", location));
            None
        }
    };

    if !object.get(FILENAME).and_then(Value::as_str).is_some_and(|f| !f.is_empty()) {
        errors.push(format!("{}.filename must be a non-empty string", location));
    }
    if !object.get(SIZE).is_some_and(|size| size.as_u64().is_some()) {
        errors.push(format!("{}.size must be a non-negative integer", location));
    }
    if !object
        .get(SHA256SUM)
        .and_then(Value::as_str)
        .is_some_and(|sum| is_hex(sum, 64))
    {
        errors.push(format!("{}.sha256sum must be 64 hexadecimal characters", location));
    }

    if let Some(mode) = mode {
        for required in mode.required() {
            if !object.contains_key(*required) {
                errors.push(format!("{}.{} is required by mode {}", location, required, mode));
            }
        }
        for key in object.keys() {
            if key == "mode" || key == INSTALL_IF_DIFFERENT {
                continue;
            }
            let known = registry::get(key).is_some_and(|decl| !decl.is_install_condition());
            if !known || !mode.recognizes(key) {
                errors.push(format!("{}.{} is not valid for mode {}", location, key, mode));
            }
        }
        if object.contains_key(INSTALL_IF_DIFFERENT) && !mode.allows_install_condition() {
            errors.push(format!(
                "{}.install-if-different is not valid for mode {}",
                location, mode
            ));
        }
    }

    if let Some(condition) = object.get(INSTALL_IF_DIFFERENT) {
        if !is_install_if_different(condition) {
            errors.push(format!(
                "{}.install-if-different has an unrecognized form",
                location
            ));
        }
    }
}

/// `"sha256sum"`, or `{version, pattern}` with a known pattern name or a
/// `{regexp, seek?, buffer-size?}` object
fn is_install_if_different(condition: &Value) -> bool {
    match condition {
        Value::String(s) => s == "sha256sum",
        Value::Object(map) => {
            let version_ok = map.get("version").is_some_and(|v| v.is_string() || v.is_number());
            let pattern_ok = match map.get("pattern") {
                Some(Value::String(name)) => name == "linux-kernel" || name == "u-boot",
                Some(Value::Object(pattern)) => {
                    pattern.get("regexp").is_some_and(Value::is_string)
                        && pattern.get("seek").is_none_or(|seek| seek.as_u64().is_some())
                        && pattern
                            .get("buffer-size")
                            .is_none_or(|size| size.as_i64().is_some_and(|size| size >= -1))
                }
                _ => false,
            };
            version_ok && pattern_ok
        }
        _ => false,
    }
}

fn is_hex(text: &str, len: usize) -> bool {
    text.len() == len && text.chars().all(|c| c.is_ascii_hexdigit())
}
