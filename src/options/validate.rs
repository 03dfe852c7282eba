// src/options/validate.rs

//! Option map validation
//!
//! Raw option maps (from templates, server metadata or the command line)
//! go through five phases, in order:
//!
//! 1. expand the legacy `install-if-different` key into the local
//!    install-condition options
//! 2. normalize: drop nulls, reject unknown keys, coerce every value
//! 3. inject defaults whose requirements can be satisfied
//! 4. check mode-required options
//! 5. check every option's requirements
//!
//! The caller's map is never mutated; a new [`OptionValues`] is returned.

use super::registry::{self, OptionDecl, OptionKind};
use super::value::{OptionValue, OptionValues};
use crate::error::{Error, Result};
use crate::install_condition;
use crate::object::Mode;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Validate a raw option map against a mode
pub fn validate(mode: Mode, raw: &Map<String, Value>) -> Result<OptionValues> {
    let mut map = raw.clone();
    install_condition::expand_install_if_different(&mut map)?;

    let mut values = normalize(mode, &map)?;
    inject_defaults(mode, &mut values);
    check_required(mode, &values)?;
    check_requirements(mode, &values)?;
    Ok(values)
}

/// Re-run phases 3-5 on an already typed map (used after single-key updates)
pub fn revalidate(mode: Mode, values: &OptionValues) -> Result<OptionValues> {
    for name in values.keys() {
        if !mode.recognizes(name) {
            return Err(Error::InvalidOption(format!(
                "{} is not a valid option for mode {}",
                name, mode
            )));
        }
    }
    let mut values = values.clone();
    inject_defaults(mode, &mut values);
    check_required(mode, &values)?;
    check_requirements(mode, &values)?;
    Ok(values)
}

fn normalize(mode: Mode, map: &Map<String, Value>) -> Result<OptionValues> {
    let mut values = OptionValues::new();
    for (name, raw) in map {
        if raw.is_null() {
            continue;
        }
        let decl = match registry::get(name) {
            Some(decl) if mode.recognizes(name) => decl,
            _ => {
                return Err(Error::InvalidOption(format!(
                    "{} is not a valid option for mode {}",
                    name, mode
                )));
            }
        };
        let value = validate_value(decl, raw)?;
        if name == registry::TARGET_TYPE {
            check_target_type(mode, &value)?;
        }
        values.insert(name.clone(), value);
    }
    Ok(values)
}

fn check_target_type(mode: Mode, value: &OptionValue) -> Result<()> {
    let target_type = value.as_text().unwrap_or_default();
    if mode.target_types().contains(&target_type) {
        return Ok(());
    }
    Err(Error::InvalidOption(format!(
        "target-type {} is not supported by mode {} (expected one of: {})",
        target_type,
        mode,
        mode.target_types().join(", ")
    )))
}

/// Coerce a raw value through an option's declared type and constraints
pub fn validate_value(decl: &OptionDecl, raw: &Value) -> Result<OptionValue> {
    let value = match decl.kind {
        OptionKind::Boolean => OptionValue::Bool(to_bool(decl, raw)?),
        OptionKind::Integer => {
            let number = to_integer(decl, raw)?;
            check_bounds(decl, number, "")?;
            OptionValue::Integer(number)
        }
        OptionKind::String => {
            let text = to_text(decl, raw)?;
            if !decl.choices.is_empty() && !decl.choices.contains(&text.as_str()) {
                return Err(Error::InvalidOption(format!(
                    "{}: {} is not one of: {}",
                    decl.metadata,
                    text,
                    decl.choices.join(", ")
                )));
            }
            check_bounds(decl, text.chars().count() as i64, " characters")?;
            OptionValue::Text(text)
        }
        OptionKind::AbsolutePath => {
            let text = to_text(decl, raw)?;
            if !text.starts_with('/') || text.contains('\0') {
                return Err(Error::InvalidOption(format!(
                    "{}: {} is not an absolute path",
                    decl.metadata, text
                )));
            }
            OptionValue::Text(text)
        }
    };
    Ok(value)
}

fn type_error(decl: &OptionDecl, raw: &Value) -> Error {
    Error::InvalidOption(format!(
        "{}: {} is not a valid {}",
        decl.metadata,
        raw,
        decl.kind.name()
    ))
}

fn to_bool(decl: &OptionDecl, raw: &Value) -> Result<bool> {
    match raw {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => match s.to_lowercase().as_str() {
            "y" | "yes" => Ok(true),
            "n" | "no" => Ok(false),
            _ => Err(type_error(decl, raw)),
        },
        _ => Err(type_error(decl, raw)),
    }
}

fn to_integer(decl: &OptionDecl, raw: &Value) -> Result<i64> {
    match raw {
        Value::Number(n) => n.as_i64().ok_or_else(|| type_error(decl, raw)),
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| type_error(decl, raw)),
        _ => Err(type_error(decl, raw)),
    }
}

fn to_text(decl: &OptionDecl, raw: &Value) -> Result<String> {
    match raw {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(type_error(decl, raw)),
    }
}

fn check_bounds(decl: &OptionDecl, measure: i64, unit: &str) -> Result<()> {
    if let Some(min) = decl.min {
        if measure < min {
            return Err(Error::InvalidOption(format!(
                "{}: {}{} is below the minimum of {}",
                decl.metadata, measure, unit, min
            )));
        }
    }
    if let Some(max) = decl.max {
        if measure > max {
            return Err(Error::InvalidOption(format!(
                "{}: {}{} is above the maximum of {}",
                decl.metadata, measure, unit, max
            )));
        }
    }
    Ok(())
}

/// Insert defaults for absent options whose requirements hold, injecting
/// the defaults of required siblings recursively. An option whose
/// requirements cannot be met stays absent.
fn inject_defaults(mode: Mode, values: &mut OptionValues) {
    for name in mode.options() {
        let mut visiting = HashSet::new();
        try_inject(mode, *name, values, &mut visiting);
    }
}

fn try_inject(
    mode: Mode,
    name: &'static str,
    values: &mut OptionValues,
    visiting: &mut HashSet<&'static str>,
) -> bool {
    if values.contains_key(name) {
        return true;
    }
    let Some(decl) = registry::get(name) else {
        return false;
    };
    let Some(default) = decl.default else {
        return false;
    };
    if !mode.recognizes(name) || !visiting.insert(name) {
        return false;
    }

    for (required, expected) in decl.requirements {
        let satisfied = match values.get(*required) {
            Some(current) => expected.matches(current),
            None => match registry::get(required) {
                Some(other) if other.default == Some(*expected) => {
                    try_inject(mode, other.metadata, values, visiting)
                }
                _ => false,
            },
        };
        if !satisfied {
            visiting.remove(name);
            return false;
        }
    }

    values.insert(name.to_string(), default.to_value());
    visiting.remove(name);
    true
}

fn check_required(mode: Mode, values: &OptionValues) -> Result<()> {
    for name in mode.required() {
        if !values.contains_key(*name) {
            return Err(Error::MissingOption(format!(
                "{} is required by mode {}",
                name, mode
            )));
        }
    }

    let condition = values
        .get(registry::INSTALL_CONDITION)
        .and_then(OptionValue::as_text);
    if condition == Some("version-diverges")
        && !values.contains_key(registry::INSTALL_CONDITION_PATTERN_TYPE)
    {
        return Err(Error::MissingOption(format!(
            "{} is required when {} is version-diverges",
            registry::INSTALL_CONDITION_PATTERN_TYPE,
            registry::INSTALL_CONDITION
        )));
    }
    let pattern_type = values
        .get(registry::INSTALL_CONDITION_PATTERN_TYPE)
        .and_then(OptionValue::as_text);
    if pattern_type == Some("regexp") && !values.contains_key(registry::INSTALL_CONDITION_PATTERN) {
        return Err(Error::MissingOption(format!(
            "{} is required when {} is regexp",
            registry::INSTALL_CONDITION_PATTERN,
            registry::INSTALL_CONDITION_PATTERN_TYPE
        )));
    }
    Ok(())
}

fn check_requirements(mode: Mode, values: &OptionValues) -> Result<()> {
    for name in values.keys() {
        let Some(decl) = registry::get(name) else {
            continue;
        };
        for (required, expected) in decl.requirements {
            let satisfied = values
                .get(*required)
                .is_some_and(|current| expected.matches(current));
            if !satisfied {
                return Err(Error::UnsatisfiedRequirement(format!(
                    "{} requires {} to be {} in mode {}",
                    name, required, expected, mode
                )));
            }
        }
    }
    Ok(())
}
