// src/commands/package.rs

//! Package CLI commands
//!
//! Every command works on the package kept in the local state file.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use tracing::info;
use uhu::options::{registry, OptionKind};
use uhu::package::{dump_package_archive, schema};
use uhu::{CliProgress, Error, LocalState, Mode, Package, Settings};

use super::{package_signer, transaction_engine};

/// Start a new package
pub fn cmd_package_new(settings: &Settings, product: &str, sets: usize) -> Result<()> {
    let state = LocalState::new(&settings.local_config);
    if state.exists() {
        return Err(Error::FileExists(state.path().to_path_buf()).into());
    }

    let mut package = Package::with_sets(sets)?;
    package.product = Some(product.to_string());
    state.save(&package)?;

    info!("Started package for product {}", product);
    println!("New package for product {} ({} installation sets)", product, sets);
    Ok(())
}

pub fn cmd_package_show(settings: &Settings) -> Result<()> {
    let package = LocalState::new(&settings.local_config).load()?;
    print!("{}", package.summary());
    Ok(())
}

pub fn cmd_package_version(settings: &Settings, version: &str) -> Result<()> {
    let state = LocalState::new(&settings.local_config);
    let mut package = state.load()?;
    package.version = Some(version.to_string());
    state.save(&package)?;
    println!("Package version set to {}", version);
    Ok(())
}

/// Add an object; options repeated once per installation set are sent as
/// per-set values
pub fn cmd_package_add(
    settings: &Settings,
    file: &str,
    mode: &str,
    options: &[(String, String)],
) -> Result<()> {
    let mode = Mode::from_str(mode)
        .map_err(|_| Error::InvalidOption(format!("unknown mode {}", mode)))?;
    let state = LocalState::new(&settings.local_config);
    let mut package = state.load()?;

    let mut grouped: BTreeMap<&str, Vec<Value>> = BTreeMap::new();
    for (key, value) in options {
        grouped
            .entry(key.as_str())
            .or_default()
            .push(option_value(key, value));
    }

    let mut map = Map::new();
    map.insert("filename".to_string(), Value::String(file.to_string()));
    for (key, mut values) in grouped {
        let value = if values.len() == 1 {
            values.remove(0)
        } else {
            Value::Array(values)
        };
        map.insert(key.to_string(), value);
    }

    let index = package.add_object(mode, &map)?;
    state.save(&package)?;

    let object = package.objects.get(index, 0)?;
    println!("Added object {}: {}", index, object.describe());
    Ok(())
}

pub fn cmd_package_edit(
    settings: &Settings,
    index: usize,
    option: &str,
    value: &str,
    set: Option<usize>,
) -> Result<()> {
    let state = LocalState::new(&settings.local_config);
    let mut package = state.load()?;

    let index = package
        .objects
        .update(index, option, &option_value(option, value), set)?;
    state.save(&package)?;

    let object = package.objects.get(index, set.unwrap_or(0))?;
    println!("Updated object {}: {}", index, object.describe());
    Ok(())
}

pub fn cmd_package_remove(settings: &Settings, index: usize) -> Result<()> {
    let state = LocalState::new(&settings.local_config);
    let mut package = state.load()?;
    let entry = package.objects.remove(index)?;
    state.save(&package)?;
    println!("Removed object {} ({})", index, entry.filename());
    Ok(())
}

/// Print the metadata after checking it against the wire schema
pub fn cmd_package_metadata(settings: &Settings) -> Result<()> {
    let mut package = LocalState::new(&settings.local_config).load()?;
    package.objects.set_chunk_size(settings.chunk_size);

    let progress = CliProgress::new();
    let metadata = package.to_metadata(Some(&progress))?;
    schema::validate(&metadata)?;
    println!("{}", serde_json::to_string_pretty(&metadata)?);
    Ok(())
}

pub fn cmd_package_export(settings: &Settings, path: &Path) -> Result<()> {
    let package = LocalState::new(&settings.local_config).load()?;
    package
        .export(path)
        .with_context(|| format!("Failed to export package to {}", path.display()))?;
    println!("Exported package template to {}", path.display());
    Ok(())
}

pub fn cmd_package_archive(settings: &Settings, output: Option<&Path>, force: bool) -> Result<()> {
    let mut package = LocalState::new(&settings.local_config).load()?;
    package.objects.set_chunk_size(settings.chunk_size);
    let signer = package_signer(settings)?;

    let path = dump_package_archive(&mut package, &signer, output, force)?;
    println!("Package archive written to {}", path.display());
    Ok(())
}

pub fn cmd_package_push(settings: &Settings) -> Result<()> {
    let mut package = LocalState::new(&settings.local_config).load()?;
    let signer = package_signer(settings)?;
    let engine = transaction_engine(settings)?;

    info!("Pushing package to {}", settings.server_url);
    let uid = engine.push(&mut package, &signer)?;
    println!("Package pushed, UID: {}", uid);
    Ok(())
}

/// Download a package into the current directory and make it the local
/// package
pub fn cmd_package_pull(settings: &Settings, uid: &str, force: bool) -> Result<()> {
    let state = LocalState::new(&settings.local_config);
    if state.exists() && !force {
        return Err(Error::FileExists(state.path().to_path_buf()).into());
    }

    let engine = transaction_engine(settings)?;
    let package = engine.pull(uid, Path::new("."))?;
    state.save(&package)?;
    println!("Package {} pulled", uid);
    Ok(())
}

pub fn cmd_package_status(settings: &Settings, uid: &str) -> Result<()> {
    let engine = transaction_engine(settings)?;
    let status = engine.status(uid)?;
    println!("{}", status);
    Ok(())
}

/// Command-line text as an option value; `true`/`false` become booleans
/// for boolean options, everything else is coerced by the validator
fn option_value(option: &str, raw: &str) -> Value {
    let boolean = registry::get(option).is_some_and(|decl| decl.kind == OptionKind::Boolean);
    match raw {
        "true" if boolean => Value::Bool(true),
        "false" if boolean => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings(dir: &TempDir) -> Settings {
        Settings::from_lookup(|name| match name {
            "UHU_GLOBAL_CONFIG" => Some(dir.path().join("global").to_string_lossy().into_owned()),
            "UHU_LOCAL_CONFIG" => Some(dir.path().join(".uhu").to_string_lossy().into_owned()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn test_option_value() {
        assert_eq!(option_value("truncate", "true"), Value::Bool(true));
        assert_eq!(option_value("truncate", "yes"), Value::String("yes".into()));
        assert_eq!(option_value("target", "true"), Value::String("true".into()));
        assert_eq!(option_value("count", "4"), Value::String("4".into()));
    }

    #[test]
    fn test_new_add_edit_remove() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        let product = "0".repeat(64);

        cmd_package_new(&settings, &product, 2).unwrap();
        let error = cmd_package_new(&settings, &product, 2).unwrap_err();
        assert!(matches!(error.downcast_ref::<Error>(), Some(Error::FileExists(_))));

        cmd_package_version(&settings, "2.0").unwrap();
        let options = vec![
            ("target-type".to_string(), "device".to_string()),
            ("target".to_string(), "/dev/sda1".to_string()),
            ("target".to_string(), "/dev/sda2".to_string()),
        ];
        cmd_package_add(&settings, "rootfs.img", "raw", &options).unwrap();

        let state = LocalState::new(&settings.local_config);
        let package = state.load().unwrap();
        assert_eq!(package.version.as_deref(), Some("2.0"));
        assert_eq!(package.objects.len(), 1);
        assert_eq!(
            package.objects.get(0, 1).unwrap().get("target").and_then(|v| v.as_text()),
            Some("/dev/sda2")
        );

        cmd_package_edit(&settings, 0, "count", "8", None).unwrap();
        let package = state.load().unwrap();
        assert_eq!(
            package.objects.get(0, 1).unwrap().get("count").and_then(|v| v.as_integer()),
            Some(8)
        );

        let error = cmd_package_edit(&settings, 0, "count", "many", None).unwrap_err();
        assert!(matches!(error.downcast_ref::<Error>(), Some(Error::InvalidOption(_))));

        cmd_package_remove(&settings, 0).unwrap();
        assert!(state.load().unwrap().objects.is_empty());
    }

    #[test]
    fn test_add_unknown_mode() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        cmd_package_new(&settings, &"0".repeat(64), 1).unwrap();
        let error = cmd_package_add(&settings, "file", "nfs", &[]).unwrap_err();
        assert!(matches!(error.downcast_ref::<Error>(), Some(Error::InvalidOption(_))));
    }

    #[test]
    fn test_pull_refuses_existing_state() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        cmd_package_new(&settings, &"0".repeat(64), 2).unwrap();
        let error = cmd_package_pull(&settings, "pkg", false).unwrap_err();
        assert!(matches!(error.downcast_ref::<Error>(), Some(Error::FileExists(_))));
    }
}
