// src/commands/config.rs

//! Global configuration CLI commands

use anyhow::Result;
use std::path::Path;
use uhu::{Error, GlobalConfig, Settings};

pub fn cmd_config_init(settings: &Settings, access_id: &str, access_secret: &str) -> Result<()> {
    let mut config = GlobalConfig::load(&settings.global_config)?;
    config.set_credentials(access_id, access_secret);
    config.save()?;
    println!("Credentials saved to {}", config.path().display());
    Ok(())
}

pub fn cmd_config_set(settings: &Settings, key: &str, value: &str) -> Result<()> {
    let (section, name) = split_key(key)?;
    let mut config = GlobalConfig::load(&settings.global_config)?;
    config.set(section, name, value);
    config.save()?;
    Ok(())
}

pub fn cmd_config_get(settings: &Settings, key: &str) -> Result<()> {
    let (section, name) = split_key(key)?;
    let config = GlobalConfig::load(&settings.global_config)?;
    let value = config
        .get(section, name)
        .ok_or_else(|| Error::NotFound(format!("{} is not set", key)))?;
    println!("{}", value);
    Ok(())
}

pub fn cmd_config_set_private_key(settings: &Settings, path: &Path) -> Result<()> {
    let mut config = GlobalConfig::load(&settings.global_config)?;
    config.set_private_key_path(path)?;
    config.save()?;
    println!("Private key set to {}", path.display());
    Ok(())
}

pub fn cmd_config_cleanup(settings: &Settings) -> Result<()> {
    GlobalConfig::cleanup(&settings.global_config)?;
    println!("Removed {}", settings.global_config.display());
    Ok(())
}

/// `section.key` into its parts
fn split_key(key: &str) -> Result<(&str, &str)> {
    match key.split_once('.') {
        Some((section, name)) if !section.is_empty() && !name.is_empty() => Ok((section, name)),
        _ => Err(anyhow::anyhow!("Expected section.key, got '{}'", key)),
    }
}
