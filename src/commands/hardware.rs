// src/commands/hardware.rs

//! Supported hardware CLI commands

use anyhow::Result;
use uhu::{LocalState, Settings};

pub fn cmd_hardware_add(settings: &Settings, name: &str, revisions: &[String]) -> Result<()> {
    let state = LocalState::new(&settings.local_config);
    let mut package = state.load()?;
    package.hardware.add(name, revisions.iter().cloned());
    state.save(&package)?;

    if revisions.is_empty() {
        println!("Added hardware {}", name);
    } else {
        println!("Added hardware {} ({})", name, revisions.join(", "));
    }
    Ok(())
}

pub fn cmd_hardware_remove(settings: &Settings, name: &str) -> Result<()> {
    let state = LocalState::new(&settings.local_config);
    let mut package = state.load()?;
    package.hardware.remove(name)?;
    state.save(&package)?;
    println!("Removed hardware {}", name);
    Ok(())
}

pub fn cmd_hardware_add_revision(settings: &Settings, name: &str, revision: &str) -> Result<()> {
    let state = LocalState::new(&settings.local_config);
    let mut package = state.load()?;
    package.hardware.add_revision(name, revision)?;
    state.save(&package)?;
    println!("Added revision {} to {}", revision, name);
    Ok(())
}

pub fn cmd_hardware_remove_revision(settings: &Settings, name: &str, revision: &str) -> Result<()> {
    let state = LocalState::new(&settings.local_config);
    let mut package = state.load()?;
    package.hardware.remove_revision(name, revision)?;
    state.save(&package)?;
    println!("Removed revision {} from {}", revision, name);
    Ok(())
}
