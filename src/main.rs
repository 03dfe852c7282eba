// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, ConfigCommands, HardwareCommands, PackageCommands};
use std::process;
use tracing_subscriber::EnvFilter;
use uhu::Settings;

fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if let Err(e) = run(&cli.command) {
        eprintln!("Error: {:#}", e);
        process::exit(commands::exit_code(&cli.command, &e));
    }
}

fn run(command: &Commands) -> Result<()> {
    let settings = Settings::from_env()?;

    match command {
        Commands::Package(command) => match command {
            PackageCommands::New { product, sets } => {
                commands::cmd_package_new(&settings, product, *sets)
            }
            PackageCommands::Show => commands::cmd_package_show(&settings),
            PackageCommands::Version { value } => commands::cmd_package_version(&settings, value),
            PackageCommands::Add { file, mode, options } => {
                commands::cmd_package_add(&settings, file, mode, options)
            }
            PackageCommands::Edit {
                index,
                option,
                value,
                set,
            } => commands::cmd_package_edit(&settings, *index, option, value, *set),
            PackageCommands::Remove { index } => commands::cmd_package_remove(&settings, *index),
            PackageCommands::Metadata => commands::cmd_package_metadata(&settings),
            PackageCommands::Export { path } => commands::cmd_package_export(&settings, path),
            PackageCommands::Archive { output, force } => {
                commands::cmd_package_archive(&settings, output.as_deref(), *force)
            }
            PackageCommands::Push => commands::cmd_package_push(&settings),
            PackageCommands::Pull { uid, force } => {
                commands::cmd_package_pull(&settings, uid, *force)
            }
            PackageCommands::Status { uid } => commands::cmd_package_status(&settings, uid),
        },

        Commands::Hardware(command) => match command {
            HardwareCommands::Add { name, revisions } => {
                commands::cmd_hardware_add(&settings, name, revisions)
            }
            HardwareCommands::Remove { name } => commands::cmd_hardware_remove(&settings, name),
            HardwareCommands::AddRevision { name, revision } => {
                commands::cmd_hardware_add_revision(&settings, name, revision)
            }
            HardwareCommands::RemoveRevision { name, revision } => {
                commands::cmd_hardware_remove_revision(&settings, name, revision)
            }
        },

        Commands::Config(command) => match command {
            ConfigCommands::Init {
                access_id,
                access_secret,
            } => commands::cmd_config_init(&settings, access_id, access_secret),
            ConfigCommands::Set { key, value } => commands::cmd_config_set(&settings, key, value),
            ConfigCommands::Get { key } => commands::cmd_config_get(&settings, key),
            ConfigCommands::SetPrivateKey { path } => {
                commands::cmd_config_set_private_key(&settings, path)
            }
            ConfigCommands::Cleanup => commands::cmd_config_cleanup(&settings),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_add_with_per_set_targets() {
        let cli = Cli::try_parse_from([
            "uhu", "package", "add", "rootfs.img", "--mode", "raw", "-o", "target-type=device",
            "-o", "target=/dev/sda1", "-o", "target=/dev/sda2",
        ])
        .unwrap();
        match cli.command {
            Commands::Package(PackageCommands::Add { file, mode, options }) => {
                assert_eq!(file, "rootfs.img");
                assert_eq!(mode, "raw");
                assert_eq!(options.len(), 3);
                assert_eq!(options[2], ("target".to_string(), "/dev/sda2".to_string()));
            }
            _ => panic!("expected package add"),
        }
    }

    #[test]
    fn test_parse_verbose_anywhere() {
        let cli = Cli::try_parse_from(["uhu", "package", "status", "pkg-1", "--verbose"]).unwrap();
        assert!(cli.verbose);
    }
}
