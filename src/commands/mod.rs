// src/commands/mod.rs
//! Command handlers for the uhu CLI

mod config;
mod hardware;
mod package;

pub use config::{
    cmd_config_cleanup, cmd_config_get, cmd_config_init, cmd_config_set,
    cmd_config_set_private_key,
};
pub use hardware::{
    cmd_hardware_add, cmd_hardware_add_revision, cmd_hardware_remove,
    cmd_hardware_remove_revision,
};
pub use package::{
    cmd_package_add, cmd_package_archive, cmd_package_edit, cmd_package_export,
    cmd_package_metadata, cmd_package_new, cmd_package_pull, cmd_package_push,
    cmd_package_remove, cmd_package_show, cmd_package_status, cmd_package_version,
};

use crate::cli::{Commands, PackageCommands};
use anyhow::Result;
use std::sync::Arc;
use uhu::http::{ApiClient, Credentials, ReqwestTransport};
use uhu::{CliProgress, Error, GlobalConfig, PackageSigner, Settings, TransactionEngine};

/// Process exit code for a failed command
///
/// Codes are per command; anything without a dedicated code exits 1.
pub fn exit_code(command: &Commands, error: &anyhow::Error) -> i32 {
    let Some(error) = error.downcast_ref::<Error>() else {
        return 1;
    };

    match command {
        Commands::Package(PackageCommands::Push) => match error {
            Error::Upload(_) | Error::AuthRequired => 2,
            Error::Http(_) => 3,
            Error::InvalidMetadata(_) => 4,
            _ => 1,
        },
        Commands::Package(PackageCommands::Pull { .. }) => match error {
            Error::FileExists(_) => 1,
            e if e.is_download_error() => 2,
            Error::Http(_) | Error::AuthRequired | Error::NotFound(_) => 2,
            _ => 1,
        },
        Commands::Package(PackageCommands::Add { .. } | PackageCommands::Edit { .. }) => {
            match error {
                Error::InvalidOption(_) => 3,
                e if e.is_option_error() => 2,
                _ => 1,
            }
        }
        Commands::Package(PackageCommands::Status { .. }) => match error {
            Error::NotFound(_) => 2,
            _ => 1,
        },
        _ => 1,
    }
}

/// Transaction engine talking to the configured server with the stored
/// credentials
fn transaction_engine(settings: &Settings) -> Result<TransactionEngine> {
    let config = GlobalConfig::load(&settings.global_config)?;
    let (access_id, access_secret) = config.credentials()?;
    let transport = Arc::new(ReqwestTransport::new()?);
    let client = ApiClient::new(
        transport,
        &settings.server_url,
        Credentials::new(access_id, access_secret),
    )?;

    Ok(TransactionEngine::new(client)
        .with_chunk_size(settings.chunk_size)
        .with_progress(Arc::new(CliProgress::new())))
}

/// Signer for the configured private key
fn package_signer(settings: &Settings) -> Result<PackageSigner> {
    let config = GlobalConfig::load(&settings.global_config)?;
    let path = config.private_key_path(settings.private_key.as_deref())?;
    Ok(PackageSigner::from_pem_file(&path)?)
}
