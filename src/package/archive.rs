// src/package/archive.rs

//! Offline package archives (`.uhupkg`)
//!
//! A zip holding the canonical metadata, its signature and one entry per
//! distinct object content, named after the object's SHA-256. Objects that
//! share content are stored once; restoring by filename goes through the
//! metadata.

use super::{schema, Package};
use crate::error::{Error, Result};
use crate::signing::PackageSigner;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Default archive name for a package
pub fn default_archive_path(product: &str, version: &str) -> PathBuf {
    PathBuf::from(format!("{}-{}.uhupkg", product, version))
}

/// Write the package archive and return its path
pub fn dump_package_archive(
    package: &mut Package,
    signer: &PackageSigner,
    output: Option<&Path>,
    force: bool,
) -> Result<PathBuf> {
    let mut missing = Vec::new();
    if package.product.is_none() {
        missing.push("product is not set".to_string());
    }
    if package.version.is_none() {
        missing.push("version is not set".to_string());
    }
    if package.objects.is_empty() {
        missing.push("package has no objects".to_string());
    }
    if !missing.is_empty() {
        return Err(Error::InvalidMetadata(missing));
    }

    let metadata = package.to_metadata(None)?;
    schema::validate(&metadata)?;

    let path = match output {
        Some(path) => path.to_path_buf(),
        None => default_archive_path(
            package.product.as_deref().unwrap_or_default(),
            package.version.as_deref().unwrap_or_default(),
        ),
    };
    if path.exists() && !force {
        return Err(Error::FileExists(path));
    }

    let metadata_bytes = serde_json::to_vec(&metadata)?;
    let signature = signer.sign(&metadata_bytes)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let temp = NamedTempFile::new_in(&dir)?;
    let mut zip = ZipWriter::new(temp.reopen()?);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("metadata", options).map_err(zip_error)?;
    io::Write::write_all(&mut zip, &metadata_bytes)?;
    zip.start_file("signature", options).map_err(zip_error)?;
    io::Write::write_all(&mut zip, signature.as_bytes())?;

    let mut stored = BTreeSet::new();
    for object in package.objects.all() {
        let Some(sha256sum) = object.sha256sum() else {
            continue;
        };
        if !stored.insert(sha256sum.to_string()) {
            continue;
        }
        debug!("Archiving {} as {}", object.filename(), sha256sum);
        zip.start_file(sha256sum, options).map_err(zip_error)?;
        io::copy(&mut object.chunks()?, &mut zip)?;
    }
    zip.finish().map_err(zip_error)?;

    temp.persist(&path).map_err(|e| Error::Io(e.error))?;
    info!("Wrote package archive {} ({} objects)", path.display(), stored.len());
    Ok(path)
}

fn zip_error(e: zip::result::ZipError) -> Error {
    Error::Io(io::Error::other(e))
}
