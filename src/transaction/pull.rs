// src/transaction/pull.rs

//! Package download
//!
//! Every object is checked against the local tree before anything is
//! written: a local file whose content differs from the package aborts the
//! pull. Downloads land in a temporary file next to their destination and
//! are renamed into place once their SHA-256 checks out.

use super::{server_error, TransactionEngine};
use crate::error::{Error, Result};
use crate::object::{read_full, ObjectChunks};
use crate::package::Package;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Object missing from the local tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDownload {
    pub filename: String,
    pub path: PathBuf,
    pub sha256sum: String,
    pub size: u64,
}

impl TransactionEngine {
    /// Fetch a package and download its missing objects into `destination`
    pub fn pull(&self, uid: &str, destination: &Path) -> Result<Package> {
        let metadata = self.fetch_package(uid)?;
        let mut package = Package::from_metadata(&metadata)?;
        package.uid = Some(uid.to_string());
        let product = package
            .product
            .clone()
            .ok_or_else(|| Error::Download(format!("package {} has no product", uid)))?;

        let pending = self.check_local_objects(&package, destination)?;
        let total = pending
            .iter()
            .map(|download| download.size.div_ceil(self.chunk_size as u64))
            .sum();
        info!("Pulling {}: {} objects to download", uid, pending.len());

        self.progress.start("Downloading objects", total);
        for download in &pending {
            self.download_object(&product, uid, download)?;
        }
        self.progress.finish("Package pulled");
        Ok(package)
    }

    /// Objects that need downloading, failing on any local file that
    /// diverges from the package
    pub fn check_local_objects(&self, package: &Package, destination: &Path) -> Result<Vec<PendingDownload>> {
        let mut objects = BTreeMap::new();
        for object in package.objects.all() {
            objects.entry(object.filename().to_string()).or_insert(object);
        }

        let mut pending = Vec::new();
        for (filename, object) in objects {
            let sha256sum = object
                .sha256sum()
                .ok_or_else(|| Error::Download(format!("{} has no sha256sum in the package", filename)))?
                .to_string();
            let path = object_path(destination, &filename)?;

            if path.exists() {
                let local = self.file_sha256(&path)?;
                if local != sha256sum {
                    return Err(Error::FileWouldBeOverwritten(path));
                }
                debug!("{} is up to date", filename);
                continue;
            }
            pending.push(PendingDownload {
                filename,
                path,
                sha256sum,
                size: object.size().unwrap_or_default(),
            });
        }
        Ok(pending)
    }

    fn download_object(&self, product: &str, uid: &str, download: &PendingDownload) -> Result<()> {
        let response = self.client.get(&format!(
            "/products/{}/packages/{}/objects/{}",
            product, uid, download.sha256sum
        ))?;
        if response.status != 200 {
            return Err(Error::Download(format!(
                "{}: {}",
                download.filename,
                server_error(response.status, response)
            )));
        }

        let parent = match download.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;
        let mut temp = NamedTempFile::new_in(&parent)?;

        let mut body = response.body;
        let mut buffer = vec![0u8; self.chunk_size];
        let mut hasher = Sha256::new();
        loop {
            let len = read_full(&mut body, &mut buffer)
                .map_err(|e| Error::Download(format!("{}: {}", download.filename, e)))?;
            if len == 0 {
                break;
            }
            hasher.update(&buffer[..len]);
            temp.write_all(&buffer[..len])?;
            self.progress.object_read();
        }
        temp.flush()?;

        let received = hex::encode(hasher.finalize());
        if received != download.sha256sum {
            return Err(Error::Download(format!(
                "{}: checksum mismatch (expected {}, got {})",
                download.filename, download.sha256sum, received
            )));
        }
        temp.persist(&download.path).map_err(|e| Error::Io(e.error))?;
        debug!("Downloaded {}", download.path.display());
        Ok(())
    }

    fn file_sha256(&self, path: &Path) -> Result<String> {
        let mut chunks = ObjectChunks::open(path, self.chunk_size)?;
        let mut hasher = Sha256::new();
        while let Some(chunk) = chunks.next_chunk()? {
            hasher.update(chunk);
        }
        Ok(hex::encode(hasher.finalize()))
    }
}

/// Join an object filename from the server onto the destination, rejecting
/// names that would escape it
fn object_path(destination: &Path, filename: &str) -> Result<PathBuf> {
    let relative = Path::new(filename);
    let safe = relative
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    if filename.is_empty() || !safe {
        return Err(Error::Download(format!("refusing unsafe object filename {}", filename)));
    }
    Ok(destination.join(relative))
}
