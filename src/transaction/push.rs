// src/transaction/push.rs

//! Package upload

use super::storage::storage_for;
use super::{server_error, TransactionEngine, UploadResult};
use crate::error::{Error, Result};
use crate::http::RequestBody;
use crate::object::Object;
use crate::package::{schema, Package};
use crate::signing::PackageSigner;
use serde_json::{json, Value};
use std::fs;
use tracing::{debug, info, warn};

impl TransactionEngine {
    /// Upload a package: metadata, missing objects, then finish
    ///
    /// The server-assigned uid is stored in the package and returned.
    pub fn push(&self, package: &mut Package, signer: &PackageSigner) -> Result<String> {
        package.objects.set_chunk_size(self.chunk_size);

        let expected: u64 = package
            .objects
            .all()
            .filter(|object| !object.is_loaded())
            .map(|object| self.expected_chunks(object))
            .sum();
        self.progress.start("Computing metadata", expected);
        let metadata = package.to_metadata(Some(&*self.progress))?;
        self.progress.finish("Metadata computed");
        schema::validate(&metadata)?;

        let uid = self.upload_metadata(&metadata, signer)?;
        package.uid = Some(uid.clone());
        info!("Package metadata accepted, uid {}", uid);

        // Installation set 0 only; the server stores objects by content
        let total = package
            .objects
            .set(0)
            .map(|object| object.chunk_count().unwrap_or_default())
            .sum();
        self.progress.start("Uploading objects", total);
        let mut failed = Vec::new();
        for index in 0..package.objects.len() {
            let object = package.objects.get_mut(index, 0)?;
            let result = self.upload_object(object, &uid)?;
            debug!("{}: {:?}", object.filename(), result);
            if !result.is_ok() {
                failed.push(object.filename().to_string());
            }
        }
        if !failed.is_empty() {
            self.progress.finish("Upload failed");
            return Err(Error::Upload(format!(
                "failed to upload: {}",
                failed.join(", ")
            )));
        }

        self.finish(&uid)?;
        self.progress.finish("Package pushed");
        info!("Package {} pushed", uid);
        Ok(uid)
    }

    /// POST the signed metadata and return the package uid
    pub fn upload_metadata(&self, metadata: &Value, signer: &PackageSigner) -> Result<String> {
        let body = serde_json::to_vec(metadata)?;
        let signature = signer.sign(&body)?;
        let response = self.client.send(
            "POST",
            "/packages",
            RequestBody::Json(body),
            &[("UH-SIGNATURE", signature.as_str())],
        )?;

        match response.status {
            201 => {
                let document = response
                    .json()
                    .map_err(|e| Error::Upload(format!("unreadable metadata response: {}", e)))?;
                document
                    .get("uid")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| Error::Upload("server did not return a package uid".to_string()))
            }
            401 => Err(Error::AuthRequired),
            status => Err(Error::Upload(server_error(status, response))),
        }
    }

    /// Pre-check an object and upload it when the server does not hold it
    ///
    /// Transport failures are errors; anything the server refuses is a
    /// [`UploadResult::Fail`].
    pub fn upload_object(&self, object: &mut Object, uid: &str) -> Result<UploadResult> {
        let upload = object.to_upload()?;
        let response = self.client.post_json(
            &format!("/packages/{}/objects/{}", uid, upload.sha256sum),
            &json!({ "etag": upload.md5 }),
            &[],
        )?;

        match response.status {
            200 => {
                for _ in 0..upload.chunks {
                    self.progress.object_read();
                }
                Ok(UploadResult::Exists)
            }
            201 => {
                let target = match response.json() {
                    Ok(target) => target,
                    Err(e) => {
                        warn!("{}: unreadable pre-check response: {}", upload.filename, e);
                        return Ok(UploadResult::Fail);
                    }
                };
                let storage_name = target.get("storage").and_then(Value::as_str).unwrap_or_default();
                let Some(url) = target.get("url").and_then(Value::as_str) else {
                    warn!("{}: server gave no upload URL", upload.filename);
                    return Ok(UploadResult::Fail);
                };
                let Some(storage) = storage_for(storage_name) else {
                    warn!("{}: unknown storage backend {:?}", upload.filename, storage_name);
                    return Ok(UploadResult::Fail);
                };

                let content = object.chunks()?.with_progress(self.progress.clone());
                match storage.upload(&self.client, url, &upload, Box::new(content)) {
                    Ok(true) => Ok(UploadResult::Success),
                    Ok(false) => {
                        warn!("{}: {} storage refused the upload", upload.filename, storage.name());
                        Ok(UploadResult::Fail)
                    }
                    Err(e @ Error::Http(_)) => Err(e),
                    Err(e) => {
                        warn!("{}: {}", upload.filename, e);
                        Ok(UploadResult::Fail)
                    }
                }
            }
            status => {
                warn!("{}: {}", upload.filename, server_error(status, response));
                Ok(UploadResult::Fail)
            }
        }
    }

    /// PUT `/packages/<uid>/finish`
    pub fn finish(&self, uid: &str) -> Result<()> {
        let response = self
            .client
            .put(&format!("/packages/{}/finish", uid), RequestBody::Empty)?;
        match response.status {
            204 => Ok(()),
            status => Err(Error::Upload(server_error(status, response))),
        }
    }

    /// Chunks an object will take to hash, from its size on disk
    fn expected_chunks(&self, object: &Object) -> u64 {
        fs::metadata(object.path())
            .map(|meta| meta.len().div_ceil(self.chunk_size as u64))
            .unwrap_or_default()
    }
}
