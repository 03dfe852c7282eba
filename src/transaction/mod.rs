// src/transaction/mod.rs

//! Push and pull transactions against the update-distribution server
//!
//! Push is a three phase protocol:
//!
//! ```text
//! POST /packages (metadata + signature)  -> uid
//! for each object of installation set 0:
//!     POST /packages/<uid>/objects/<sha256>  -> exists | storage + url
//!     PUT  <url>                              (only when not stored yet)
//! PUT /packages/<uid>/finish
//! ```
//!
//! Pull fetches the metadata, refuses to clobber local files that differ
//! from the package, then downloads the missing objects.
//!
//! Requests run sequentially; `finish` is only sent once every object has a
//! result.

mod pull;
mod push;
pub mod storage;

pub use storage::{storage_for, Storage};

use crate::error::{Error, Result};
use crate::http::{format_server_error, ApiClient, HttpResponse};
use crate::object::DEFAULT_CHUNK_SIZE;
use crate::progress::{SilentProgress, TransferProgress};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Outcome of uploading one object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadResult {
    /// Already stored on the server
    Exists,
    /// Uploaded in this transaction
    Success,
    Fail,
}

impl UploadResult {
    pub fn is_ok(self) -> bool {
        !matches!(self, Self::Fail)
    }
}

/// Runs push, pull and status requests for packages
pub struct TransactionEngine {
    client: ApiClient,
    progress: Arc<dyn TransferProgress>,
    chunk_size: usize,
}

impl TransactionEngine {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            progress: Arc::new(SilentProgress::new()),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Receive chunk-level progress events
    pub fn with_progress(mut self, progress: Arc<dyn TransferProgress>) -> Self {
        self.progress = progress;
        self
    }

    /// Chunk size for hashing, uploads and downloads
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Processing status of a pushed package
    pub fn status(&self, uid: &str) -> Result<String> {
        let metadata = self.fetch_package(uid)?;
        let status = metadata
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Download(format!("package {} has no status", uid)))?;
        debug!("Package {} status: {}", uid, status);
        Ok(status.to_string())
    }

    /// GET `/packages/<uid>`
    fn fetch_package(&self, uid: &str) -> Result<Value> {
        let response = self.client.get(&format!("/packages/{}", uid))?;
        match response.status {
            200 => response
                .json()
                .map_err(|e| Error::Download(format!("unreadable package metadata: {}", e))),
            401 => Err(Error::AuthRequired),
            404 => Err(Error::NotFound(format!("package {}", uid))),
            status => Err(Error::Download(server_error(status, response))),
        }
    }
}

/// Formatted server error from a failed response
fn server_error(status: u16, response: HttpResponse) -> String {
    let body = response.bytes().unwrap_or_default();
    format_server_error(status, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Credentials, HttpRequest, Transport};
    use std::sync::Mutex;

    struct Canned(Mutex<Vec<HttpResponse>>);

    impl Transport for Canned {
        fn execute(&self, _request: HttpRequest) -> Result<HttpResponse> {
            Ok(self.0.lock().unwrap().remove(0))
        }
    }

    fn engine(responses: Vec<HttpResponse>) -> TransactionEngine {
        let transport = Arc::new(Canned(Mutex::new(responses)));
        let client = ApiClient::new(transport, "http://localhost", Credentials::new("id", "secret")).unwrap();
        TransactionEngine::new(client)
    }

    #[test]
    fn test_status() {
        let engine = engine(vec![HttpResponse::new(200, br#"{"status": "done"}"#.to_vec())]);
        assert_eq!(engine.status("pkg").unwrap(), "done");
    }

    #[test]
    fn test_status_errors() {
        let engine = engine(vec![
            HttpResponse::new(404, Vec::new()),
            HttpResponse::new(401, Vec::new()),
            HttpResponse::new(200, b"{}".to_vec()),
            HttpResponse::new(500, b"oops".to_vec()),
        ]);
        assert!(matches!(engine.status("pkg"), Err(Error::NotFound(_))));
        assert!(matches!(engine.status("pkg"), Err(Error::AuthRequired)));
        assert!(matches!(engine.status("pkg"), Err(Error::Download(_))));
        assert!(matches!(engine.status("pkg"), Err(Error::Download(message)) if message.contains("oops")));
    }

    #[test]
    fn test_upload_result() {
        assert!(UploadResult::Exists.is_ok());
        assert!(UploadResult::Success.is_ok());
        assert!(!UploadResult::Fail.is_ok());
    }
}
