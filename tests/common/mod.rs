// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use rsa::RsaPrivateKey;
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use uhu::http::{ApiClient, Credentials, HttpRequest, HttpResponse, RequestBody, Transport};
use uhu::{Error, PackageSigner, Result, TransactionEngine};

pub const PRODUCT: &str = "0a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f9";
pub const SERVER_URL: &str = "http://updatehub.test:8080";

/// A request as the transport saw it, with the body drained
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Path and query of the URL
    pub fn path(&self) -> &str {
        self.url.strip_prefix(SERVER_URL).unwrap_or(&self.url)
    }
}

/// In-memory transport answering from a queue and recording every request
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<(u16, Vec<u8>)>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, status: u16, body: impl Into<Vec<u8>>) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .push_back((status, body.into()));
        self
    }

    pub fn respond_json(&self, status: u16, body: Value) -> &Self {
        self.respond(status, serde_json::to_vec(&body).unwrap())
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let body = match request.body {
            RequestBody::Empty => Vec::new(),
            RequestBody::Json(bytes) => bytes,
            RequestBody::Stream { mut reader, .. } => {
                let mut bytes = Vec::new();
                reader.read_to_end(&mut bytes)?;
                bytes
            }
        };
        self.requests.lock().unwrap().push(RecordedRequest {
            method: request.method,
            url: request.url,
            headers: request.headers,
            body,
        });

        let (status, body) = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Http("connection refused".to_string()))?;
        Ok(HttpResponse::new(status, body))
    }
}

pub fn engine(transport: &Arc<ScriptedTransport>, chunk_size: usize) -> TransactionEngine {
    let client = ApiClient::new(
        transport.clone(),
        SERVER_URL,
        Credentials::new("123ACCESSID", "SECRET"),
    )
    .unwrap();
    TransactionEngine::new(client).with_chunk_size(chunk_size)
}

/// Signer over a fresh 1024-bit key
pub fn signer() -> PackageSigner {
    let mut rng = rand::thread_rng();
    let key = RsaPrivateKey::new(&mut rng, 1024).unwrap();
    PackageSigner::from_private_key(key)
}

pub fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// Options for a raw object writing to `target`
pub fn raw_options(filename: &str, target: Value) -> Map<String, Value> {
    let value = json!({
        "filename": filename,
        "target-type": "device",
        "target": target,
    });
    value.as_object().cloned().unwrap()
}

pub fn sha256_hex(content: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(content))
}
