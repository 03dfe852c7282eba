// src/transaction/storage.rs

//! Object storage backends
//!
//! When the server does not hold an object yet, it answers the pre-check
//! with the storage backend to use and a presigned URL. Every backend PUTs
//! the raw object bytes; they differ in how the request is authenticated
//! and which integrity header the store expects:
//!
//! - `dummy`: signed through the API client, URL relative to the server
//! - `swift`: unsigned, `ETag` carrying the MD5 hex digest
//! - `s3`: unsigned, `Content-MD5` carrying the base64 MD5 digest

use crate::error::{Error, Result};
use crate::http::{ApiClient, HttpRequest, RequestBody};
use crate::object::UploadInfo;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use std::io::Read;
use tracing::debug;

/// Destination of an object upload
pub trait Storage {
    /// Backend name as sent by the server
    fn name(&self) -> &'static str;

    /// PUT the object content to `url`; `Ok(false)` when the store refused it
    fn upload(
        &self,
        client: &ApiClient,
        url: &str,
        object: &UploadInfo,
        content: Box<dyn Read + Send>,
    ) -> Result<bool>;
}

/// Backend selected by name, `None` when the name is unknown
pub fn storage_for(name: &str) -> Option<Box<dyn Storage>> {
    match name {
        "dummy" => Some(Box::new(DummyStorage)),
        "swift" => Some(Box::new(SwiftStorage)),
        "s3" => Some(Box::new(S3Storage)),
        _ => None,
    }
}

fn stream_body(object: &UploadInfo, content: Box<dyn Read + Send>) -> RequestBody {
    RequestBody::Stream {
        reader: content,
        length: object.size,
        sha256: object.sha256sum.clone(),
    }
}

/// Unsigned PUT to a presigned URL
fn put_presigned(
    client: &ApiClient,
    url: &str,
    headers: Vec<(String, String)>,
    body: RequestBody,
) -> Result<bool> {
    let url = client.url(url)?;
    let request = HttpRequest {
        method: "PUT".to_string(),
        url: url.to_string(),
        headers,
        body,
    };
    let response = client.transport().execute(request)?;
    debug!("PUT {} -> {}", url, response.status);
    Ok(response.is_success())
}

/// Development storage served by the API server itself
pub struct DummyStorage;

impl Storage for DummyStorage {
    fn name(&self) -> &'static str {
        "dummy"
    }

    fn upload(
        &self,
        client: &ApiClient,
        url: &str,
        object: &UploadInfo,
        content: Box<dyn Read + Send>,
    ) -> Result<bool> {
        let response = client.put(url, stream_body(object, content))?;
        debug!("Dummy storage PUT {} -> {}", url, response.status);
        Ok(response.is_success())
    }
}

/// OpenStack Swift
pub struct SwiftStorage;

impl Storage for SwiftStorage {
    fn name(&self) -> &'static str {
        "swift"
    }

    fn upload(
        &self,
        client: &ApiClient,
        url: &str,
        object: &UploadInfo,
        content: Box<dyn Read + Send>,
    ) -> Result<bool> {
        let headers = vec![("ETag".to_string(), object.md5.clone())];
        put_presigned(client, url, headers, stream_body(object, content))
    }
}

/// Amazon S3
pub struct S3Storage;

impl Storage for S3Storage {
    fn name(&self) -> &'static str {
        "s3"
    }

    fn upload(
        &self,
        client: &ApiClient,
        url: &str,
        object: &UploadInfo,
        content: Box<dyn Read + Send>,
    ) -> Result<bool> {
        let digest = hex::decode(&object.md5)
            .map_err(|e| Error::Upload(format!("invalid MD5 for {}: {}", object.filename, e)))?;
        let headers = vec![("Content-MD5".to_string(), BASE64.encode(digest))];
        put_presigned(client, url, headers, stream_body(object, content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Credentials, HttpResponse, Transport};
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorder {
        requests: Mutex<Vec<(String, Vec<(String, String)>, Vec<u8>)>>,
    }

    impl Transport for Recorder {
        fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
            let body = match request.body {
                RequestBody::Stream { mut reader, .. } => {
                    let mut bytes = Vec::new();
                    reader.read_to_end(&mut bytes)?;
                    bytes
                }
                _ => Vec::new(),
            };
            self.requests
                .lock()
                .unwrap()
                .push((request.url, request.headers, body));
            Ok(HttpResponse::new(201, Vec::new()))
        }
    }

    fn upload_info() -> UploadInfo {
        UploadInfo {
            filename: "rootfs.img".into(),
            size: 5,
            sha256sum: "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824".into(),
            md5: "5d41402abc4b2a76b9719d911017c592".into(),
            chunks: 1,
        }
    }

    fn upload(name: &str, url: &str) -> (String, Vec<(String, String)>, Vec<u8>) {
        let recorder = Arc::new(Recorder::default());
        let client = ApiClient::new(recorder.clone(), "http://server:8080", Credentials::new("id", "secret")).unwrap();
        let storage = storage_for(name).unwrap();
        assert_eq!(storage.name(), name);
        let ok = storage
            .upload(&client, url, &upload_info(), Box::new(Cursor::new(b"hello".to_vec())))
            .unwrap();
        assert!(ok);
        recorder.requests.lock().unwrap().remove(0)
    }

    fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
        headers.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_dummy_storage_is_signed_and_relative() {
        let (url, headers, body) = upload("dummy", "/upload/abc");
        assert_eq!(url, "http://server:8080/upload/abc");
        assert!(header(&headers, "Authorization").is_some());
        assert_eq!(header(&headers, "Content-sha256"), Some(upload_info().sha256sum.as_str()));
        assert_eq!(body, b"hello");
    }

    #[test]
    fn test_swift_storage_sends_etag() {
        let (url, headers, body) = upload("swift", "https://swift.example.com/v1/obj?sig=1");
        assert_eq!(url, "https://swift.example.com/v1/obj?sig=1");
        assert_eq!(header(&headers, "ETag"), Some("5d41402abc4b2a76b9719d911017c592"));
        assert!(header(&headers, "Authorization").is_none());
        assert_eq!(body, b"hello");
    }

    #[test]
    fn test_s3_storage_sends_base64_md5() {
        let (_, headers, _) = upload("s3", "https://bucket.s3.amazonaws.com/obj");
        assert_eq!(header(&headers, "Content-MD5"), Some("XUFAKrxLKna5cZ2REBfFkg=="));
    }

    #[test]
    fn test_unknown_storage() {
        assert!(storage_for("ftp").is_none());
    }
}
