// src/http/transport.rs

//! HTTP transport
//!
//! The client and the storage backends talk to the network through the
//! [`Transport`] trait. The production implementation is a blocking
//! reqwest client; tests plug in a scripted transport.

use crate::error::{Error, Result};
use reqwest::blocking::{Body, Client};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{Cursor, Read};
use std::time::Duration;
use tracing::debug;

/// Default timeout for establishing connections (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Request body
pub enum RequestBody {
    Empty,
    /// Serialized JSON document
    Json(Vec<u8>),
    /// Sized stream whose SHA-256 is known in advance
    Stream {
        reader: Box<dyn Read + Send>,
        length: u64,
        sha256: String,
    },
}

impl RequestBody {
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json(_))
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty"),
            Self::Json(bytes) => write!(f, "Json({} bytes)", bytes.len()),
            Self::Stream { length, .. } => write!(f, "Stream({} bytes)", length),
        }
    }
}

/// Outgoing request with its final header set
#[derive(Debug)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Response with a streaming body
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Box<dyn Read + Send>,
}

impl HttpResponse {
    /// Response with an in-memory body
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: Box::new(Cursor::new(body.into())),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Read the whole body
    pub fn bytes(mut self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.body.read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    pub fn json(self) -> Result<serde_json::Value> {
        Ok(serde_json::from_slice(&self.bytes()?)?)
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Something that can execute HTTP requests
pub trait Transport: Send + Sync {
    /// Execute a request; only transport-level failures are errors, any
    /// HTTP status is a response
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Blocking reqwest transport
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(HTTP_TIMEOUT)
            .timeout(None)
            .build()
            .map_err(|e| Error::Http(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| Error::Http(format!("Invalid method {}: {e}", request.method)))?;
        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(bytes) => builder.body(bytes),
            RequestBody::Stream { reader, length, .. } => builder.body(Body::sized(reader, length)),
        };

        let response = builder
            .send()
            .map_err(|e| Error::Http(format!("{} {}: {e}", request.method, request.url)))?;
        let status = response.status().as_u16();
        debug!("{} {} -> {}", request.method, request.url, status);

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        Ok(HttpResponse {
            status,
            headers,
            body: Box::new(response),
        })
    }
}
