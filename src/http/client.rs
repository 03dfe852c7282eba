// src/http/client.rs

//! Signed API client for the update-distribution server
//!
//! Every request gets the UH-V1 header set at construction time, so the
//! timestamp it signs is the time the request was built.

use super::signing::{self, sha256_hex};
use super::transport::{HttpRequest, HttpResponse, RequestBody, Transport};
use crate::error::{Error, Result};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Media type of the API
pub const API_CONTENT_TYPE: &str = "application/vnd.updatehub-v1+json";

/// `User-Agent` sent with every request
pub fn user_agent() -> String {
    format!("updatehub-utils/{}", env!("CARGO_PKG_VERSION"))
}

/// Access key pair for the server
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_id: String,
    pub access_secret: String,
}

impl Credentials {
    pub fn new(access_id: impl Into<String>, access_secret: impl Into<String>) -> Self {
        Self {
            access_id: access_id.into(),
            access_secret: access_secret.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_id", &self.access_id)
            .field("access_secret", &"<redacted>")
            .finish()
    }
}

/// HTTP client signing every request with the user's credentials
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    server_url: Url,
    credentials: Credentials,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, server_url: &str, credentials: Credentials) -> Result<Self> {
        let server_url = Url::parse(server_url)
            .map_err(|e| Error::Http(format!("invalid server URL {}: {}", server_url, e)))?;
        Ok(Self {
            transport,
            server_url,
            credentials,
        })
    }

    pub fn server_url(&self) -> &Url {
        &self.server_url
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Resolve a path (or an absolute URL) against the server URL
    pub fn url(&self, path: &str) -> Result<Url> {
        self.server_url
            .join(path)
            .map_err(|e| Error::Http(format!("invalid URL {}: {}", path, e)))
    }

    /// Build the signed request for `method url`
    pub fn signed_request(
        &self,
        method: &str,
        url: &Url,
        body: RequestBody,
        extra_headers: &[(&str, &str)],
    ) -> HttpRequest {
        let content_sha256 = match &body {
            RequestBody::Empty => sha256_hex(b""),
            RequestBody::Json(bytes) => sha256_hex(bytes),
            RequestBody::Stream { sha256, .. } => sha256.clone(),
        };
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        };
        let timestamp = signing::timestamp(Utc::now());

        let mut headers: Vec<(String, String)> = vec![
            ("Host".into(), host),
            ("Timestamp".into(), timestamp.clone()),
            ("Content-sha256".into(), content_sha256.clone()),
            ("Api-Content-Type".into(), API_CONTENT_TYPE.into()),
            ("Accept".into(), "application/json".into()),
            ("User-Agent".into(), user_agent()),
        ];
        if body.is_json() {
            headers.push(("Content-Type".into(), "application/json".into()));
        }
        headers.extend(
            extra_headers
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string())),
        );

        let normalized =
            signing::normalize_headers(headers.iter().map(|(n, v)| (n.as_str(), v.as_str())));
        let canonical = signing::canonical_request(method, url.path(), url.query(), &normalized, &content_sha256);
        let authorization = signing::authorization_header(
            &self.credentials.access_id,
            &self.credentials.access_secret,
            &timestamp,
            &normalized,
            &sha256_hex(canonical.as_bytes()),
        );
        headers.push(("Authorization".into(), authorization));

        HttpRequest {
            method: method.to_uppercase(),
            url: url.to_string(),
            headers,
            body,
        }
    }

    /// Sign and send a request to a server path
    pub fn send(
        &self,
        method: &str,
        path: &str,
        body: RequestBody,
        extra_headers: &[(&str, &str)],
    ) -> Result<HttpResponse> {
        let url = self.url(path)?;
        let request = self.signed_request(method, &url, body, extra_headers);
        debug!("{} {}", request.method, request.url);
        self.transport.execute(request)
    }

    pub fn get(&self, path: &str) -> Result<HttpResponse> {
        self.send("GET", path, RequestBody::Empty, &[])
    }

    pub fn post_json(&self, path: &str, body: &Value, extra_headers: &[(&str, &str)]) -> Result<HttpResponse> {
        self.send("POST", path, RequestBody::Json(serde_json::to_vec(body)?), extra_headers)
    }

    pub fn put(&self, path: &str, body: RequestBody) -> Result<HttpResponse> {
        self.send("PUT", path, body, &[])
    }
}

/// Human readable message from a server error body
///
/// Handles `{"errors": {"field": ["message", ...]}}` and
/// `{"error_message": "..."}`, falling back to the raw text.
pub fn format_server_error(status: u16, body: &[u8]) -> String {
    let detail = match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(document)) => {
            if let Some(Value::Object(errors)) = document.get("errors") {
                let fields: Vec<String> = errors
                    .iter()
                    .map(|(field, messages)| {
                        let messages = match messages {
                            Value::Array(list) => list
                                .iter()
                                .map(|m| m.as_str().map(str::to_string).unwrap_or_else(|| m.to_string()))
                                .collect::<Vec<_>>()
                                .join(", "),
                            Value::String(message) => message.clone(),
                            other => other.to_string(),
                        };
                        format!("{}: {}", field, messages)
                    })
                    .collect();
                fields.join("; ")
            } else if let Some(message) = document.get("error_message").and_then(Value::as_str) {
                message.to_string()
            } else {
                Value::Object(document).to_string()
            }
        }
        _ => String::from_utf8_lossy(body).trim().to_string(),
    };
    if detail.is_empty() {
        format!("server answered {}", status)
    } else {
        format!("server answered {}: {}", status, detail)
    }
}
