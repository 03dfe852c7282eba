// src/http/mod.rs

//! HTTP access to the update-distribution server
//!
//! - `signing`: UH-V1 canonical requests and HMAC signatures
//! - `transport`: the [`Transport`] seam and its reqwest implementation
//! - `client`: [`ApiClient`], which signs every request it sends

pub mod client;
pub mod signing;
pub mod transport;

pub use client::{format_server_error, ApiClient, Credentials, API_CONTENT_TYPE};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, RequestBody, Transport};
