// src/http/signing.rs

//! UH-V1 request signatures
//!
//! A request is reduced to a canonical string:
//!
//! ```text
//! METHOD
//! PATH
//! CANONICAL-QUERY
//! CANONICAL-HEADERS
//!
//! CONTENT-SHA256
//! ```
//!
//! which is hashed and signed with a key derived from the access secret and
//! the request timestamp. The derived key is the *hex string* of an HMAC,
//! used as raw UTF-8 bytes; the server does the same.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

type HmacSha256 = Hmac<Sha256>;

/// Signature scheme name, used in the key prefix and the message
pub const SCHEME: &str = "UH-V1";

/// Query string with keys sorted and every key's values sorted, both
/// percent-encoded
pub fn canonical_query(query: Option<&str>) -> String {
    let Some(query) = query.filter(|q| !q.is_empty()) else {
        return String::new();
    };
    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        params.entry(key.into_owned()).or_default().push(value.into_owned());
    }

    let mut pairs = Vec::new();
    for (key, mut values) in params {
        values.sort();
        let key = urlencoding::encode(&key);
        for value in values {
            pairs.push(format!("{}={}", key, urlencoding::encode(&value)));
        }
    }
    pairs.join("&")
}

/// Lowercase names mapped to trimmed values, sorted by name
pub fn normalize_headers<'a, I>(headers: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    headers
        .into_iter()
        .map(|(name, value)| (name.to_lowercase(), value.trim().to_string()))
        .collect()
}

/// `name:value` lines sorted by name
pub fn canonical_headers(headers: &BTreeMap<String, String>) -> String {
    headers
        .iter()
        .map(|(name, value)| format!("{}:{}", name, value))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Sorted lowercase header names joined by `;`
pub fn signed_headers(headers: &BTreeMap<String, String>) -> String {
    headers.keys().cloned().collect::<Vec<_>>().join(";")
}

pub fn canonical_request(
    method: &str,
    path: &str,
    query: Option<&str>,
    headers: &BTreeMap<String, String>,
    content_sha256: &str,
) -> String {
    format!(
        "{}\n{}\n{}\n{}\n\n{}",
        method.to_uppercase(),
        path,
        canonical_query(query),
        canonical_headers(headers),
        content_sha256
    )
}

fn hmac_hex(key: &[u8], message: &[u8]) -> String {
    // HMAC accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC takes keys of any size");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// Hex HMAC of the timestamp under `UH-V1-<secret>`
pub fn date_key(secret: &str, timestamp: &str) -> String {
    hmac_hex(format!("{}-{}", SCHEME, secret).as_bytes(), timestamp.as_bytes())
}

/// Request signature from the hex SHA-256 of the canonical request
pub fn signature(secret: &str, timestamp: &str, canonical_sha256: &str) -> String {
    let key = date_key(secret, timestamp);
    let message = format!("{}\n{}\n{}", SCHEME, timestamp, canonical_sha256);
    hmac_hex(key.as_bytes(), message.as_bytes())
}

/// Value of the `Authorization` header
pub fn authorization_header(
    access_id: &str,
    secret: &str,
    timestamp: &str,
    headers: &BTreeMap<String, String>,
    canonical_sha256: &str,
) -> String {
    format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        SCHEME,
        access_id,
        timestamp,
        signed_headers(headers),
        signature(secret, timestamp, canonical_sha256)
    )
}

/// Decimal UTC epoch seconds with microsecond fraction
pub fn timestamp(now: DateTime<Utc>) -> String {
    format!("{}.{:06}", now.timestamp(), now.timestamp_subsec_micros())
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_query_sorts_keys_and_values() {
        assert_eq!(
            canonical_query(Some("b=3&a=1&b=2&a=%21&b=1&a=%20")),
            "a=%20&a=%21&a=1&b=1&b=2&b=3"
        );
        assert_eq!(canonical_query(None), "");
        assert_eq!(canonical_query(Some("")), "");
    }

    #[test]
    fn test_canonical_query_order_independent() {
        let a = canonical_query(Some("x=1&y=2&x=0&z=a%20b"));
        let b = canonical_query(Some("z=a%20b&x=0&y=2&x=1"));
        assert_eq!(a, b);
        assert_eq!(a, "x=0&x=1&y=2&z=a%20b");
    }

    #[test]
    fn test_headers_lowercased_and_sorted() {
        let headers = normalize_headers([("foo", " 1 "), ("Host", "h"), ("bar", "2"), ("x-uh-timestamp", "1")]);
        assert_eq!(signed_headers(&headers), "bar;foo;host;x-uh-timestamp");
        assert_eq!(canonical_headers(&headers), "bar:2\nfoo:1\nhost:h\nx-uh-timestamp:1");
    }

    #[test]
    fn test_canonical_request_layout() {
        let headers = normalize_headers([("Host", "localhost")]);
        let request = canonical_request("get", "/packages", Some("b=2&a=1"), &headers, "abc");
        assert_eq!(request, "GET\n/packages\na=1&b=2\nhost:localhost\n\nabc");
    }

    #[test]
    fn test_signature_vectors() {
        assert_eq!(
            date_key("SECRET", "1"),
            "15c566671daf58bb01d79679f5240906dd80add28b7662604ed8b83d8d151d0d"
        );
        assert_eq!(
            signature("SECRET", "1", "000"),
            "8d5611350b9d8770e22224e822c3abf6f0038437af3d12ad233dc56f17ca0ae1"
        );

        let headers = normalize_headers([("bar", "b"), ("foo", "f"), ("Host", "h"), ("x-uh-timestamp", "1")]);
        let authorization = authorization_header("123ACCESSID", "SECRET", "1", &headers, "000");
        assert_eq!(
            authorization,
            "UH-V1 Credential=123ACCESSID/1, SignedHeaders=bar;foo;host;x-uh-timestamp, \
             Signature=8d5611350b9d8770e22224e822c3abf6f0038437af3d12ad233dc56f17ca0ae1"
        );
    }

    #[test]
    fn test_signature_is_deterministic() {
        assert_eq!(signature("s", "1.5", "abc"), signature("s", "1.5", "abc"));
        assert_ne!(signature("s", "1.5", "abc"), signature("s", "1.6", "abc"));
    }

    #[test]
    fn test_timestamp_format() {
        let now = DateTime::from_timestamp(1_500_000_000, 42_000).unwrap();
        assert_eq!(timestamp(now), "1500000000.000042");
    }

    #[test]
    fn test_empty_body_hash() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
