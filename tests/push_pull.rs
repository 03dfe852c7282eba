// tests/push_pull.rs

//! Push, pull and status against a scripted server

mod common;

use common::*;
use serde_json::{json, Value};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use uhu::{Error, Package, SilentProgress};

/// Package with two raw objects of 4 bytes each, in two installation sets
fn two_object_package(dir: &TempDir) -> Package {
    let a = write_file(dir.path(), "a.bin", b"aaaa");
    let b = write_file(dir.path(), "b.bin", b"bbbb");

    let mut package = Package::new(Some(PRODUCT.to_string()), Some("1.0".to_string()));
    package
        .add_object(
            uhu::Mode::Raw,
            &raw_options(a.to_str().unwrap(), json!(["/dev/sda1", "/dev/sda2"])),
        )
        .unwrap();
    package
        .add_object(
            uhu::Mode::Raw,
            &raw_options(b.to_str().unwrap(), json!(["/dev/sdb1", "/dev/sdb2"])),
        )
        .unwrap();
    package
}

#[test]
fn test_push_uploads_every_object_then_finishes() {
    let dir = TempDir::new().unwrap();
    let mut package = two_object_package(&dir);
    let signer = signer();

    let transport = ScriptedTransport::new();
    transport
        .respond_json(201, json!({"uid": "pkg-42"}))
        .respond_json(201, json!({"storage": "dummy", "url": "/upload/a"}))
        .respond(200, Vec::new())
        .respond_json(201, json!({"storage": "dummy", "url": "/upload/b"}))
        .respond(201, Vec::new())
        .respond(204, Vec::new());

    let progress = Arc::new(SilentProgress::new());
    let engine = engine(&transport, 1).with_progress(progress.clone());
    let uid = engine.push(&mut package, &signer).unwrap();

    assert_eq!(uid, "pkg-42");
    assert_eq!(package.uid.as_deref(), Some("pkg-42"));

    let requests = transport.requests();
    let calls: Vec<(&str, &str)> = requests
        .iter()
        .map(|r| (r.method.as_str(), r.path()))
        .collect();
    let sha_a = sha256_hex(b"aaaa");
    let sha_b = sha256_hex(b"bbbb");
    let precheck_a = format!("/packages/pkg-42/objects/{}", sha_a);
    let precheck_b = format!("/packages/pkg-42/objects/{}", sha_b);
    assert_eq!(
        calls,
        vec![
            ("POST", "/packages"),
            ("POST", precheck_a.as_str()),
            ("PUT", "/upload/a"),
            ("POST", precheck_b.as_str()),
            ("PUT", "/upload/b"),
            ("PUT", "/packages/pkg-42/finish"),
        ]
    );

    // Metadata is signed with the package key
    let metadata = &requests[0];
    let signature = metadata.header("UH-SIGNATURE").unwrap();
    assert!(signer.verify(&metadata.body, signature));
    let document: Value = serde_json::from_slice(&metadata.body).unwrap();
    assert_eq!(document["objects"].as_array().unwrap().len(), 2);
    assert_eq!(document["objects"][0][0]["sha256sum"], json!(sha_a));
    assert_eq!(document["objects"][1][0]["target"], json!("/dev/sda2"));

    // Pre-check carries the MD5 etag; the upload carries the bytes
    let precheck: Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert_eq!(precheck, json!({"etag": "74b87337454200d4d33f80c4663dc5e5"}));
    assert_eq!(requests[2].body, b"aaaa");
    assert_eq!(requests[4].body, b"bbbb");

    for request in &requests {
        assert!(request.header("Authorization").unwrap().starts_with("UH-V1 "));
    }

    // 4 one-byte chunks per object
    assert_eq!(progress.position(), 8);
    assert!(progress.is_finished());
}

#[test]
fn test_push_skips_objects_the_server_holds() {
    let dir = TempDir::new().unwrap();
    let mut package = two_object_package(&dir);

    let transport = ScriptedTransport::new();
    transport
        .respond_json(201, json!({"uid": "pkg-42"}))
        .respond(200, Vec::new())
        .respond_json(201, json!({"storage": "dummy", "url": "/upload/b"}))
        .respond(201, Vec::new())
        .respond(204, Vec::new());

    engine(&transport, 1).push(&mut package, &signer()).unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 5);
    assert_eq!(requests[4].path(), "/packages/pkg-42/finish");
}

#[test]
fn test_push_aggregates_object_failures() {
    let dir = TempDir::new().unwrap();
    let mut package = two_object_package(&dir);

    let transport = ScriptedTransport::new();
    transport
        .respond_json(201, json!({"uid": "pkg-42"}))
        .respond_json(500, json!({"error_message": "storage offline"}))
        .respond_json(201, json!({"storage": "ftp", "url": "/upload/b"}));

    let error = engine(&transport, 4).push(&mut package, &signer()).unwrap_err();
    match error {
        Error::Upload(message) => {
            assert!(message.contains("a.bin"), "{}", message);
            assert!(message.contains("b.bin"), "{}", message);
        }
        other => panic!("expected upload error, got {:?}", other),
    }

    // No finish after failures
    let requests = transport.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests.iter().all(|r| !r.path().ends_with("/finish")));
}

#[test]
fn test_push_metadata_errors() {
    let dir = TempDir::new().unwrap();

    let transport = ScriptedTransport::new();
    transport.respond(401, Vec::new());
    let mut package = two_object_package(&dir);
    let error = engine(&transport, 4).push(&mut package, &signer()).unwrap_err();
    assert!(matches!(error, Error::AuthRequired));
    assert_eq!(transport.requests().len(), 1);

    let transport = ScriptedTransport::new();
    transport.respond_json(400, json!({"errors": {"version": ["already exists"]}}));
    let error = engine(&transport, 4).push(&mut package, &signer()).unwrap_err();
    match error {
        Error::Upload(message) => assert!(message.contains("version: already exists"), "{}", message),
        other => panic!("expected upload error, got {:?}", other),
    }
}

#[test]
fn test_push_rejects_invalid_metadata_before_sending() {
    let dir = TempDir::new().unwrap();
    let mut package = two_object_package(&dir);
    package.product = Some("not-a-product".to_string());

    let transport = ScriptedTransport::new();
    let error = engine(&transport, 4).push(&mut package, &signer()).unwrap_err();
    assert!(matches!(error, Error::InvalidMetadata(_)));
    assert!(transport.requests().is_empty());
}

#[test]
fn test_push_connection_error() {
    let dir = TempDir::new().unwrap();
    let mut package = two_object_package(&dir);

    // No scripted answers: the transport refuses the connection
    let transport = ScriptedTransport::new();
    let error = engine(&transport, 4).push(&mut package, &signer()).unwrap_err();
    assert!(matches!(error, Error::Http(_)));
}

fn server_metadata() -> Value {
    let object = |filename: &str, content: &[u8], target: &str| {
        json!({
            "mode": "raw",
            "filename": filename,
            "size": content.len(),
            "sha256sum": sha256_hex(content),
            "target-type": "device",
            "target": target,
        })
    };
    json!({
        "product": PRODUCT,
        "version": "2.0",
        "status": "done",
        "supported-hardware": "any",
        "objects": [
            [object("a.bin", b"aaaa", "/dev/sda1"), object("b.bin", b"bbbb", "/dev/sdb1")],
            [object("a.bin", b"aaaa", "/dev/sda2"), object("b.bin", b"bbbb", "/dev/sdb2")],
        ],
    })
}

#[test]
fn test_pull_downloads_missing_and_skips_matching() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "b.bin", b"bbbb");

    let transport = ScriptedTransport::new();
    transport
        .respond_json(200, server_metadata())
        .respond(200, b"aaaa".to_vec());

    let package = engine(&transport, 3).pull("pkg-7", dir.path()).unwrap();
    assert_eq!(package.uid.as_deref(), Some("pkg-7"));
    assert_eq!(package.version.as_deref(), Some("2.0"));
    assert_eq!(package.objects.len(), 2);
    assert_eq!(
        package.objects.get(0, 1).unwrap().get("target").and_then(|v| v.as_text()),
        Some("/dev/sda2")
    );

    assert_eq!(fs::read(dir.path().join("a.bin")).unwrap(), b"aaaa");
    let paths: Vec<String> = transport
        .requests()
        .iter()
        .map(|r| r.path().to_string())
        .collect();
    assert_eq!(
        paths,
        vec![
            "/packages/pkg-7".to_string(),
            format!("/products/{}/packages/pkg-7/objects/{}", PRODUCT, sha256_hex(b"aaaa")),
        ]
    );
}

#[test]
fn test_pull_refuses_to_overwrite_divergent_files() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "b.bin", b"local changes");

    let transport = ScriptedTransport::new();
    transport
        .respond_json(200, server_metadata())
        .respond(200, b"aaaa".to_vec());

    let error = engine(&transport, 3).pull("pkg-7", dir.path()).unwrap_err();
    assert!(matches!(error, Error::FileWouldBeOverwritten(ref path) if path.ends_with("b.bin")));
    assert!(error.is_download_error());

    // Nothing downloaded, nothing written
    assert_eq!(transport.requests().len(), 1);
    assert!(!dir.path().join("a.bin").exists());
    assert_eq!(fs::read(dir.path().join("b.bin")).unwrap(), b"local changes");
}

#[test]
fn test_pull_rejects_corrupted_download() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "b.bin", b"bbbb");

    let transport = ScriptedTransport::new();
    transport
        .respond_json(200, server_metadata())
        .respond(200, b"tampered".to_vec());

    let error = engine(&transport, 3).pull("pkg-7", dir.path()).unwrap_err();
    assert!(matches!(error, Error::Download(_)));
    assert!(!dir.path().join("a.bin").exists());
}

#[test]
fn test_pull_and_status_not_found() {
    let dir = TempDir::new().unwrap();
    let transport = ScriptedTransport::new();
    transport.respond(404, Vec::new()).respond(404, Vec::new());

    let engine = engine(&transport, 3);
    assert!(matches!(engine.pull("missing", dir.path()), Err(Error::NotFound(_))));
    assert!(matches!(engine.status("missing"), Err(Error::NotFound(_))));
}

#[test]
fn test_status() {
    let transport = ScriptedTransport::new();
    transport.respond_json(200, server_metadata());
    assert_eq!(engine(&transport, 3).status("pkg-7").unwrap(), "done");
    assert_eq!(transport.requests()[0].method, "GET");
}
