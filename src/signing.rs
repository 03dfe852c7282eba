// src/signing.rs
//! Package metadata signing
//!
//! Metadata pushed to the server and stored in archives is signed with the
//! user's RSA private key (PKCS#1 v1.5 over SHA-256). Signatures travel
//! base64 encoded. The key is read from disk once per signer.

use crate::error::{Error, Result};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::RsaPrivateKey;
use sha2::Sha256;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Signs package metadata with an RSA private key
pub struct PackageSigner {
    signing_key: SigningKey<Sha256>,
    verifying_key: VerifyingKey<Sha256>,
}

impl PackageSigner {
    /// Create from an existing private key
    pub fn from_private_key(key: RsaPrivateKey) -> Self {
        let verifying_key = VerifyingKey::new(key.to_public_key());
        Self {
            signing_key: SigningKey::new(key),
            verifying_key,
        }
    }

    /// Parse a PEM private key, PKCS#1 (`BEGIN RSA PRIVATE KEY`) or PKCS#8
    pub fn from_pem(pem: &str) -> Result<Self> {
        let key = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| Error::Signing(format!("invalid RSA private key: {}", e)))?;
        Ok(Self::from_private_key(key))
    }

    /// Load a PEM private key from a file
    pub fn from_pem_file(path: &Path) -> Result<Self> {
        let pem = fs::read_to_string(path).map_err(|e| {
            Error::Signing(format!("cannot read private key {}: {}", path.display(), e))
        })?;
        debug!("Loaded private key from {}", path.display());
        Self::from_pem(&pem)
    }

    /// Sign content, returning the base64 signature
    pub fn sign(&self, content: &[u8]) -> Result<String> {
        let signature = self
            .signing_key
            .try_sign(content)
            .map_err(|e| Error::Signing(e.to_string()))?;
        Ok(BASE64.encode(signature.to_bytes()))
    }

    /// Check a base64 signature against content
    pub fn verify(&self, content: &[u8], signature: &str) -> bool {
        let Ok(bytes) = BASE64.decode(signature) else {
            return false;
        };
        let Ok(signature) = Signature::try_from(bytes.as_slice()) else {
            return false;
        };
        self.verifying_key.verify(content, &signature).is_ok()
    }
}
