//! Request signing
//!
//! The control plane authenticates the service with an HTTP Signature over
//! the request `Date` header: RSA-SHA256 with a key registered under the
//! account. The key is loaded once at startup; the signature is recomputed
//! per call because it covers the current timestamp.

use anyhow::{Context, Result};
use base64::Engine;
use chrono::Utc;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::sha2::Sha256;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use std::path::Path;

/// Signer holding the service's RSA key and its registered identity.
#[derive(Clone)]
pub struct RequestSigner {
    key: SigningKey<Sha256>,
    key_id: String,
}

impl RequestSigner {
    /// Load a PEM private key from disk. Accepts PKCS#8 and PKCS#1
    /// encodings, which covers both `openssl genpkey` and `ssh-keygen -m pem`
    /// exports.
    pub fn from_pem_file(path: &Path, account: &str, key_name: &str) -> Result<Self> {
        let pem = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read signing key from {}", path.display()))?;

        Self::from_pem(&pem, account, key_name)
    }

    pub fn from_pem(pem: &str, account: &str, key_name: &str) -> Result<Self> {
        let key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .context("failed to parse RSA private key PEM")?;

        Ok(Self {
            key: SigningKey::new(key),
            key_id: format!("/{account}/keys/{key_name}"),
        })
    }

    /// The key identity as it appears in the `Authorization` header,
    /// `/<account>/keys/<keyId>`.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Current timestamp in the RFC-1123 form the `Date` header requires.
    pub fn date() -> String {
        Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
    }

    /// Base64 signature over the given date string.
    pub fn sign(&self, date: &str) -> String {
        let signature = self.key.sign(date.as_bytes());
        base64::engine::general_purpose::STANDARD.encode(signature.to_bytes())
    }

    /// Full `Authorization` header value for a request carrying `date`.
    pub fn authorization(&self, date: &str) -> String {
        format!(
            "Signature keyId=\"{}\",algorithm=\"rsa-sha256\" {}",
            self.key_id,
            self.sign(date)
        )
    }
}
