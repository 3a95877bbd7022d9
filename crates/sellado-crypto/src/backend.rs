#![forbid(unsafe_code)]

//! The crypto backend handle injected into the signing pipeline.
//!
//! A backend is created once per process and passed to signers
//! explicitly, usually as an `Arc<dyn CryptoBackend>`.

use std::sync::Arc;

use sellado_core::Error;

use crate::digest::DigestMethod;
use crate::sign::{SignatureMethod, SigningKey, VerifyingKey};

/// Digest and signature operations used by signers and verifiers.
pub trait CryptoBackend: Send + Sync {
    /// Human-readable backend name, for logs.
    fn name(&self) -> &'static str;

    fn digest(&self, method: DigestMethod, data: &[u8]) -> Result<Vec<u8>, Error>;

    fn sign(&self, method: SignatureMethod, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, Error>;

    fn verify(
        &self,
        method: SignatureMethod,
        key: &VerifyingKey,
        data: &[u8],
        signature: &[u8],
    ) -> Result<bool, Error>;
}

/// Pure-Rust backend built on the RustCrypto crates.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustCrypto;

impl CryptoBackend for RustCrypto {
    fn name(&self) -> &'static str {
        "rustcrypto"
    }

    fn digest(&self, method: DigestMethod, data: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(method.digest(data))
    }

    fn sign(&self, method: SignatureMethod, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        crate::sign::sign(method, key, data)
    }

    fn verify(
        &self,
        method: SignatureMethod,
        key: &VerifyingKey,
        data: &[u8],
        signature: &[u8],
    ) -> Result<bool, Error> {
        crate::sign::verify(method, key, data, signature)
    }
}

/// The default backend as a shareable handle.
pub fn default_backend() -> Arc<dyn CryptoBackend> {
    Arc::new(RustCrypto)
}
