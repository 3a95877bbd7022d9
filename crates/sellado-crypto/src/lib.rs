#![forbid(unsafe_code)]

//! Cryptographic primitives for sellado: digests, RSA and ECDSA
//! signatures, and the [`CryptoBackend`] handle that carries them into
//! the signing pipeline.

pub mod backend;
pub mod digest;
pub mod sign;

pub use backend::{default_backend, CryptoBackend, RustCrypto};
pub use digest::{DigestAlgorithm, DigestMethod};
pub use sign::{SignatureMethod, SigningKey, VerifyingKey};
