#![forbid(unsafe_code)]

//! Signing key material for sellado.
//!
//! Loads a private key and its certificate chain from a PKCS#12 keystore
//! or a PEM key/certificate pair, and pins the signing certificate
//! according to a [`CertSelection`] policy.

pub mod certificate;
pub mod loader;
pub mod material;
pub mod provider;

pub use certificate::Certificate;
pub use material::{CertSelection, KeyMaterial};
pub use provider::{load_key_material, KeyMaterialProvider, PemProvider, Pkcs12Provider};
