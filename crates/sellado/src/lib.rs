#![forbid(unsafe_code)]

//! Sellado: XAdES-BES enveloped signatures for Ecuador's SRI.
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use sellado::keys::{load_key_material, CertSelection};
//! use sellado::xades::{SignerConfig, XadesSigner};
//!
//! # fn main() -> Result<(), sellado::core::Error> {
//! let key = load_key_material(Path::new("firma.p12"), "clave", None, CertSelection::First)?;
//! let signer = XadesSigner::new(Arc::new(key), SignerConfig::default())?;
//! signer.sign_file(Path::new("factura.xml"), Path::new("factura-firmada.xml"))?;
//! # Ok(())
//! # }
//! ```

pub mod config;

pub use sellado_c14n as c14n;
pub use sellado_core as core;
pub use sellado_crypto as crypto;
pub use sellado_keys as keys;
pub use sellado_pkcs12 as pkcs12;
pub use sellado_transforms as transforms;
pub use sellado_xades as xades;
pub use sellado_xml as xml;
