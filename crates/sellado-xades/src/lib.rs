#![forbid(unsafe_code)]

//! XAdES-BES enveloped signatures for SRI electronic vouchers.
//!
//! [`XadesSigner`] turns an unsigned XML document into one carrying a
//! `ds:Signature` as the last child of its root element, with signed
//! qualifying properties (signing time, signing certificate and optional
//! production place, signer role and data object format). [`verify`]
//! checks such a signature back.

pub mod assemble;
pub mod compose;
pub mod config;
pub mod properties;
pub mod reference;
pub mod sign;
pub mod verify;

pub use config::{ChainInclusion, DataObjectFormat, ProductionPlace, SignerConfig};
pub use sign::{read_input, SignedDocument, SigningProgress, SigningState, XadesSigner};
pub use verify::{verify, verify_with_backend, VerifiedSignature, VerifyResult};

use sellado_core::ns;

pub(crate) const B64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// `ds:`-qualified element name.
pub(crate) fn ds(local: &str) -> String {
    format!("{}:{local}", ns::DSIG_PREFIX)
}

/// `etsi:`-qualified element name.
pub(crate) fn etsi(local: &str) -> String {
    format!("{}:{local}", ns::XADES_PREFIX)
}
