#![forbid(unsafe_code)]

//! The signer's key material: private key, certificate chain and the
//! certificate that identifies the signer.

use sellado_core::Error;
use sellado_crypto::SigningKey;

use crate::certificate::Certificate;

/// Which certificate of the chain is the signing certificate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CertSelection {
    /// The first certificate of the chain (leaf-first order).
    #[default]
    First,
    /// The certificate whose public key matches the private key.
    MatchingKey,
    /// An explicit position in the chain.
    Index(usize),
}

/// Private key plus certificate chain, immutable once built.
///
/// Shareable across threads behind an `Arc`.
#[derive(Debug)]
pub struct KeyMaterial {
    signing_key: SigningKey,
    chain: Vec<Certificate>,
    signing_index: usize,
}

impl KeyMaterial {
    /// Bundle a key with its chain, selecting the signing certificate.
    ///
    /// Fails if the chain is empty, the index is out of range, or the
    /// selected certificate does not carry the private key's public half.
    pub fn new(
        signing_key: SigningKey,
        chain: Vec<Certificate>,
        selection: CertSelection,
    ) -> Result<Self, Error> {
        if chain.is_empty() {
            return Err(Error::Certificate(
                "no certificate accompanies the private key".into(),
            ));
        }
        let public = signing_key.verifying_key();

        let signing_index = match selection {
            CertSelection::First => 0,
            CertSelection::Index(i) if i < chain.len() => i,
            CertSelection::Index(i) => {
                return Err(Error::Certificate(format!(
                    "certificate index {i} out of range (chain has {})",
                    chain.len()
                )))
            }
            CertSelection::MatchingKey => chain
                .iter()
                .position(|c| c.public_key().ok().as_ref() == Some(&public))
                .ok_or_else(|| {
                    Error::Certificate("no certificate in the chain matches the private key".into())
                })?,
        };

        let cert = &chain[signing_index];
        if cert.public_key()? != public {
            return Err(Error::Certificate(format!(
                "certificate '{}' does not match the private key",
                cert.subject_name()
            )));
        }
        log::debug!(
            "signing certificate: {} (serial {}), chain length {}",
            cert.subject_name(),
            cert.serial_decimal(),
            chain.len()
        );

        Ok(Self {
            signing_key,
            chain,
            signing_index,
        })
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Full chain, in the order it was loaded.
    pub fn chain(&self) -> &[Certificate] {
        &self.chain
    }

    pub fn signing_certificate(&self) -> &Certificate {
        &self.chain[self.signing_index]
    }

    /// The signing certificate followed by the rest of the chain.
    pub fn chain_from_signer(&self) -> impl Iterator<Item = &Certificate> {
        std::iter::once(self.signing_certificate()).chain(
            self.chain
                .iter()
                .enumerate()
                .filter(move |(i, _)| *i != self.signing_index)
                .map(|(_, c)| c),
        )
    }
}
