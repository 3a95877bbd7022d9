#![forbid(unsafe_code)]

//! X.509 certificate wrapper exposing what a XAdES signer embeds: the DER
//! bytes, issuer name, decimal serial number and public key.

use der::{Decode, Encode};
use num_bigint_dig::BigUint;
use sellado_core::Error;
use sellado_crypto::VerifyingKey;

/// A parsed certificate that keeps its original DER encoding.
#[derive(Clone)]
pub struct Certificate {
    der: Vec<u8>,
    parsed: x509_cert::Certificate,
}

impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject_name())
            .field("serial", &self.serial_decimal())
            .finish()
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Certificate {
    pub fn from_der(der: &[u8]) -> Result<Self, Error> {
        let parsed = x509_cert::Certificate::from_der(der)
            .map_err(|e| Error::Certificate(format!("failed to parse X.509 certificate: {e}")))?;
        Ok(Self {
            der: der.to_vec(),
            parsed,
        })
    }

    /// Parse every `CERTIFICATE` block of a PEM bundle, in file order.
    pub fn chain_from_pem(pem: &[u8]) -> Result<Vec<Self>, Error> {
        let certs = x509_cert::Certificate::load_pem_chain(pem)
            .map_err(|e| Error::Certificate(format!("failed to decode certificate PEM: {e}")))?;
        certs
            .into_iter()
            .map(|parsed| {
                let der = parsed
                    .to_der()
                    .map_err(|e| Error::Certificate(format!("failed to encode certificate: {e}")))?;
                Ok(Self { der, parsed })
            })
            .collect()
    }

    /// The DER encoding, exactly as loaded.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Issuer distinguished name in RFC 4514 form.
    pub fn issuer_name(&self) -> String {
        self.parsed.tbs_certificate.issuer.to_string()
    }

    pub fn subject_name(&self) -> String {
        self.parsed.tbs_certificate.subject.to_string()
    }

    /// Serial number as an unsigned decimal string.
    pub fn serial_decimal(&self) -> String {
        let bytes = self.parsed.tbs_certificate.serial_number.as_bytes();
        BigUint::from_bytes_be(bytes).to_string()
    }

    /// `notBefore` and `notAfter`, formatted as RFC 3339 UTC.
    pub fn validity(&self) -> (String, String) {
        let v = &self.parsed.tbs_certificate.validity;
        (
            v.not_before.to_date_time().to_string(),
            v.not_after.to_date_time().to_string(),
        )
    }

    pub fn public_key(&self) -> Result<VerifyingKey, Error> {
        let spki = self
            .parsed
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| Error::Certificate(format!("failed to encode SPKI: {e}")))?;
        VerifyingKey::from_spki_der(&spki)
    }

    /// True if `other` issued this certificate (name match only).
    pub fn is_issued_by(&self, other: &Certificate) -> bool {
        self.parsed.tbs_certificate.issuer == other.parsed.tbs_certificate.subject
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSA_CERT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data/keys/rsa-2048-cert.pem");
    const LEAF_CERT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data/keys/chain-leaf-cert.pem");
    const CA_CERT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data/keys/ca-cert.pem");

    fn load(path: &str) -> Certificate {
        let pem = std::fs::read(path).unwrap();
        Certificate::chain_from_pem(&pem).unwrap().remove(0)
    }

    #[test]
    fn test_issuer_and_serial() {
        let cert = load(RSA_CERT);
        assert_eq!(
            cert.issuer_name(),
            "CN=Firmante de Prueba,O=Sellado Pruebas,C=EC"
        );
        assert_eq!(cert.serial_decimal(), "2246800662264969608");
    }

    #[test]
    fn test_small_serial() {
        assert_eq!(load(LEAF_CERT).serial_decimal(), "77");
        assert_eq!(load(CA_CERT).serial_decimal(), "1");
    }

    #[test]
    fn test_public_key_is_rsa() {
        let key = load(RSA_CERT).public_key().unwrap();
        assert_eq!(key.algorithm_name(), "RSA");
        assert!(key.rsa_components().is_some());
    }

    #[test]
    fn test_issued_by() {
        let leaf = load(LEAF_CERT);
        let ca = load(CA_CERT);
        assert!(leaf.is_issued_by(&ca));
        assert!(!ca.is_issued_by(&leaf));
    }

    #[test]
    fn test_der_roundtrip_through_pem() {
        let cert = load(RSA_CERT);
        let again = Certificate::from_der(cert.der()).unwrap();
        assert_eq!(cert, again);
    }

    #[test]
    fn test_garbage_der() {
        let err = Certificate::from_der(b"\x30\x03abc").unwrap_err();
        assert_eq!(err.kind(), sellado_core::ErrorKind::Configuration);
    }
}
