#![forbid(unsafe_code)]

//! Signature algorithm implementations (RSA PKCS#1 v1.5 and ECDSA).

use std::fmt;

use sellado_core::{algorithm, Error};
use signature::hazmat::{PrehashSigner, PrehashVerifier};
use signature::SignatureEncoding;

use crate::digest::DigestMethod;

/// A private key able to produce XML-DSig signature values.
#[derive(Clone)]
pub enum SigningKey {
    Rsa(rsa::RsaPrivateKey),
    EcP256(p256::ecdsa::SigningKey),
    EcP384(p384::ecdsa::SigningKey),
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey({})", self.algorithm_name())
    }
}

impl SigningKey {
    pub fn algorithm_name(&self) -> &'static str {
        match self {
            Self::Rsa(_) => "RSA",
            Self::EcP256(_) => "EC P-256",
            Self::EcP384(_) => "EC P-384",
        }
    }

    /// The matching public key.
    pub fn verifying_key(&self) -> VerifyingKey {
        match self {
            Self::Rsa(k) => VerifyingKey::Rsa(k.to_public_key()),
            Self::EcP256(k) => VerifyingKey::EcP256(*k.verifying_key()),
            Self::EcP384(k) => VerifyingKey::EcP384(*k.verifying_key()),
        }
    }
}

/// A public key able to check XML-DSig signature values.
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyingKey {
    Rsa(rsa::RsaPublicKey),
    EcP256(p256::ecdsa::VerifyingKey),
    EcP384(p384::ecdsa::VerifyingKey),
}

impl VerifyingKey {
    /// Decode a DER `SubjectPublicKeyInfo`, as found in certificates.
    pub fn from_spki_der(der: &[u8]) -> Result<Self, Error> {
        use pkcs8::DecodePublicKey;
        if let Ok(k) = rsa::RsaPublicKey::from_public_key_der(der) {
            return Ok(Self::Rsa(k));
        }
        if let Ok(k) = p256::ecdsa::VerifyingKey::from_public_key_der(der) {
            return Ok(Self::EcP256(k));
        }
        if let Ok(k) = p384::ecdsa::VerifyingKey::from_public_key_der(der) {
            return Ok(Self::EcP384(k));
        }
        Err(Error::Key(
            "unsupported public key (expected RSA, P-256 or P-384)".into(),
        ))
    }

    pub fn algorithm_name(&self) -> &'static str {
        match self {
            Self::Rsa(_) => "RSA",
            Self::EcP256(_) => "EC P-256",
            Self::EcP384(_) => "EC P-384",
        }
    }

    /// Big-endian modulus and public exponent of an RSA key.
    pub fn rsa_components(&self) -> Option<(Vec<u8>, Vec<u8>)> {
        use rsa::traits::PublicKeyParts;
        match self {
            Self::Rsa(k) => Some((k.n().to_bytes_be(), k.e().to_bytes_be())),
            _ => None,
        }
    }
}

/// The signature algorithms a signature may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureMethod {
    RsaSha1,
    RsaSha256,
    RsaSha384,
    RsaSha512,
    EcdsaSha1,
    EcdsaSha256,
    EcdsaSha384,
    EcdsaSha512,
}

impl SignatureMethod {
    pub fn uri(&self) -> &'static str {
        match self {
            Self::RsaSha1 => algorithm::RSA_SHA1,
            Self::RsaSha256 => algorithm::RSA_SHA256,
            Self::RsaSha384 => algorithm::RSA_SHA384,
            Self::RsaSha512 => algorithm::RSA_SHA512,
            Self::EcdsaSha1 => algorithm::ECDSA_SHA1,
            Self::EcdsaSha256 => algorithm::ECDSA_SHA256,
            Self::EcdsaSha384 => algorithm::ECDSA_SHA384,
            Self::EcdsaSha512 => algorithm::ECDSA_SHA512,
        }
    }

    /// Create a signature method from its URI.
    pub fn from_uri(uri: &str) -> Result<Self, Error> {
        match uri {
            algorithm::RSA_SHA1 => Ok(Self::RsaSha1),
            algorithm::RSA_SHA256 => Ok(Self::RsaSha256),
            algorithm::RSA_SHA384 => Ok(Self::RsaSha384),
            algorithm::RSA_SHA512 => Ok(Self::RsaSha512),
            algorithm::ECDSA_SHA1 => Ok(Self::EcdsaSha1),
            algorithm::ECDSA_SHA256 => Ok(Self::EcdsaSha256),
            algorithm::ECDSA_SHA384 => Ok(Self::EcdsaSha384),
            algorithm::ECDSA_SHA512 => Ok(Self::EcdsaSha512),
            _ => Err(Error::UnsupportedAlgorithm(format!("signature algorithm: {uri}"))),
        }
    }

    /// The method for `key` whose hash is `digest`, so that references and
    /// signature value share one hash family.
    pub fn for_key(key: &SigningKey, digest: DigestMethod) -> Self {
        let rsa = matches!(key, SigningKey::Rsa(_));
        match (rsa, digest) {
            (true, DigestMethod::Sha1) => Self::RsaSha1,
            (true, DigestMethod::Sha256) => Self::RsaSha256,
            (true, DigestMethod::Sha384) => Self::RsaSha384,
            (true, DigestMethod::Sha512) => Self::RsaSha512,
            (false, DigestMethod::Sha1) => Self::EcdsaSha1,
            (false, DigestMethod::Sha256) => Self::EcdsaSha256,
            (false, DigestMethod::Sha384) => Self::EcdsaSha384,
            (false, DigestMethod::Sha512) => Self::EcdsaSha512,
        }
    }

    /// The hash this method signs with.
    pub fn digest(&self) -> DigestMethod {
        match self {
            Self::RsaSha1 | Self::EcdsaSha1 => DigestMethod::Sha1,
            Self::RsaSha256 | Self::EcdsaSha256 => DigestMethod::Sha256,
            Self::RsaSha384 | Self::EcdsaSha384 => DigestMethod::Sha384,
            Self::RsaSha512 | Self::EcdsaSha512 => DigestMethod::Sha512,
        }
    }

    pub fn is_rsa(&self) -> bool {
        matches!(
            self,
            Self::RsaSha1 | Self::RsaSha256 | Self::RsaSha384 | Self::RsaSha512
        )
    }
}

/// Sign `data` with `key`.
///
/// ECDSA values are returned in the XML-DSig `r || s` form.
pub fn sign(method: SignatureMethod, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, Error> {
    match (key, method.is_rsa()) {
        (SigningKey::Rsa(k), true) => rsa_sign(method.digest(), k, data),
        (SigningKey::EcP256(k), false) => {
            let hash = method.digest().digest(data);
            let sig = PrehashSigner::<p256::ecdsa::Signature>::sign_prehash(k, &hash)
                .map_err(|e| Error::Crypto(format!("ECDSA P-256 signing failed: {e}")))?;
            Ok(sig.to_bytes().to_vec())
        }
        (SigningKey::EcP384(k), false) => {
            let hash = method.digest().digest(data);
            let sig = PrehashSigner::<p384::ecdsa::Signature>::sign_prehash(k, &hash)
                .map_err(|e| Error::Crypto(format!("ECDSA P-384 signing failed: {e}")))?;
            Ok(sig.to_bytes().to_vec())
        }
        _ => Err(Error::Crypto(format!(
            "{} key cannot be used with {}",
            key.algorithm_name(),
            method.uri()
        ))),
    }
}

/// Check `sig_bytes` over `data`. A malformed signature value is reported
/// as `Ok(false)`; a key/method mismatch is an error.
pub fn verify(
    method: SignatureMethod,
    key: &VerifyingKey,
    data: &[u8],
    sig_bytes: &[u8],
) -> Result<bool, Error> {
    match (key, method.is_rsa()) {
        (VerifyingKey::Rsa(k), true) => rsa_verify(method.digest(), k, data, sig_bytes),
        (VerifyingKey::EcP256(k), false) => {
            let Ok(sig) = p256::ecdsa::Signature::from_slice(sig_bytes) else {
                return Ok(false);
            };
            let hash = method.digest().digest(data);
            Ok(k.verify_prehash(&hash, &sig).is_ok())
        }
        (VerifyingKey::EcP384(k), false) => {
            let Ok(sig) = p384::ecdsa::Signature::from_slice(sig_bytes) else {
                return Ok(false);
            };
            let hash = method.digest().digest(data);
            Ok(k.verify_prehash(&hash, &sig).is_ok())
        }
        _ => Err(Error::Crypto(format!(
            "{} key cannot be used with {}",
            key.algorithm_name(),
            method.uri()
        ))),
    }
}

// ── RSA PKCS#1 v1.5 ─────────────────────────────────────────────────

fn rsa_sign(hash: DigestMethod, key: &rsa::RsaPrivateKey, data: &[u8]) -> Result<Vec<u8>, Error> {
    use signature::Signer;
    macro_rules! do_sign {
        ($hasher:ty) => {{
            let sk = rsa::pkcs1v15::SigningKey::<$hasher>::new(key.clone());
            sk.try_sign(data)
                .map(|s| s.to_vec())
                .map_err(|e| Error::Crypto(format!("RSA signing failed: {e}")))
        }};
    }
    match hash {
        DigestMethod::Sha1 => do_sign!(sha1::Sha1),
        DigestMethod::Sha256 => do_sign!(sha2::Sha256),
        DigestMethod::Sha384 => do_sign!(sha2::Sha384),
        DigestMethod::Sha512 => do_sign!(sha2::Sha512),
    }
}

fn rsa_verify(
    hash: DigestMethod,
    key: &rsa::RsaPublicKey,
    data: &[u8],
    sig_bytes: &[u8],
) -> Result<bool, Error> {
    use signature::Verifier;
    let Ok(sig) = rsa::pkcs1v15::Signature::try_from(sig_bytes) else {
        return Ok(false);
    };
    macro_rules! do_verify {
        ($hasher:ty) => {{
            let vk = rsa::pkcs1v15::VerifyingKey::<$hasher>::new(key.clone());
            Ok(vk.verify(data, &sig).is_ok())
        }};
    }
    match hash {
        DigestMethod::Sha1 => do_verify!(sha1::Sha1),
        DigestMethod::Sha256 => do_verify!(sha2::Sha256),
        DigestMethod::Sha384 => do_verify!(sha2::Sha384),
        DigestMethod::Sha512 => do_verify!(sha2::Sha512),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rsa_key() -> SigningKey {
        let mut rng = rand::thread_rng();
        SigningKey::Rsa(rsa::RsaPrivateKey::new(&mut rng, 1024).unwrap())
    }

    fn p256_key() -> SigningKey {
        SigningKey::EcP256(p256::ecdsa::SigningKey::random(&mut rand::thread_rng()))
    }

    #[test]
    fn test_rsa_sign_verify() {
        let key = rsa_key();
        let vk = key.verifying_key();
        for d in [DigestMethod::Sha1, DigestMethod::Sha256, DigestMethod::Sha512] {
            let m = SignatureMethod::for_key(&key, d);
            let sig = sign(m, &key, b"<SignedInfo/>").unwrap();
            assert_eq!(sig.len(), 128);
            assert!(verify(m, &vk, b"<SignedInfo/>", &sig).unwrap());
            assert!(!verify(m, &vk, b"<SignedInfo />", &sig).unwrap());
        }
    }

    #[test]
    fn test_ecdsa_raw_signature_length() {
        let key = p256_key();
        let m = SignatureMethod::for_key(&key, DigestMethod::Sha256);
        assert_eq!(m, SignatureMethod::EcdsaSha256);
        let sig = sign(m, &key, b"data").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(verify(m, &key.verifying_key(), b"data", &sig).unwrap());
        assert!(!verify(m, &key.verifying_key(), b"data", &sig[..63]).unwrap());
    }

    #[test]
    fn test_key_method_mismatch() {
        let key = p256_key();
        let err = sign(SignatureMethod::RsaSha256, &key, b"x").unwrap_err();
        assert_eq!(err.kind(), sellado_core::ErrorKind::Cryptographic);
    }

    #[test]
    fn test_uris() {
        assert_eq!(
            SignatureMethod::RsaSha256.uri(),
            "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256"
        );
        assert_eq!(
            SignatureMethod::from_uri(algorithm::RSA_SHA1).unwrap(),
            SignatureMethod::RsaSha1
        );
        assert!(SignatureMethod::from_uri("urn:dsa").is_err());
        assert_eq!(SignatureMethod::EcdsaSha384.digest(), DigestMethod::Sha384);
    }

    #[test]
    fn test_debug_hides_key() {
        let key = p256_key();
        assert_eq!(format!("{key:?}"), "SigningKey(EC P-256)");
    }
}
