#![forbid(unsafe_code)]

//! Private key decoding from PKCS#8 (plain or encrypted), PKCS#1 and SEC1.

use sellado_core::Error;
use sellado_crypto::SigningKey;

/// Decode a PKCS#8 DER `PrivateKeyInfo`, as extracted from PKCS#12 or PEM.
///
/// Tries RSA, then EC P-256, then P-384.
pub fn signing_key_from_pkcs8_der(der: &[u8]) -> Result<SigningKey, Error> {
    use pkcs8::DecodePrivateKey;

    if let Ok(pk) = rsa::RsaPrivateKey::from_pkcs8_der(der) {
        return Ok(SigningKey::Rsa(pk));
    }
    if let Ok(sk) = p256::ecdsa::SigningKey::from_pkcs8_der(der) {
        return Ok(SigningKey::EcP256(sk));
    }
    if let Ok(sk) = p384::ecdsa::SigningKey::from_pkcs8_der(der) {
        return Ok(SigningKey::EcP384(sk));
    }
    Err(Error::Key(
        "unable to parse PKCS#8 private key (tried RSA, P-256, P-384)".into(),
    ))
}

/// Decode a PEM private key, dispatching on the PEM label.
///
/// `password` is only consulted for `ENCRYPTED PRIVATE KEY`.
pub fn signing_key_from_pem(pem: &[u8], password: Option<&str>) -> Result<SigningKey, Error> {
    let (label, der_bytes) = pem_rfc7468::decode_vec(trim_ascii(pem))
        .map_err(|e| Error::Key(format!("failed to decode private key PEM: {e}")))?;

    match label {
        "PRIVATE KEY" => signing_key_from_pkcs8_der(&der_bytes),
        "ENCRYPTED PRIVATE KEY" => {
            let password = password.ok_or_else(|| {
                Error::Key("encrypted private key requires a password".into())
            })?;
            decrypt_pkcs8(&der_bytes, password)
        }
        "RSA PRIVATE KEY" => {
            use pkcs1::DecodeRsaPrivateKey;
            rsa::RsaPrivateKey::from_pkcs1_der(&der_bytes)
                .map(SigningKey::Rsa)
                .map_err(|e| Error::Key(format!("invalid PKCS#1 RSA key: {e}")))
        }
        "EC PRIVATE KEY" => {
            if let Ok(sk) = p256::SecretKey::from_sec1_der(&der_bytes) {
                return Ok(SigningKey::EcP256(sk.into()));
            }
            p384::SecretKey::from_sec1_der(&der_bytes)
                .map(|sk| SigningKey::EcP384(sk.into()))
                .map_err(|e| Error::Key(format!("invalid SEC1 EC key: {e}")))
        }
        other => Err(Error::Key(format!("unsupported PEM label: {other}"))),
    }
}

fn decrypt_pkcs8(der_bytes: &[u8], password: &str) -> Result<SigningKey, Error> {
    use pkcs8::der::Decode;

    let enc = pkcs8::EncryptedPrivateKeyInfo::from_der(der_bytes)
        .map_err(|e| Error::Key(format!("invalid encrypted PKCS#8: {e}")))?;
    let doc = enc
        .decrypt(password)
        .map_err(|_| Error::Key("failed to decrypt private key (wrong password?)".into()))?;
    signing_key_from_pkcs8_der(doc.as_bytes())
}

fn trim_ascii(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    let end = data
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &data[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> Vec<u8> {
        let path = format!("{}/../../test-data/keys/{name}", env!("CARGO_MANIFEST_DIR"));
        std::fs::read(&path).unwrap()
    }

    #[test]
    fn test_pkcs8_rsa() {
        let key = signing_key_from_pem(&fixture("rsa-2048-key.pem"), None).unwrap();
        assert_eq!(key.algorithm_name(), "RSA");
    }

    #[test]
    fn test_pkcs8_ec() {
        let key = signing_key_from_pem(&fixture("ec-p256-key.pem"), None).unwrap();
        assert_eq!(key.algorithm_name(), "EC P-256");
    }

    #[test]
    fn test_encrypted_pkcs8() {
        let plain = signing_key_from_pem(&fixture("rsa-2048-key.pem"), None).unwrap();
        let dec = signing_key_from_pem(&fixture("rsa-2048-key-enc.pem"), Some("secret123")).unwrap();
        assert_eq!(plain.verifying_key(), dec.verifying_key());
    }

    #[test]
    fn test_encrypted_pkcs8_wrong_password() {
        let err = signing_key_from_pem(&fixture("rsa-2048-key-enc.pem"), Some("nope")).unwrap_err();
        assert!(err.to_string().contains("wrong password"));
    }

    #[test]
    fn test_encrypted_pkcs8_without_password() {
        let err = signing_key_from_pem(&fixture("rsa-2048-key-enc.pem"), None).unwrap_err();
        assert!(err.to_string().contains("requires a password"));
    }

    #[test]
    fn test_certificate_is_not_a_key() {
        let err = signing_key_from_pem(&fixture("rsa-2048-cert.pem"), None).unwrap_err();
        assert!(err.to_string().contains("CERTIFICATE"));
    }

    #[test]
    fn test_trim_ascii() {
        assert_eq!(trim_ascii(b"\n  abc \r\n"), b"abc");
        assert_eq!(trim_ascii(b"   "), b"");
    }
}
