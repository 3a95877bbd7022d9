#![forbid(unsafe_code)]

//! BER parsing of PKCS#12 (PFX) structures (RFC 7292).
//!
//! PKCS#12 files are BER, not strict DER, so everything goes through
//! `yasna::parse_ber`.

use sellado_core::Error;
use yasna::models::ObjectIdentifier;
use yasna::{ASN1Error, ASN1ErrorKind, BERReader, Tag};

use crate::kdf::{self, Pbkdf2Prf, Pkcs12Hash};
use crate::{Pkcs12Contents, Pkcs12Entry};

// ── OID constants ──────────────────────────────────────────────────────────

const OID_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 1];
const OID_ENCRYPTED_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 6];

const OID_KEY_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 1];
const OID_SHROUDED_KEY_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 2];
const OID_CERT_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 3];
const OID_X509_CERTIFICATE: &[u64] = &[1, 2, 840, 113549, 1, 9, 22, 1];

const OID_FRIENDLY_NAME: &[u64] = &[1, 2, 840, 113549, 1, 9, 20];
const OID_LOCAL_KEY_ID: &[u64] = &[1, 2, 840, 113549, 1, 9, 21];

const OID_PBE_SHA1_3DES: &[u64] = &[1, 2, 840, 113549, 1, 12, 1, 3];
const OID_PBE_SHA1_RC2_40: &[u64] = &[1, 2, 840, 113549, 1, 12, 1, 6];
const OID_PBES2: &[u64] = &[1, 2, 840, 113549, 1, 5, 13];
const OID_PBKDF2: &[u64] = &[1, 2, 840, 113549, 1, 5, 12];

const OID_AES_128_CBC: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 1, 2];
const OID_AES_192_CBC: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 1, 22];
const OID_AES_256_CBC: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 1, 42];

const OID_SHA1: &[u64] = &[1, 3, 14, 3, 2, 26];
const OID_SHA256: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 2, 1];
const OID_HMAC_SHA1: &[u64] = &[1, 2, 840, 113549, 2, 7];
const OID_HMAC_SHA256: &[u64] = &[1, 2, 840, 113549, 2, 9];

fn oid(components: &[u64]) -> ObjectIdentifier {
    ObjectIdentifier::from_slice(components)
}

fn invalid() -> ASN1Error {
    ASN1Error::new(ASN1ErrorKind::Invalid)
}

// ── Parsed structures ──────────────────────────────────────────────────────

#[derive(Debug)]
enum EncryptionScheme {
    PbeSha1And3Des {
        salt: Vec<u8>,
        iterations: u32,
    },
    Pbes2 {
        salt: Vec<u8>,
        iterations: u32,
        prf: Pbkdf2Prf,
        key_len: usize,
        iv: Vec<u8>,
    },
    /// Recognised but not implemented (e.g. RC2-40 from old Java keytool).
    Unsupported(&'static str),
}

struct MacData {
    hash: Pkcs12Hash,
    digest: Vec<u8>,
    salt: Vec<u8>,
    iterations: u32,
}

enum AuthSafeItem {
    Plain(Vec<u8>),
    Encrypted {
        scheme: EncryptionScheme,
        ciphertext: Vec<u8>,
    },
}

enum BagValue {
    Key(Vec<u8>),
    ShroudedKey {
        scheme: EncryptionScheme,
        ciphertext: Vec<u8>,
    },
    Cert(Vec<u8>),
    Other,
}

#[derive(Default)]
struct BagAttributes {
    local_key_id: Option<Vec<u8>>,
    friendly_name: Option<String>,
}

enum BagAttribute {
    LocalKeyId(Vec<u8>),
    FriendlyName(String),
    Other,
}

// ── Top-level parser ───────────────────────────────────────────────────────

pub fn parse_pfx(data: &[u8], password: &str) -> Result<Pkcs12Contents, Error> {
    let (auth_safe, mac) = yasna::parse_ber(data, |r| {
        r.read_sequence(|r| {
            if r.next().read_u32()? != 3 {
                return Err(invalid());
            }
            let auth_safe = parse_data_content_info(r.next())?;
            let mac = r.read_optional(parse_mac_data)?;
            Ok((auth_safe, mac))
        })
    })
    .map_err(|e| Error::Key(format!("malformed PKCS#12 file: {e}")))?;

    match mac {
        Some(mac) => verify_mac(&mac, &auth_safe, password)?,
        None => log::warn!("PKCS#12 file has no MAC; integrity not checked"),
    }

    let items = yasna::parse_ber(&auth_safe, |r| r.collect_sequence_of(parse_auth_safe_item))
        .map_err(|e| Error::Key(format!("malformed PKCS#12 authSafe: {e}")))?;

    let bmp_password = kdf::password_to_bmp(password);
    let mut contents = Pkcs12Contents::default();

    for item in items {
        let bags_der = match item {
            AuthSafeItem::Plain(d) => d,
            AuthSafeItem::Encrypted { scheme, ciphertext } => {
                decrypt(&scheme, &ciphertext, password, &bmp_password)?
            }
        };
        let bags = yasna::parse_ber(&bags_der, |r| r.collect_sequence_of(parse_safe_bag))
            .map_err(|e| Error::Key(format!("malformed PKCS#12 SafeContents: {e}")))?;

        for (value, attrs) in bags {
            let entry = |der: Vec<u8>| Pkcs12Entry {
                der,
                local_key_id: attrs.local_key_id.clone(),
                friendly_name: attrs.friendly_name.clone(),
            };
            match value {
                BagValue::Key(der) => contents.private_keys.push(entry(der)),
                BagValue::ShroudedKey { scheme, ciphertext } => {
                    let der = decrypt(&scheme, &ciphertext, password, &bmp_password)?;
                    contents.private_keys.push(entry(der));
                }
                BagValue::Cert(der) => contents.certificates.push(entry(der)),
                BagValue::Other => {}
            }
        }
    }

    log::debug!(
        "PKCS#12: {} private key(s), {} certificate(s)",
        contents.private_keys.len(),
        contents.certificates.len()
    );
    Ok(contents)
}

// ── ContentInfo parsing ────────────────────────────────────────────────────

/// ContentInfo of type `data`: returns the OCTET STRING payload.
fn parse_data_content_info(r: BERReader) -> Result<Vec<u8>, ASN1Error> {
    r.read_sequence(|r| {
        if r.next().read_oid()? != oid(OID_DATA) {
            return Err(invalid());
        }
        r.next().read_tagged(Tag::context(0), |r| r.read_bytes())
    })
}

fn parse_auth_safe_item(r: BERReader) -> Result<AuthSafeItem, ASN1Error> {
    r.read_sequence(|r| {
        let content_type = r.next().read_oid()?;
        if content_type == oid(OID_DATA) {
            let d = r.next().read_tagged(Tag::context(0), |r| r.read_bytes())?;
            return Ok(AuthSafeItem::Plain(d));
        }
        if content_type != oid(OID_ENCRYPTED_DATA) {
            return Err(invalid());
        }
        r.next().read_tagged(Tag::context(0), |r| {
            r.read_sequence(|r| {
                let _version = r.next().read_u32()?;
                r.next().read_sequence(|r| {
                    let _content_type = r.next().read_oid()?;
                    let scheme = parse_encryption_scheme(r.next())?;
                    let ciphertext = r
                        .next()
                        .read_tagged_implicit(Tag::context(0), |r| r.read_bytes())?;
                    Ok(AuthSafeItem::Encrypted { scheme, ciphertext })
                })
            })
        })
    })
}

// ── SafeBag parsing ────────────────────────────────────────────────────────

fn parse_safe_bag(r: BERReader) -> Result<(BagValue, BagAttributes), ASN1Error> {
    r.read_sequence(|r| {
        let bag_type = r.next().read_oid()?;
        let value = r.next().read_tagged(Tag::context(0), |r| {
            if bag_type == oid(OID_KEY_BAG) {
                r.read_der().map(BagValue::Key)
            } else if bag_type == oid(OID_SHROUDED_KEY_BAG) {
                r.read_sequence(|r| {
                    let scheme = parse_encryption_scheme(r.next())?;
                    let ciphertext = r.next().read_bytes()?;
                    Ok(BagValue::ShroudedKey { scheme, ciphertext })
                })
            } else if bag_type == oid(OID_CERT_BAG) {
                r.read_sequence(|r| {
                    let cert_type = r.next().read_oid()?;
                    let der = r.next().read_tagged(Tag::context(0), |r| r.read_bytes())?;
                    if cert_type == oid(OID_X509_CERTIFICATE) {
                        Ok(BagValue::Cert(der))
                    } else {
                        Ok(BagValue::Other)
                    }
                })
            } else {
                r.read_der().map(|_| BagValue::Other)
            }
        })?;

        let mut attrs = BagAttributes::default();
        if let Some(list) = r.read_optional(|r| r.collect_set_of(parse_attribute))? {
            for a in list {
                match a {
                    BagAttribute::LocalKeyId(id) => attrs.local_key_id = Some(id),
                    BagAttribute::FriendlyName(n) => attrs.friendly_name = Some(n),
                    BagAttribute::Other => {}
                }
            }
        }
        Ok((value, attrs))
    })
}

fn parse_attribute(r: BERReader) -> Result<BagAttribute, ASN1Error> {
    r.read_sequence(|r| {
        let attr_type = r.next().read_oid()?;
        if attr_type == oid(OID_LOCAL_KEY_ID) {
            let values = r.next().collect_set_of(|r| r.read_bytes())?;
            Ok(values
                .into_iter()
                .next()
                .map_or(BagAttribute::Other, BagAttribute::LocalKeyId))
        } else if attr_type == oid(OID_FRIENDLY_NAME) {
            let values = r.next().collect_set_of(|r| r.read_bmp_string())?;
            Ok(values
                .into_iter()
                .next()
                .map_or(BagAttribute::Other, BagAttribute::FriendlyName))
        } else {
            r.next().read_set_of(|r| r.read_der().map(|_| ()))?;
            Ok(BagAttribute::Other)
        }
    })
}

// ── AlgorithmIdentifier parsing ────────────────────────────────────────────

fn parse_encryption_scheme(r: BERReader) -> Result<EncryptionScheme, ASN1Error> {
    r.read_sequence(|r| {
        let alg = r.next().read_oid()?;
        if alg == oid(OID_PBE_SHA1_3DES) {
            r.next().read_sequence(|r| {
                let salt = r.next().read_bytes()?;
                let iterations = r.next().read_u32()?;
                Ok(EncryptionScheme::PbeSha1And3Des { salt, iterations })
            })
        } else if alg == oid(OID_PBE_SHA1_RC2_40) {
            r.next().read_der()?;
            Ok(EncryptionScheme::Unsupported("pbeWithSHAAnd40BitRC2-CBC"))
        } else if alg == oid(OID_PBES2) {
            r.next().read_sequence(|r| {
                let (salt, iterations, prf) = r.next().read_sequence(|r| {
                    if r.next().read_oid()? != oid(OID_PBKDF2) {
                        return Err(invalid());
                    }
                    r.next().read_sequence(|r| {
                        let salt = r.next().read_bytes()?;
                        let iterations = r.next().read_u32()?;
                        let _key_length = r.read_optional(|r| r.read_u32())?;
                        let prf = r
                            .read_optional(parse_prf)?
                            .unwrap_or(Pbkdf2Prf::HmacSha1);
                        Ok((salt, iterations, prf))
                    })
                })?;
                let (key_len, iv) = r.next().read_sequence(|r| {
                    let cipher = r.next().read_oid()?;
                    let key_len = if cipher == oid(OID_AES_128_CBC) {
                        16
                    } else if cipher == oid(OID_AES_192_CBC) {
                        24
                    } else if cipher == oid(OID_AES_256_CBC) {
                        32
                    } else {
                        return Err(invalid());
                    };
                    Ok((key_len, r.next().read_bytes()?))
                })?;
                Ok(EncryptionScheme::Pbes2 {
                    salt,
                    iterations,
                    prf,
                    key_len,
                    iv,
                })
            })
        } else {
            Err(invalid())
        }
    })
}

fn parse_prf(r: BERReader) -> Result<Pbkdf2Prf, ASN1Error> {
    r.read_sequence(|r| {
        let prf = r.next().read_oid()?;
        let _params = r.read_optional(|r| r.read_null())?;
        if prf == oid(OID_HMAC_SHA256) {
            Ok(Pbkdf2Prf::HmacSha256)
        } else if prf == oid(OID_HMAC_SHA1) {
            Ok(Pbkdf2Prf::HmacSha1)
        } else {
            Err(invalid())
        }
    })
}

// ── MAC verification ───────────────────────────────────────────────────────

fn parse_mac_data(r: BERReader) -> Result<MacData, ASN1Error> {
    r.read_sequence(|r| {
        let (hash, digest) = r.next().read_sequence(|r| {
            let hash = r.next().read_sequence(|r| {
                let h = r.next().read_oid()?;
                let _params = r.read_optional(|r| r.read_null())?;
                if h == oid(OID_SHA256) {
                    Ok(Pkcs12Hash::Sha256)
                } else if h == oid(OID_SHA1) {
                    Ok(Pkcs12Hash::Sha1)
                } else {
                    Err(invalid())
                }
            })?;
            Ok((hash, r.next().read_bytes()?))
        })?;
        let salt = r.next().read_bytes()?;
        let iterations = r.read_optional(|r| r.read_u32())?.unwrap_or(1);
        Ok(MacData {
            hash,
            digest,
            salt,
            iterations,
        })
    })
}

fn verify_mac(mac: &MacData, auth_safe: &[u8], password: &str) -> Result<(), Error> {
    let bmp = kdf::password_to_bmp(password);
    let key = kdf::pkcs12_kdf(
        mac.hash,
        kdf::ID_MAC,
        &bmp,
        &mac.salt,
        mac.iterations,
        mac.hash.output_len(),
    );
    let computed = kdf::hmac(mac.hash, &key, auth_safe)?;
    if computed != mac.digest {
        return Err(Error::Key("MAC verification failed (wrong password?)".into()));
    }
    Ok(())
}

// ── Decryption dispatch ────────────────────────────────────────────────────

fn decrypt(
    scheme: &EncryptionScheme,
    ciphertext: &[u8],
    password: &str,
    bmp_password: &[u8],
) -> Result<Vec<u8>, Error> {
    match scheme {
        EncryptionScheme::PbeSha1And3Des { salt, iterations } => {
            kdf::decrypt_pbe_sha1_3des(ciphertext, bmp_password, salt, *iterations)
        }
        EncryptionScheme::Pbes2 {
            salt,
            iterations,
            prf,
            key_len,
            iv,
        } => kdf::decrypt_pbes2_aes_cbc(ciphertext, password, *prf, salt, *iterations, *key_len, iv),
        EncryptionScheme::Unsupported(name) => Err(Error::UnsupportedAlgorithm(format!(
            "PKCS#12 encryption scheme {name}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> Vec<u8> {
        let path = format!("{}/../../test-data/keys/{name}", env!("CARGO_MANIFEST_DIR"));
        std::fs::read(&path).unwrap_or_else(|e| panic!("{path}: {e}"))
    }

    #[test]
    fn test_parse_pbes2_aes256() {
        let contents = parse_pfx(&fixture("rsa-2048.p12"), "secret123").unwrap();
        assert_eq!(contents.private_keys.len(), 1);
        assert_eq!(contents.certificates.len(), 1);
        // PKCS#8 PrivateKeyInfo is a SEQUENCE.
        assert_eq!(contents.private_keys[0].der[0], 0x30);
        assert!(contents.private_keys[0].local_key_id.is_some());
    }

    #[test]
    fn test_parse_legacy_3des() {
        let modern = parse_pfx(&fixture("rsa-2048.p12"), "secret123").unwrap();
        let legacy = parse_pfx(&fixture("rsa-2048-3des.p12"), "secret123").unwrap();
        assert_eq!(legacy.private_keys.len(), 1);
        assert_eq!(legacy.private_keys[0].der, modern.private_keys[0].der);
        assert_eq!(legacy.certificates[0].der, modern.certificates[0].der);
    }

    #[test]
    fn test_parse_chain() {
        let contents = parse_pfx(&fixture("chain.p12"), "secret123").unwrap();
        assert_eq!(contents.private_keys.len(), 1);
        assert_eq!(contents.certificates.len(), 2);
    }

    #[test]
    fn test_wrong_password_fails_mac() {
        let err = parse_pfx(&fixture("rsa-2048.p12"), "wrong_password").unwrap_err();
        assert!(err.to_string().contains("MAC verification failed"));
        assert_eq!(err.kind(), sellado_core::ErrorKind::Configuration);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let err = parse_pfx(b"not a keystore", "x").unwrap_err();
        assert!(err.to_string().contains("malformed PKCS#12"));
    }
}
