#![forbid(unsafe_code)]

//! Key material providers: where the private key and its chain come from.

use std::path::{Path, PathBuf};

use sellado_core::Error;
use sellado_crypto::SigningKey;

use crate::certificate::Certificate;
use crate::loader;
use crate::material::{CertSelection, KeyMaterial};

/// Loads a private key and its certificate chain (leaf first) from a path.
pub trait KeyMaterialProvider {
    fn load_private_key(
        &self,
        path: &Path,
        password: &str,
    ) -> Result<(SigningKey, Vec<Certificate>), Error>;
}

/// PKCS#12 keystores (`.p12` / `.pfx`), as issued by certification authorities.
#[derive(Debug, Default, Clone, Copy)]
pub struct Pkcs12Provider;

impl KeyMaterialProvider for Pkcs12Provider {
    fn load_private_key(
        &self,
        path: &Path,
        password: &str,
    ) -> Result<(SigningKey, Vec<Certificate>), Error> {
        let data = read_keystore(path)?;
        let contents =
            sellado_pkcs12::parse_pkcs12(&data, password).map_err(|e| keystore(path, e))?;

        let first = contents.private_keys.first().ok_or_else(|| Error::KeyStore {
            path: path.to_path_buf(),
            reason: "contains no private key".into(),
        })?;
        if contents.private_keys.len() > 1 {
            log::warn!(
                "{}: {} private keys present, using the first",
                path.display(),
                contents.private_keys.len()
            );
        }
        let key = loader::signing_key_from_pkcs8_der(&first.der).map_err(|e| keystore(path, e))?;
        let chain = contents
            .chain_for_key(0)
            .into_iter()
            .map(Certificate::from_der)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| keystore(path, e))?;
        Ok((key, chain))
    }
}

/// A PEM private key (`path`) with a PEM certificate bundle beside it.
#[derive(Debug, Clone)]
pub struct PemProvider {
    pub cert_path: PathBuf,
}

impl KeyMaterialProvider for PemProvider {
    fn load_private_key(
        &self,
        path: &Path,
        password: &str,
    ) -> Result<(SigningKey, Vec<Certificate>), Error> {
        let key_pem = read_keystore(path)?;
        let password = (!password.is_empty()).then_some(password);
        let key = loader::signing_key_from_pem(&key_pem, password).map_err(|e| keystore(path, e))?;

        let cert_pem = read_keystore(&self.cert_path)?;
        let chain = Certificate::chain_from_pem(&cert_pem).map_err(|e| keystore(&self.cert_path, e))?;
        Ok((key, chain))
    }
}

/// Key material that cannot be read is a configuration problem, not an
/// input/output one: the operator pointed at the wrong file.
fn read_keystore(path: &Path) -> Result<Vec<u8>, Error> {
    std::fs::read(path).map_err(|e| Error::KeyStore {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn keystore(path: &Path, err: Error) -> Error {
    Error::KeyStore {
        path: path.to_path_buf(),
        reason: match err {
            Error::Key(m) | Error::Certificate(m) => m,
            other => other.to_string(),
        },
    }
}

/// Load key material, picking the provider from the file extension:
/// `.p12`/`.pfx` are PKCS#12, anything else is a PEM key that needs `cert`.
pub fn load_key_material(
    path: &Path,
    password: &str,
    cert: Option<&Path>,
    selection: CertSelection,
) -> Result<KeyMaterial, Error> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let (key, chain) = if ext.eq_ignore_ascii_case("p12") || ext.eq_ignore_ascii_case("pfx") {
        Pkcs12Provider.load_private_key(path, password)?
    } else {
        let cert_path = cert.ok_or_else(|| {
            Error::Config(format!(
                "{}: a PEM private key needs a certificate file",
                path.display()
            ))
        })?;
        PemProvider {
            cert_path: cert_path.to_path_buf(),
        }
        .load_private_key(path, password)?
    };
    log::debug!("loaded {} key from {}", key.algorithm_name(), path.display());
    KeyMaterial::new(key, chain, selection)
}
