#![forbid(unsafe_code)]

//! PKCS#12 (.p12/.pfx) keystore decoding.
//!
//! Handles the encodings produced by current and older OpenSSL and by
//! the tooling certification authorities ship to taxpayers:
//! PBES2 (PBKDF2 + AES-CBC) and the legacy SHA-1 + 3DES PBE, with the
//! integrity MAC checked before anything is decrypted.

mod kdf;
mod parse;

/// One decoded bag: a PKCS#8 private key or an X.509 certificate, in DER.
#[derive(Debug, Clone)]
pub struct Pkcs12Entry {
    pub der: Vec<u8>,
    /// `localKeyId` attribute pairing a key with its certificate.
    pub local_key_id: Option<Vec<u8>>,
    pub friendly_name: Option<String>,
}

/// Contents extracted from a PKCS#12 file, in file order.
#[derive(Debug, Default)]
pub struct Pkcs12Contents {
    pub private_keys: Vec<Pkcs12Entry>,
    pub certificates: Vec<Pkcs12Entry>,
}

impl Pkcs12Contents {
    /// Certificates ordered for the private key at `key_index`: the ones
    /// sharing its `localKeyId` first, then the rest in file order.
    pub fn chain_for_key(&self, key_index: usize) -> Vec<&[u8]> {
        let key_id = self
            .private_keys
            .get(key_index)
            .and_then(|k| k.local_key_id.as_deref());
        let (mut paired, rest): (Vec<&Pkcs12Entry>, Vec<&Pkcs12Entry>) = self
            .certificates
            .iter()
            .partition(|c| key_id.is_some() && c.local_key_id.as_deref() == key_id);
        paired.extend(rest);
        paired.into_iter().map(|c| c.der.as_slice()).collect()
    }
}

/// Parse a PKCS#12 file, decrypting with the given password.
pub fn parse_pkcs12(data: &[u8], password: &str) -> Result<Pkcs12Contents, sellado_core::Error> {
    parse::parse_pfx(data, password)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(der: u8, id: Option<u8>) -> Pkcs12Entry {
        Pkcs12Entry {
            der: vec![der],
            local_key_id: id.map(|i| vec![i]),
            friendly_name: None,
        }
    }

    #[test]
    fn test_chain_for_key_puts_paired_cert_first() {
        let contents = Pkcs12Contents {
            private_keys: vec![entry(0, Some(7))],
            certificates: vec![entry(1, None), entry(2, Some(7)), entry(3, None)],
        };
        let chain: Vec<u8> = contents.chain_for_key(0).iter().map(|d| d[0]).collect();
        assert_eq!(chain, vec![2, 1, 3]);
    }

    #[test]
    fn test_chain_for_key_without_ids_keeps_file_order() {
        let contents = Pkcs12Contents {
            private_keys: vec![entry(0, None)],
            certificates: vec![entry(1, None), entry(2, None)],
        };
        let chain: Vec<u8> = contents.chain_for_key(0).iter().map(|d| d[0]).collect();
        assert_eq!(chain, vec![1, 2]);
    }
}
