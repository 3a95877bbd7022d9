#![forbid(unsafe_code)]

//! Declarative signer configuration.

use sellado_c14n::C14nMode;
use sellado_core::Error;
use sellado_crypto::DigestMethod;

/// Which certificates go into `KeyInfo/X509Data`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChainInclusion {
    /// Only the signing certificate.
    #[default]
    LeafOnly,
    /// The signing certificate followed by the rest of the chain.
    FullChain,
}

/// `SignatureProductionPlace`; empty fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductionPlace {
    pub city: Option<String>,
    pub state_or_province: Option<String>,
    pub postal_code: Option<String>,
    pub country_name: Option<String>,
}

impl ProductionPlace {
    pub fn is_empty(&self) -> bool {
        self.city.is_none()
            && self.state_or_province.is_none()
            && self.postal_code.is_none()
            && self.country_name.is_none()
    }
}

/// `DataObjectFormat` describing the signed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataObjectFormat {
    pub description: Option<String>,
    pub mime_type: String,
}

impl Default for DataObjectFormat {
    fn default() -> Self {
        Self {
            description: None,
            mime_type: "text/xml".into(),
        }
    }
}

/// Everything that shapes a signature besides the key and the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerConfig {
    /// Hash for every digest and for the signature method.
    pub digest: DigestMethod,
    /// SignedInfo canonicalization; exclusive modes also add a C14N
    /// transform to each reference.
    pub c14n: C14nMode,
    pub chain: ChainInclusion,
    pub signer_role: Option<String>,
    pub production_place: Option<ProductionPlace>,
    pub data_object_format: DataObjectFormat,
    /// Ids of elements signed in addition to the whole document.
    pub references: Vec<String>,
    /// Attribute names treated as Ids besides `Id`, `ID` and `id`.
    pub id_attrs: Vec<String>,
    /// Emit `KeyValue/RSAKeyValue` next to the certificate for RSA keys.
    pub include_key_value: bool,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            digest: DigestMethod::Sha256,
            c14n: C14nMode::Inclusive,
            chain: ChainInclusion::LeafOnly,
            signer_role: None,
            production_place: None,
            data_object_format: DataObjectFormat::default(),
            references: Vec::new(),
            id_attrs: Vec::new(),
            include_key_value: true,
        }
    }
}

impl SignerConfig {
    /// Reject option combinations no signature could satisfy.
    pub fn validate(&self) -> Result<(), Error> {
        for id in &self.references {
            if id.is_empty() || id.starts_with('#') || id.chars().any(char::is_whitespace) {
                return Err(Error::Config(format!(
                    "invalid reference Id '{id}' (expected a bare Id value)"
                )));
            }
        }
        if let Some((i, id)) = self
            .references
            .iter()
            .enumerate()
            .find(|(i, id)| self.references[..*i].contains(id))
        {
            return Err(Error::Config(format!(
                "reference Id '{id}' listed twice (position {i})"
            )));
        }
        if self.data_object_format.mime_type.trim().is_empty() {
            return Err(Error::Config("DataObjectFormat MimeType is empty".into()));
        }
        if self.signer_role.as_deref().is_some_and(|r| r.trim().is_empty()) {
            return Err(Error::Config("signer role is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sellado_core::ErrorKind;

    #[test]
    fn test_defaults() {
        let c = SignerConfig::default();
        assert_eq!(c.digest, DigestMethod::Sha256);
        assert_eq!(c.c14n, C14nMode::Inclusive);
        assert_eq!(c.chain, ChainInclusion::LeafOnly);
        assert_eq!(c.data_object_format.mime_type, "text/xml");
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_rejects_hash_prefixed_reference() {
        let c = SignerConfig {
            references: vec!["#comprobante".into()],
            ..SignerConfig::default()
        };
        assert_eq!(c.validate().unwrap_err().kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_rejects_duplicate_reference() {
        let c = SignerConfig {
            references: vec!["a".into(), "b".into(), "a".into()],
            ..SignerConfig::default()
        };
        assert!(c.validate().unwrap_err().to_string().contains("'a'"));
    }

    #[test]
    fn test_production_place_empty() {
        assert!(ProductionPlace::default().is_empty());
        let p = ProductionPlace {
            city: Some("Quito".into()),
            ..ProductionPlace::default()
        };
        assert!(!p.is_empty());
    }
}
