#![forbid(unsafe_code)]

//! CLI configuration: an optional TOML file overridden by flags.
//!
//! ```toml
//! keystore = "firma.p12"
//! digest = "sha256"
//! c14n = "inclusive"
//! full-chain = false
//! signer-role = "Emisor"
//! references = ["comprobante"]
//!
//! [production-place]
//! city = "Quito"
//! country-name = "Ecuador"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use sellado_c14n::C14nMode;
use sellado_core::Error;
use sellado_crypto::DigestMethod;
use sellado_keys::CertSelection;
use sellado_xades::{ChainInclusion, DataObjectFormat, ProductionPlace, SignerConfig};

/// Contents of a `--config` file. Every field is optional.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    pub keystore: Option<PathBuf>,
    pub cert: Option<PathBuf>,
    pub cert_index: Option<usize>,
    pub match_key: Option<bool>,
    pub digest: Option<String>,
    pub c14n: Option<String>,
    pub full_chain: Option<bool>,
    pub key_value: Option<bool>,
    pub signer_role: Option<String>,
    pub references: Vec<String>,
    pub id_attrs: Vec<String>,
    pub production_place: Option<PlaceConfig>,
    pub data_object_format: Option<FormatConfig>,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct PlaceConfig {
    pub city: Option<String>,
    pub state_or_province: Option<String>,
    pub postal_code: Option<String>,
    pub country_name: Option<String>,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct FormatConfig {
    pub description: Option<String>,
    pub mime_type: Option<String>,
}

/// Values given on the command line; `Some`/non-empty wins over the file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub keystore: Option<PathBuf>,
    pub cert: Option<PathBuf>,
    pub cert_index: Option<usize>,
    pub match_key: bool,
    pub digest: Option<String>,
    pub c14n: Option<String>,
    pub full_chain: bool,
    pub no_key_value: bool,
    pub signer_role: Option<String>,
    pub city: Option<String>,
    pub state_or_province: Option<String>,
    pub postal_code: Option<String>,
    pub country_name: Option<String>,
    pub description: Option<String>,
    pub mime_type: Option<String>,
    pub references: Vec<String>,
    pub id_attrs: Vec<String>,
}

/// Where the key material comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySource {
    pub keystore: PathBuf,
    pub cert: Option<PathBuf>,
    pub selection: CertSelection,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::parse(&text).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    pub fn parse(text: &str) -> Result<Self, Error> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Merge with command-line values into the key source and signer
    /// configuration.
    pub fn resolve(self, cli: Overrides) -> Result<(KeySource, SignerConfig), Error> {
        let keystore = cli
            .keystore
            .or(self.keystore)
            .ok_or_else(|| Error::Config("no keystore given (--keystore or config file)".into()))?;
        let selection = match (cli.cert_index.or(self.cert_index), cli.match_key || self.match_key.unwrap_or(false)) {
            (Some(_), true) => {
                return Err(Error::Config(
                    "--cert-index and --match-key are mutually exclusive".into(),
                ))
            }
            (Some(i), false) => CertSelection::Index(i),
            (None, true) => CertSelection::MatchingKey,
            (None, false) => CertSelection::First,
        };
        let source = KeySource {
            keystore,
            cert: cli.cert.or(self.cert),
            selection,
        };

        let mut config = SignerConfig::default();
        if let Some(d) = cli.digest.or(self.digest) {
            config.digest = d
                .parse::<DigestMethod>()
                .map_err(|_| Error::Config(format!("unknown digest '{d}'")))?;
        }
        if let Some(c) = cli.c14n.or(self.c14n) {
            config.c14n = c
                .parse::<C14nMode>()
                .map_err(|_| Error::Config(format!("unknown canonicalization '{c}'")))?;
        }
        if cli.full_chain || self.full_chain.unwrap_or(false) {
            config.chain = ChainInclusion::FullChain;
        }
        config.include_key_value = !cli.no_key_value && self.key_value.unwrap_or(true);
        config.signer_role = cli.signer_role.or(self.signer_role);

        let file_place = self.production_place.unwrap_or_default();
        let place = ProductionPlace {
            city: cli.city.or(file_place.city),
            state_or_province: cli.state_or_province.or(file_place.state_or_province),
            postal_code: cli.postal_code.or(file_place.postal_code),
            country_name: cli.country_name.or(file_place.country_name),
        };
        config.production_place = (!place.is_empty()).then_some(place);

        let file_format = self.data_object_format.unwrap_or_default();
        let default_format = DataObjectFormat::default();
        config.data_object_format = DataObjectFormat {
            description: cli.description.or(file_format.description),
            mime_type: cli
                .mime_type
                .or(file_format.mime_type)
                .unwrap_or(default_format.mime_type),
        };

        config.references = if cli.references.is_empty() {
            self.references
        } else {
            cli.references
        };
        config.id_attrs = self.id_attrs;
        for attr in cli.id_attrs {
            if !config.id_attrs.contains(&attr) {
                config.id_attrs.push(attr);
            }
        }

        config.validate()?;
        Ok((source, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sellado_core::ErrorKind;

    const FILE: &str = r#"
keystore = "firma.p12"
digest = "sha1"
c14n = "exclusive"
full-chain = true
signer-role = "Emisor"
references = ["comprobante"]
id-attrs = ["codigo"]

[production-place]
city = "Quito"
country-name = "Ecuador"

[data-object-format]
description = "Factura"
"#;

    #[test]
    fn test_file_values_apply() {
        let (source, config) = FileConfig::parse(FILE)
            .unwrap()
            .resolve(Overrides::default())
            .unwrap();
        assert_eq!(source.keystore, PathBuf::from("firma.p12"));
        assert_eq!(source.selection, CertSelection::First);
        assert_eq!(config.digest, DigestMethod::Sha1);
        assert_eq!(config.c14n, C14nMode::Exclusive);
        assert_eq!(config.chain, ChainInclusion::FullChain);
        assert_eq!(config.signer_role.as_deref(), Some("Emisor"));
        assert_eq!(config.references, vec!["comprobante".to_owned()]);
        let place = config.production_place.unwrap();
        assert_eq!(place.city.as_deref(), Some("Quito"));
        assert_eq!(place.country_name.as_deref(), Some("Ecuador"));
        assert_eq!(config.data_object_format.description.as_deref(), Some("Factura"));
        assert_eq!(config.data_object_format.mime_type, "text/xml");
    }

    #[test]
    fn test_flags_override_file() {
        let cli = Overrides {
            keystore: Some("otra.p12".into()),
            digest: Some("sha512".into()),
            city: Some("Guayaquil".into()),
            references: vec!["a".into(), "b".into()],
            id_attrs: vec!["codigo".into(), "ref".into()],
            ..Overrides::default()
        };
        let (source, config) = FileConfig::parse(FILE).unwrap().resolve(cli).unwrap();
        assert_eq!(source.keystore, PathBuf::from("otra.p12"));
        assert_eq!(config.digest, DigestMethod::Sha512);
        let place = config.production_place.unwrap();
        assert_eq!(place.city.as_deref(), Some("Guayaquil"));
        assert_eq!(place.country_name.as_deref(), Some("Ecuador"));
        assert_eq!(config.references.len(), 2);
        assert_eq!(config.id_attrs, vec!["codigo".to_owned(), "ref".to_owned()]);
    }

    #[test]
    fn test_defaults_without_file() {
        let cli = Overrides {
            keystore: Some("firma.p12".into()),
            ..Overrides::default()
        };
        let (_, config) = FileConfig::default().resolve(cli).unwrap();
        assert_eq!(config, SignerConfig::default());
    }

    #[test]
    fn test_missing_keystore() {
        let err = FileConfig::default().resolve(Overrides::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_unknown_values_are_configuration_errors() {
        let bad_digest = Overrides {
            keystore: Some("k.p12".into()),
            digest: Some("md5".into()),
            ..Overrides::default()
        };
        let err = FileConfig::default().resolve(bad_digest).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("md5"));

        let err = FileConfig::parse("keystroe = \"typo.p12\"").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_cert_selection() {
        let both = Overrides {
            keystore: Some("k.p12".into()),
            cert_index: Some(1),
            match_key: true,
            ..Overrides::default()
        };
        assert!(FileConfig::default().resolve(both).is_err());

        let index = Overrides {
            keystore: Some("k.p12".into()),
            cert_index: Some(1),
            ..Overrides::default()
        };
        let (source, _) = FileConfig::default().resolve(index).unwrap();
        assert_eq!(source.selection, CertSelection::Index(1));
    }

    #[test]
    fn test_load_missing_file_is_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileConfig::load(&dir.path().join("sellado.toml")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("sellado.toml"));
    }
}
