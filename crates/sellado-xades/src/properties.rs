#![forbid(unsafe_code)]

//! `etsi:QualifyingProperties` for a XAdES-BES signature.

use base64::Engine;
use chrono::{DateTime, FixedOffset, SecondsFormat};
use sellado_core::{ns, Error};
use sellado_crypto::{CryptoBackend, DigestMethod};
use sellado_keys::Certificate;
use sellado_xml::Element;

use crate::config::{DataObjectFormat, ProductionPlace, SignerConfig};
use crate::{ds, etsi, B64};

/// Identity of the signing certificate as written into `SigningCertificate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertIdentity {
    pub digest_method: DigestMethod,
    pub digest_value: Vec<u8>,
    /// RFC 4514 issuer name.
    pub issuer_name: String,
    /// Decimal serial number.
    pub serial_number: String,
}

impl CertIdentity {
    pub fn of(
        backend: &dyn CryptoBackend,
        cert: &Certificate,
        digest_method: DigestMethod,
    ) -> Result<Self, Error> {
        Ok(Self {
            digest_method,
            digest_value: backend.digest(digest_method, cert.der())?,
            issuer_name: cert.issuer_name(),
            serial_number: cert.serial_decimal(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifyingProperties {
    /// `"#" + Signature/@Id`.
    pub target: String,
    pub signed_properties_id: String,
    pub signing_time: DateTime<FixedOffset>,
    pub certificate: CertIdentity,
    pub production_place: Option<ProductionPlace>,
    pub signer_role: Option<String>,
    /// `DataObjectFormat` and the Id of the reference it describes.
    pub data_object_format: Option<(String, DataObjectFormat)>,
}

impl QualifyingProperties {
    pub fn new(
        config: &SignerConfig,
        signature_id: &str,
        signed_properties_id: &str,
        document_reference_id: &str,
        signing_time: DateTime<FixedOffset>,
        certificate: CertIdentity,
    ) -> Self {
        Self {
            target: format!("#{signature_id}"),
            signed_properties_id: signed_properties_id.to_owned(),
            signing_time,
            certificate,
            production_place: config
                .production_place
                .clone()
                .filter(|p| !p.is_empty()),
            signer_role: config.signer_role.clone(),
            data_object_format: Some((
                document_reference_id.to_owned(),
                config.data_object_format.clone(),
            )),
        }
    }

    pub fn signing_time_text(&self) -> String {
        format_signing_time(&self.signing_time)
    }

    pub fn to_element(&self) -> Element {
        let cert = &self.certificate;
        let signing_certificate = Element::new(etsi(ns::node::SIGNING_CERTIFICATE)).child(
            Element::new(etsi(ns::node::CERT))
                .child(
                    Element::new(etsi(ns::node::CERT_DIGEST))
                        .child(
                            Element::new(ds(ns::node::DIGEST_METHOD))
                                .attr(ns::attr::ALGORITHM, cert.digest_method.uri()),
                        )
                        .child(
                            Element::new(ds(ns::node::DIGEST_VALUE))
                                .text(B64.encode(&cert.digest_value)),
                        ),
                )
                .child(
                    Element::new(etsi(ns::node::ISSUER_SERIAL))
                        .child(Element::new(ds(ns::node::X509_ISSUER_NAME)).text(cert.issuer_name.as_str()))
                        .child(
                            Element::new(ds(ns::node::X509_SERIAL_NUMBER))
                                .text(cert.serial_number.as_str()),
                        ),
                ),
        );

        let signature_props = Element::new(etsi(ns::node::SIGNED_SIGNATURE_PROPERTIES))
            .child(Element::new(etsi(ns::node::SIGNING_TIME)).text(self.signing_time_text()))
            .child(signing_certificate)
            .child_opt(self.production_place.as_ref().map(production_place_element))
            .child_opt(self.signer_role.as_deref().map(|role| {
                Element::new(etsi(ns::node::SIGNER_ROLE)).child(
                    Element::new(etsi(ns::node::CLAIMED_ROLES))
                        .child(Element::new(etsi(ns::node::CLAIMED_ROLE)).text(role)),
                )
            }));

        let data_object_props = self.data_object_format.as_ref().map(|(reference_id, f)| {
            Element::new(etsi(ns::node::SIGNED_DATA_OBJECT_PROPERTIES)).child(
                Element::new(etsi(ns::node::DATA_OBJECT_FORMAT))
                    .attr(ns::attr::OBJECT_REFERENCE, format!("#{reference_id}"))
                    .child_opt(
                        f.description
                            .as_deref()
                            .map(|d| Element::new(etsi(ns::node::DESCRIPTION)).text(d)),
                    )
                    .child(Element::new(etsi(ns::node::MIME_TYPE)).text(f.mime_type.as_str())),
            )
        });

        Element::new(etsi(ns::node::QUALIFYING_PROPERTIES))
            .attr(ns::attr::TARGET, self.target.as_str())
            .child(
                Element::new(etsi(ns::node::SIGNED_PROPERTIES))
                    .attr(ns::attr::ID, self.signed_properties_id.as_str())
                    .child(signature_props)
                    .child_opt(data_object_props),
            )
    }
}

fn production_place_element(p: &ProductionPlace) -> Element {
    let field = |name: &str, value: &Option<String>| {
        value
            .as_deref()
            .map(|v| Element::new(etsi(name)).text(v))
    };
    Element::new(etsi(ns::node::SIGNATURE_PRODUCTION_PLACE))
        .child_opt(field(ns::node::CITY, &p.city))
        .child_opt(field(ns::node::STATE_OR_PROVINCE, &p.state_or_province))
        .child_opt(field(ns::node::POSTAL_CODE, &p.postal_code))
        .child_opt(field(ns::node::COUNTRY_NAME, &p.country_name))
}

/// ISO 8601 with offset and microseconds, e.g. `2024-05-01T10:00:00.000123-05:00`.
pub fn format_signing_time(t: &DateTime<FixedOffset>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, false)
}
