#![forbid(unsafe_code)]

//! Assembly of `ds:SignedInfo`, `ds:KeyInfo` and the `ds:Signature` element.

use base64::Engine;
use sellado_c14n::C14nMode;
use sellado_core::ns;
use sellado_crypto::SignatureMethod;
use sellado_keys::KeyMaterial;
use sellado_xml::Element;

use crate::config::ChainInclusion;
use crate::reference::Reference;
use crate::{ds, B64};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedInfo {
    pub c14n: C14nMode,
    pub method: SignatureMethod,
    /// Document reference, element references, then SignedProperties.
    pub references: Vec<Reference>,
}

impl SignedInfo {
    pub fn to_element(&self) -> Element {
        let head = Element::new(ds(ns::node::SIGNED_INFO))
            .child(Element::new(ds(ns::node::CANONICALIZATION_METHOD)).attr(ns::attr::ALGORITHM, self.c14n.uri()))
            .child(Element::new(ds(ns::node::SIGNATURE_METHOD)).attr(ns::attr::ALGORITHM, self.method.uri()));
        self.references
            .iter()
            .fold(head, |acc, r| acc.child(r.to_element()))
    }
}

/// `ds:KeyInfo` carrying the signing certificate (optionally the whole
/// chain) and, for RSA keys, the public key value.
pub fn key_info(
    id: &str,
    key: &KeyMaterial,
    chain: ChainInclusion,
    include_key_value: bool,
) -> Element {
    let certs: Vec<&sellado_keys::Certificate> = match chain {
        ChainInclusion::LeafOnly => vec![key.signing_certificate()],
        ChainInclusion::FullChain => key.chain_from_signer().collect(),
    };
    let x509_data = certs.iter().fold(Element::new(ds(ns::node::X509_DATA)), |acc, c| {
        acc.child(Element::new(ds(ns::node::X509_CERTIFICATE)).text(B64.encode(c.der())))
    });

    let key_value = include_key_value
        .then(|| key.signing_key().verifying_key().rsa_components())
        .flatten()
        .map(|(modulus, exponent)| {
            Element::new(ds(ns::node::KEY_VALUE)).child(
                Element::new(ds(ns::node::RSA_KEY_VALUE))
                    .child(Element::new(ds(ns::node::RSA_MODULUS)).text(B64.encode(modulus)))
                    .child(Element::new(ds(ns::node::RSA_EXPONENT)).text(B64.encode(exponent))),
            )
        });

    Element::new(ds(ns::node::KEY_INFO))
        .attr(ns::attr::ID, id)
        .child(x509_data)
        .child_opt(key_value)
}

/// The pieces of one `ds:Signature`, in document order.
#[derive(Debug, Clone)]
pub struct SignatureParts {
    pub id: String,
    pub signed_info: SignedInfo,
    pub signature_value_id: String,
    /// Empty until the signature is computed.
    pub signature_value: Vec<u8>,
    pub key_info: Element,
    pub object: Element,
}

impl SignatureParts {
    pub fn to_element(&self) -> Element {
        let value = Element::new(ds(ns::node::SIGNATURE_VALUE)).attr(ns::attr::ID, self.signature_value_id.as_str());
        let value = if self.signature_value.is_empty() {
            value
        } else {
            value.text(B64.encode(&self.signature_value))
        };
        Element::new(ds(ns::node::SIGNATURE))
            .attr(format!("xmlns:{}", ns::DSIG_PREFIX), ns::DSIG)
            .attr(format!("xmlns:{}", ns::XADES_PREFIX), ns::XADES)
            .attr(ns::attr::ID, self.id.as_str())
            .child(self.signed_info.to_element())
            .child(value)
            .child(self.key_info.clone())
            .child(Element::new(ds(ns::node::OBJECT)).child(self.object.clone()))
    }

    pub fn to_xml(&self) -> String {
        self.to_element().to_xml()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sellado_keys::{CertSelection, Certificate};
    use sellado_crypto::DigestMethod;

    fn fixture(name: &str) -> Vec<u8> {
        let path = format!("{}/../../test-data/keys/{name}", env!("CARGO_MANIFEST_DIR"));
        std::fs::read(&path).unwrap()
    }

    fn chain_material() -> KeyMaterial {
        let key = sellado_keys::loader::signing_key_from_pem(&fixture("chain-leaf-key.pem"), None).unwrap();
        let mut chain = Certificate::chain_from_pem(&fixture("chain-leaf-cert.pem")).unwrap();
        chain.extend(Certificate::chain_from_pem(&fixture("ca-cert.pem")).unwrap());
        KeyMaterial::new(key, chain, CertSelection::First).unwrap()
    }

    #[test]
    fn test_key_info_leaf_only_with_key_value() {
        let km = chain_material();
        let xml = key_info("KeyInfo-1", &km, ChainInclusion::LeafOnly, true).to_xml();
        assert_eq!(xml.matches("<ds:X509Certificate>").count(), 1);
        assert!(xml.contains("<ds:RSAKeyValue><ds:Modulus>"));
        assert!(xml.contains("<ds:Exponent>AQAB</ds:Exponent>"));
    }

    #[test]
    fn test_key_info_full_chain() {
        let km = chain_material();
        let xml = key_info("KeyInfo-1", &km, ChainInclusion::FullChain, false).to_xml();
        assert_eq!(xml.matches("<ds:X509Certificate>").count(), 2);
        assert!(!xml.contains("KeyValue"));
        let leaf = B64.encode(km.signing_certificate().der());
        assert!(xml.starts_with(&format!(
            r#"<ds:KeyInfo Id="KeyInfo-1"><ds:X509Data><ds:X509Certificate>{leaf}<"#
        )));
    }

    #[test]
    fn test_signature_layout() {
        let km = chain_material();
        let parts = SignatureParts {
            id: "Signature-1".into(),
            signed_info: SignedInfo {
                c14n: C14nMode::Inclusive,
                method: SignatureMethod::RsaSha256,
                references: vec![Reference::signed_properties_placeholder(
                    "SignedProperties-1",
                    DigestMethod::Sha256,
                    C14nMode::Inclusive,
                )],
            },
            signature_value_id: "SignatureValue-1".into(),
            signature_value: Vec::new(),
            key_info: key_info("KeyInfo-1", &km, ChainInclusion::LeafOnly, false),
            object: Element::new("etsi:QualifyingProperties"),
        };
        let xml = parts.to_xml();
        let pos = |s: &str| xml.find(s).unwrap();
        assert!(pos("<ds:SignedInfo>") < pos("<ds:SignatureValue"));
        assert!(pos("<ds:SignatureValue") < pos("<ds:KeyInfo"));
        assert!(pos("<ds:KeyInfo") < pos("<ds:Object>"));
        assert!(xml.contains(r#"xmlns:etsi="http://uri.etsi.org/01903/v1.3.2#""#));
        assert!(xml.contains(r#"Type="http://uri.etsi.org/01903#SignedProperties""#));
    }
}
