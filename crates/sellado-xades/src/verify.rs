#![forbid(unsafe_code)]

//! Verification of XAdES-BES enveloped signatures produced by this crate.
//!
//! Processing order:
//! 1. Locate the `ds:Signature` child of the root and read SignedInfo
//! 2. Recompute and compare every reference digest
//! 3. Check the SignedProperties binding (reference Type, Target)
//! 4. Check SigningCertificate against the first `ds:X509Certificate`
//! 5. Verify SignatureValue over the canonical SignedInfo

use base64::Engine;
use roxmltree::{Document, Node};
use sellado_c14n::C14nMode;
use sellado_core::{algorithm, ns, Error};
use sellado_crypto::{default_backend, CryptoBackend, DigestMethod, SignatureMethod};
use sellado_keys::Certificate;
use sellado_transforms::{uri, C14nTransform, EnvelopedSignatureTransform, TransformPipeline};
use sellado_xml::document::is_element_named;
use sellado_xml::IdMap;

use crate::B64;

/// What a valid signature attests to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSignature {
    pub signature_id: String,
    pub signing_time: String,
    pub signer: String,
    pub references: usize,
}

/// Result of signature verification.
#[derive(Debug)]
pub enum VerifyResult {
    Valid(VerifiedSignature),
    Invalid { reason: String },
}

impl VerifyResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyResult::Valid(_))
    }

    fn invalid(reason: impl Into<String>) -> Self {
        VerifyResult::Invalid {
            reason: reason.into(),
        }
    }
}

/// Verify the enveloped signature of `xml` on the default backend.
///
/// Malformed documents and missing signature parts are errors; a
/// well-formed signature that does not check out is `Invalid`.
pub fn verify(xml: &str, id_attrs: &[String]) -> Result<VerifyResult, Error> {
    verify_with_backend(xml, id_attrs, default_backend().as_ref())
}

pub fn verify_with_backend(
    xml: &str,
    id_attrs: &[String],
    backend: &dyn CryptoBackend,
) -> Result<VerifyResult, Error> {
    let xml = xml.strip_prefix('\u{feff}').unwrap_or(xml);
    let doc = sellado_xml::parse(xml)?;
    let ids = IdMap::build(&doc, id_attrs)?;

    let signature = doc
        .root_element()
        .children()
        .find(|n| is_element_named(*n, ns::DSIG, ns::node::SIGNATURE))
        .ok_or_else(|| Error::MissingElement("Signature".into()))?;
    let signature_id = signature.attribute(ns::attr::ID).unwrap_or_default();
    let signed_info = required_child(signature, ns::DSIG, ns::node::SIGNED_INFO)?;

    let c14n_method = required_child(signed_info, ns::DSIG, ns::node::CANONICALIZATION_METHOD)?;
    let c14n_uri = required_attr(c14n_method, ns::attr::ALGORITHM)?;
    let c14n = C14nMode::from_uri(c14n_uri)
        .ok_or_else(|| Error::UnsupportedAlgorithm(format!("C14N: {c14n_uri}")))?;
    let method = SignatureMethod::from_uri(required_attr(
        required_child(signed_info, ns::DSIG, ns::node::SIGNATURE_METHOD)?,
        ns::attr::ALGORITHM,
    )?)?;

    let references: Vec<Node<'_, '_>> = signed_info
        .children()
        .filter(|n| is_element_named(*n, ns::DSIG, ns::node::REFERENCE))
        .collect();
    for reference in &references {
        if let Some(reason) = check_reference(*reference, &doc, &ids, signature, backend)? {
            return Ok(VerifyResult::invalid(reason));
        }
    }

    let qualifying = signature
        .descendants()
        .find(|n| is_element_named(*n, ns::XADES, ns::node::QUALIFYING_PROPERTIES))
        .ok_or_else(|| Error::MissingElement("QualifyingProperties".into()))?;
    if qualifying.attribute(ns::attr::TARGET) != Some(format!("#{signature_id}").as_str()) {
        return Ok(VerifyResult::invalid(
            "QualifyingProperties Target does not point at the signature",
        ));
    }
    let signed_properties = required_child(qualifying, ns::XADES, ns::node::SIGNED_PROPERTIES)?;
    let sp_uri = format!("#{}", required_attr(signed_properties, ns::attr::ID)?);
    let bound = references.iter().any(|r| {
        r.attribute(ns::attr::URI) == Some(sp_uri.as_str())
            && r.attribute(ns::attr::TYPE) == Some(algorithm::SIGNED_PROPERTIES_TYPE)
    });
    if !bound {
        return Ok(VerifyResult::invalid(
            "no SignedProperties reference in SignedInfo",
        ));
    }

    let key_info = required_child(signature, ns::DSIG, ns::node::KEY_INFO)?;
    let cert_text = key_info
        .descendants()
        .find(|n| is_element_named(*n, ns::DSIG, ns::node::X509_CERTIFICATE))
        .and_then(|n| n.text())
        .ok_or_else(|| Error::MissingElement("X509Certificate".into()))?;
    let certificate = Certificate::from_der(&decode_b64(cert_text)?)?;
    if let Some(reason) = check_signing_certificate(signed_properties, &certificate, backend)? {
        return Ok(VerifyResult::invalid(reason));
    }

    let signature_value = decode_b64(
        required_child(signature, ns::DSIG, ns::node::SIGNATURE_VALUE)?
            .text()
            .unwrap_or_default(),
    )?;
    let canonical = sellado_c14n::canonicalize_subtree(signed_info, c14n, &prefix_list(c14n_method))?;
    let public_key = certificate.public_key()?;
    if !backend.verify(method, &public_key, &canonical, &signature_value)? {
        return Ok(VerifyResult::invalid("SignatureValue does not verify"));
    }

    let signing_time = signed_properties
        .descendants()
        .find(|n| is_element_named(*n, ns::XADES, ns::node::SIGNING_TIME))
        .and_then(|n| n.text())
        .unwrap_or_default();
    log::debug!("signature {signature_id} verified ({} references)", references.len());
    Ok(VerifyResult::Valid(VerifiedSignature {
        signature_id: signature_id.to_owned(),
        signing_time: signing_time.to_owned(),
        signer: certificate.subject_name(),
        references: references.len(),
    }))
}

/// Recompute one reference digest. `Some(reason)` on mismatch.
fn check_reference(
    reference: Node<'_, '_>,
    doc: &Document<'_>,
    ids: &IdMap,
    signature: Node<'_, '_>,
    backend: &dyn CryptoBackend,
) -> Result<Option<String>, Error> {
    let uri_value = reference.attribute(ns::attr::URI).unwrap_or_default();

    let mut pipeline = TransformPipeline::new();
    if let Some(transforms) = child(reference, ns::DSIG, ns::node::TRANSFORMS) {
        for t in transforms
            .children()
            .filter(|n| is_element_named(*n, ns::DSIG, ns::node::TRANSFORM))
        {
            let alg = required_attr(t, ns::attr::ALGORITHM)?;
            if alg == algorithm::ENVELOPED_SIGNATURE {
                pipeline.push(Box::new(EnvelopedSignatureTransform::for_signature(signature.id())));
            } else if let Some(mode) = C14nMode::from_uri(alg) {
                pipeline.push(Box::new(C14nTransform::new(mode, prefix_list(t))));
            } else {
                return Err(Error::UnsupportedAlgorithm(format!("transform: {alg}")));
            }
        }
    }

    let digest_method = DigestMethod::from_uri(required_attr(
        required_child(reference, ns::DSIG, ns::node::DIGEST_METHOD)?,
        ns::attr::ALGORITHM,
    )?)?;
    let expected = decode_b64(
        required_child(reference, ns::DSIG, ns::node::DIGEST_VALUE)?
            .text()
            .unwrap_or_default(),
    )?;

    let octets = pipeline.execute(uri::resolve(uri_value, doc, ids)?)?;
    let actual = backend.digest(digest_method, &octets)?;
    log::trace!("reference URI=\"{uri_value}\": {} octets", octets.len());
    Ok((actual != expected).then(|| format!("digest mismatch for reference URI=\"{uri_value}\"")))
}

/// Compare CertDigest and IssuerSerial with the embedded certificate.
fn check_signing_certificate(
    signed_properties: Node<'_, '_>,
    certificate: &Certificate,
    backend: &dyn CryptoBackend,
) -> Result<Option<String>, Error> {
    let cert = signed_properties
        .descendants()
        .find(|n| is_element_named(*n, ns::XADES, ns::node::CERT))
        .ok_or_else(|| Error::MissingElement("SigningCertificate/Cert".into()))?;
    let cert_digest = required_child(cert, ns::XADES, ns::node::CERT_DIGEST)?;
    let method = DigestMethod::from_uri(required_attr(
        required_child(cert_digest, ns::DSIG, ns::node::DIGEST_METHOD)?,
        ns::attr::ALGORITHM,
    )?)?;
    let expected = decode_b64(
        required_child(cert_digest, ns::DSIG, ns::node::DIGEST_VALUE)?
            .text()
            .unwrap_or_default(),
    )?;
    if backend.digest(method, certificate.der())? != expected {
        return Ok(Some("CertDigest does not match the signing certificate".into()));
    }

    let serial = required_child(cert, ns::XADES, ns::node::ISSUER_SERIAL)?
        .children()
        .find(|n| is_element_named(*n, ns::DSIG, ns::node::X509_SERIAL_NUMBER))
        .and_then(|n| n.text())
        .unwrap_or_default();
    if serial.trim() != certificate.serial_decimal() {
        return Ok(Some("IssuerSerial does not match the signing certificate".into()));
    }
    Ok(None)
}

fn child<'a, 'input>(node: Node<'a, 'input>, ns: &str, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| is_element_named(*n, ns, name))
}

fn required_child<'a, 'input>(
    node: Node<'a, 'input>,
    ns: &str,
    name: &str,
) -> Result<Node<'a, 'input>, Error> {
    child(node, ns, name).ok_or_else(|| Error::MissingElement(name.to_owned()))
}

fn required_attr<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str, Error> {
    node.attribute(name).ok_or_else(|| {
        Error::MissingAttribute(format!("{name} on {}", node.tag_name().name()))
    })
}

fn prefix_list(node: Node<'_, '_>) -> Vec<String> {
    child(node, ns::EXC_C14N, ns::node::INCLUSIVE_NAMESPACES)
        .and_then(|n| n.attribute(ns::attr::PREFIX_LIST))
        .map(|list| list.split_whitespace().map(str::to_owned).collect())
        .unwrap_or_default()
}

fn decode_b64(text: &str) -> Result<Vec<u8>, Error> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    B64.decode(compact)
        .map_err(|e| Error::Base64(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sellado_core::ErrorKind;

    #[test]
    fn test_unsigned_document_is_an_error() {
        let err = verify("<Invoice/>", &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.to_string().contains("Signature"));
    }

    #[test]
    fn test_external_reference_is_rejected() {
        let xml = concat!(
            r#"<r><ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#" Id="s">"#,
            r#"<ds:SignedInfo>"#,
            r#"<ds:CanonicalizationMethod Algorithm="http://www.w3.org/TR/2001/REC-xml-c14n-20010315"/>"#,
            r#"<ds:SignatureMethod Algorithm="http://www.w3.org/2001/04/xmldsig-more#rsa-sha256"/>"#,
            r#"<ds:Reference URI="http://example.com/x">"#,
            r#"<ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/>"#,
            r#"<ds:DigestValue>AAAA</ds:DigestValue></ds:Reference>"#,
            r#"</ds:SignedInfo></ds:Signature></r>"#
        );
        let err = verify(xml, &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidUri(_)));
    }

    #[test]
    fn test_unknown_transform_is_unsupported() {
        let xml = concat!(
            r#"<r><ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#" Id="s">"#,
            r#"<ds:SignedInfo>"#,
            r#"<ds:CanonicalizationMethod Algorithm="http://www.w3.org/TR/2001/REC-xml-c14n-20010315"/>"#,
            r#"<ds:SignatureMethod Algorithm="http://www.w3.org/2001/04/xmldsig-more#rsa-sha256"/>"#,
            r#"<ds:Reference URI=""><ds:Transforms>"#,
            r#"<ds:Transform Algorithm="http://www.w3.org/TR/1999/REC-xslt-19991116"/>"#,
            r#"</ds:Transforms><ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/>"#,
            r#"<ds:DigestValue>AAAA</ds:DigestValue></ds:Reference>"#,
            r#"</ds:SignedInfo></ds:Signature></r>"#
        );
        let err = verify(xml, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cryptographic);
    }

    #[test]
    fn test_decode_b64_ignores_line_breaks() {
        assert_eq!(decode_b64("QUJD\nREVG\r\n").unwrap(), b"ABCDEF");
        assert!(decode_b64("not base64!").is_err());
    }
}
