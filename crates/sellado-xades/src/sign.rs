#![forbid(unsafe_code)]

//! XAdES-BES enveloped signature creation.
//!
//! Pipeline per call: capture the signing time, parse the input, digest
//! the document references, build the qualifying properties, digest
//! SignedProperties and canonicalize SignedInfo inside the composed
//! document, sign, and splice the finished signature into the input.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use sellado_core::{ns, Error, ErrorKind};
use sellado_crypto::{default_backend, CryptoBackend, SignatureMethod};
use sellado_keys::KeyMaterial;
use sellado_xml::{IdMap, XmlDocument};

use crate::assemble::{self, SignatureParts, SignedInfo};
use crate::compose::{self, Splice};
use crate::config::SignerConfig;
use crate::properties::{CertIdentity, QualifyingProperties};
use crate::reference::{Reference, ReferenceBuilder};

/// Read an XML document from disk. An unreadable file is an I/O error;
/// bytes that are not UTF-8 are a format error.
pub fn read_input(path: &Path) -> Result<String, Error> {
    let bytes = std::fs::read(path).map_err(|e| Error::file(path, e))?;
    String::from_utf8(bytes)
        .map_err(|e| Error::XmlParse(format!("{}: invalid UTF-8: {e}", path.display())))
}

/// Where a signing operation stands. `Written` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningState {
    Idle,
    KeyLoaded,
    DocumentParsed,
    ReferencesComputed,
    PropertiesBuilt,
    SignedInfoAssembled,
    Signed,
    Written,
    Failed(ErrorKind),
}

/// Tracks and logs the state of one signing operation.
#[derive(Debug)]
pub struct SigningProgress {
    state: SigningState,
}

impl Default for SigningProgress {
    fn default() -> Self {
        Self {
            state: SigningState::Idle,
        }
    }
}

impl SigningProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SigningState {
        self.state
    }

    fn advance(&mut self, next: SigningState) {
        log::debug!("signing: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn fail(&mut self, err: Error) -> Error {
        self.advance(SigningState::Failed(err.kind()));
        err
    }
}

/// A signed document, ready to be written.
#[derive(Debug, Clone)]
pub struct SignedDocument {
    xml: String,
    signature_id: String,
    signing_time: String,
}

impl SignedDocument {
    pub fn as_str(&self) -> &str {
        &self.xml
    }

    pub fn into_string(self) -> String {
        self.xml
    }

    pub fn signature_id(&self) -> &str {
        &self.signature_id
    }

    pub fn signing_time(&self) -> &str {
        &self.signing_time
    }

    /// Write atomically to `path`.
    pub fn write_to(&self, path: &Path) -> Result<(), Error> {
        compose::write_atomic(path, self.xml.as_bytes())
    }
}

/// Produces XAdES-BES enveloped signatures with one key and configuration.
///
/// Immutable once built; share it behind an `Arc` to sign from several
/// threads at once.
pub struct XadesSigner {
    key: Arc<KeyMaterial>,
    config: SignerConfig,
    backend: Arc<dyn CryptoBackend>,
}

impl std::fmt::Debug for XadesSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XadesSigner")
            .field("key", &self.key.signing_key())
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl XadesSigner {
    /// A signer on the default RustCrypto backend.
    pub fn new(key: Arc<KeyMaterial>, config: SignerConfig) -> Result<Self, Error> {
        Self::with_backend(key, config, default_backend())
    }

    pub fn with_backend(
        key: Arc<KeyMaterial>,
        config: SignerConfig,
        backend: Arc<dyn CryptoBackend>,
    ) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            key,
            config,
            backend,
        })
    }

    pub fn config(&self) -> &SignerConfig {
        &self.config
    }

    pub fn key_material(&self) -> &KeyMaterial {
        &self.key
    }

    /// Sign an XML document held in memory.
    pub fn sign_str(&self, xml: &str) -> Result<SignedDocument, Error> {
        self.sign_tracked(xml, &mut SigningProgress::new())
    }

    /// Sign `input` and write the result atomically to `output`.
    pub fn sign_file(&self, input: &Path, output: &Path) -> Result<SignedDocument, Error> {
        let mut progress = SigningProgress::new();
        let xml = read_input(input).map_err(|e| progress.fail(e))?;
        let signed = self.sign_tracked(&xml, &mut progress)?;
        signed.write_to(output).map_err(|e| progress.fail(e))?;
        progress.advance(SigningState::Written);
        Ok(signed)
    }

    /// Sign, reporting each state transition through `progress`.
    pub fn sign_tracked(
        &self,
        xml: &str,
        progress: &mut SigningProgress,
    ) -> Result<SignedDocument, Error> {
        let signing_time = chrono::Local::now().fixed_offset();
        progress.advance(SigningState::KeyLoaded);
        self.run(xml, signing_time, progress)
            .map_err(|e| progress.fail(e))
    }

    fn run(
        &self,
        xml: &str,
        signing_time: DateTime<FixedOffset>,
        progress: &mut SigningProgress,
    ) -> Result<SignedDocument, Error> {
        let config = &self.config;

        let mut input = XmlDocument::parse(xml.to_owned())?;
        for name in &config.id_attrs {
            input.add_id_attr(name);
        }
        let doc = input.parse_doc()?;
        let ids = input.build_id_map(&doc)?;
        let splice = Splice::locate(&doc, input.text())?;
        if doc
            .root_element()
            .children()
            .any(|n| sellado_xml::document::is_element_named(n, ns::DSIG, ns::node::SIGNATURE))
        {
            log::warn!("input already carries a ds:Signature; adding another one");
        }
        progress.advance(SigningState::DocumentParsed);

        let mut alloc = IdAllocator::new(&ids);
        let signature_id = alloc.next("Signature");
        let signed_properties_id = alloc.next("SignedProperties");
        let reference_id = alloc.next("Reference");
        let signature_value_id = alloc.next("SignatureValue");
        let key_info_id = alloc.next("KeyInfo");

        let builder = ReferenceBuilder::new(self.backend.as_ref(), config.digest, config.c14n);
        let mut references = vec![builder.document(&doc, &ids, Some(reference_id.clone()))?];
        for element_id in &config.references {
            references.push(builder.element(&doc, &ids, element_id)?);
        }
        progress.advance(SigningState::ReferencesComputed);

        let cert = CertIdentity::of(
            self.backend.as_ref(),
            self.key.signing_certificate(),
            config.digest,
        )?;
        let properties = QualifyingProperties::new(
            config,
            &signature_id,
            &signed_properties_id,
            &reference_id,
            signing_time,
            cert,
        );
        progress.advance(SigningState::PropertiesBuilt);

        let method = SignatureMethod::for_key(self.key.signing_key(), config.digest);
        references.push(Reference::signed_properties_placeholder(
            &signed_properties_id,
            config.digest,
            config.c14n,
        ));
        let mut parts = SignatureParts {
            id: signature_id.clone(),
            signed_info: SignedInfo {
                c14n: config.c14n,
                method,
                references,
            },
            signature_value_id,
            signature_value: Vec::new(),
            key_info: assemble::key_info(
                &key_info_id,
                &self.key,
                config.chain,
                config.include_key_value,
            ),
            object: properties.to_element(),
        };

        // SignedProperties is digested where it will finally live, so the
        // namespaces it inherits are the ones a verifier sees.
        let skeleton = splice.apply(input.text(), &parts.to_xml());
        let sp_reference = {
            let doc = sellado_xml::parse(&skeleton)?;
            let ids = IdMap::build(&doc, input.extra_id_attrs())?;
            builder.signed_properties(&doc, &ids, &signed_properties_id)?
        };
        if let Some(last) = parts.signed_info.references.last_mut() {
            *last = sp_reference;
        }
        progress.advance(SigningState::SignedInfoAssembled);

        let with_digests = splice.apply(input.text(), &parts.to_xml());
        let canonical_signed_info = {
            let doc = sellado_xml::parse(&with_digests)?;
            let signed_info = find_signed_info(&doc, &signature_id)?;
            sellado_c14n::canonicalize_subtree(signed_info, config.c14n, &[])?
        };
        log::trace!("canonical SignedInfo: {} bytes", canonical_signed_info.len());

        parts.signature_value =
            self.backend
                .sign(method, self.key.signing_key(), &canonical_signed_info)?;
        progress.advance(SigningState::Signed);

        let xml = splice.apply(input.text(), &parts.to_xml());
        log::debug!(
            "signature {signature_id} created with {} ({} references)",
            method.uri(),
            parts.signed_info.references.len()
        );
        Ok(SignedDocument {
            xml,
            signature_id,
            signing_time: properties.signing_time_text(),
        })
    }
}

fn find_signed_info<'a, 'input>(
    doc: &'a roxmltree::Document<'input>,
    signature_id: &str,
) -> Result<roxmltree::Node<'a, 'input>, Error> {
    doc.descendants()
        .find(|n| {
            sellado_xml::document::is_element_named(*n, ns::DSIG, ns::node::SIGNATURE)
                && n.attribute(ns::attr::ID) == Some(signature_id)
        })
        .and_then(|sig| {
            sig.children()
                .find(|n| sellado_xml::document::is_element_named(*n, ns::DSIG, ns::node::SIGNED_INFO))
        })
        .ok_or_else(|| Error::MissingElement(format!("SignedInfo of {signature_id}")))
}

/// Random `Prefix-<hex>` identifiers unused by the input document.
struct IdAllocator<'a> {
    existing: &'a IdMap,
    issued: HashSet<String>,
}

impl<'a> IdAllocator<'a> {
    fn new(existing: &'a IdMap) -> Self {
        Self {
            existing,
            issued: HashSet::new(),
        }
    }

    fn next(&mut self, prefix: &str) -> String {
        loop {
            let id = format!("{prefix}-{:016x}", rand::random::<u64>());
            if !self.existing.contains(&id) && self.issued.insert(id.clone()) {
                return id;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use sellado_c14n::C14nMode;
    use sellado_crypto::DigestMethod;
    use sellado_keys::CertSelection;

    use crate::config::{ChainInclusion, ProductionPlace};
    use crate::verify::{verify, VerifyResult};
    use crate::B64;

    const INVOICE: &str = "<Invoice><Total>100</Total></Invoice>";

    fn keys(dir: &str) -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../test-data/keys").join(dir)
    }

    fn rsa_material() -> Arc<KeyMaterial> {
        Arc::new(
            sellado_keys::load_key_material(&keys("rsa-2048.p12"), "secret123", None, CertSelection::First)
                .unwrap(),
        )
    }

    fn signer(config: SignerConfig) -> XadesSigner {
        XadesSigner::new(rsa_material(), config).unwrap()
    }

    fn assert_valid(xml: &str) {
        match verify(xml, &[]).unwrap() {
            VerifyResult::Valid(_) => {}
            VerifyResult::Invalid { reason } => panic!("signature invalid: {reason}\n{xml}"),
        }
    }

    #[test]
    fn test_invoice_scenario() {
        let signed = signer(SignerConfig::default()).sign_str(INVOICE).unwrap();
        let xml = signed.as_str();
        let doc = sellado_xml::parse(xml).unwrap();
        let root = doc.root_element();

        let sigs: Vec<_> = root
            .children()
            .filter(|n| n.tag_name().name() == "Signature")
            .collect();
        assert_eq!(sigs.len(), 1);
        let sig = sigs[0];
        assert_eq!(root.last_element_child().map(|n| n.id()), Some(sig.id()));
        assert_eq!(sig.attribute("Id"), Some(signed.signature_id()));

        let refs: Vec<_> = sig
            .descendants()
            .filter(|n| n.tag_name().name() == "Reference")
            .collect();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].attribute("URI"), Some(""));

        let qp = sig
            .descendants()
            .find(|n| n.tag_name().name() == "QualifyingProperties")
            .unwrap();
        assert_eq!(qp.attribute("Target"), Some(format!("#{}", signed.signature_id()).as_str()));

        let sp = qp.first_element_child().unwrap();
        assert_eq!(
            refs[1].attribute("URI"),
            Some(format!("#{}", sp.attribute("Id").unwrap()).as_str())
        );
        assert_eq!(
            refs[1].attribute("Type"),
            Some("http://uri.etsi.org/01903#SignedProperties")
        );

        let cert_digest = sp
            .descendants()
            .find(|n| n.tag_name().name() == "CertDigest")
            .and_then(|n| n.descendants().find(|d| d.tag_name().name() == "DigestValue"))
            .and_then(|n| n.text())
            .unwrap();
        assert_eq!(cert_digest, "aNMuOv/hSoam/blILFQfwlJghzpNLuLqXwHGAWwrnyY=");

        assert!(xml.starts_with("<Invoice><Total>100</Total><ds:Signature "));
        assert_valid(xml);
    }

    #[test]
    fn test_document_digest_matches_recomputation() {
        let signed = signer(SignerConfig::default()).sign_str(INVOICE).unwrap();
        let doc = sellado_xml::parse(signed.as_str()).unwrap();
        let stored = doc
            .descendants()
            .find(|n| n.tag_name().name() == "Reference" && n.attribute("URI") == Some(""))
            .and_then(|r| r.children().find(|n| n.tag_name().name() == "DigestValue"))
            .and_then(|n| n.text())
            .unwrap();
        let expected = B64.encode(DigestMethod::Sha256.digest(INVOICE.as_bytes()));
        assert_eq!(stored, expected);
    }

    #[test]
    fn test_signed_info_canonical_form_is_stable() {
        let signed = signer(SignerConfig::default()).sign_str(INVOICE).unwrap();
        let canon = || {
            let doc = sellado_xml::parse(signed.as_str()).unwrap();
            let si = find_signed_info(&doc, signed.signature_id()).unwrap();
            sellado_c14n::canonicalize_subtree(si, C14nMode::Inclusive, &[]).unwrap()
        };
        assert_eq!(canon(), canon());
    }

    #[test]
    fn test_tampered_content_fails() {
        let signed = signer(SignerConfig::default()).sign_str(INVOICE).unwrap();
        let tampered = signed.as_str().replacen("<Total>100</Total>", "<Total>900</Total>", 1);
        match verify(&tampered, &[]).unwrap() {
            VerifyResult::Invalid { reason } => assert!(reason.contains("URI=\"\"")),
            VerifyResult::Valid(_) => panic!("tampered document verified"),
        }
    }

    #[test]
    fn test_tampered_signing_time_fails() {
        let signed = signer(SignerConfig::default()).sign_str(INVOICE).unwrap();
        let time = signed.signing_time().to_owned();
        let tampered = signed.as_str().replacen(&time, "2001-01-01T00:00:00.000000-05:00", 1);
        match verify(&tampered, &[]).unwrap() {
            VerifyResult::Invalid { reason } => assert!(reason.contains("SignedProperties")),
            VerifyResult::Valid(_) => panic!("tampered SigningTime verified"),
        }
    }

    #[test]
    fn test_tampered_cert_digest_fails() {
        let signed = signer(SignerConfig::default()).sign_str(INVOICE).unwrap();
        let tampered = signed.as_str().replacen(
            "aNMuOv/hSoam/blILFQfwlJghzpNLuLqXwHGAWwrnyY=",
            "AAAAOv/hSoam/blILFQfwlJghzpNLuLqXwHGAWwrnyY=",
            1,
        );
        assert!(!verify(&tampered, &[]).unwrap().is_valid());
    }

    #[test]
    fn test_two_signings_differ_and_verify() {
        let s = signer(SignerConfig::default());
        let a = s.sign_str(INVOICE).unwrap();
        let b = s.sign_str(INVOICE).unwrap();
        assert_ne!(a.signature_id(), b.signature_id());
        assert_ne!(a.signing_time(), b.signing_time());
        assert_valid(a.as_str());
        assert_valid(b.as_str());
    }

    #[test]
    fn test_sha1_exclusive_full_chain_with_properties() {
        let km = Arc::new(
            sellado_keys::load_key_material(&keys("chain.p12"), "secret123", None, CertSelection::MatchingKey)
                .unwrap(),
        );
        let config = SignerConfig {
            digest: DigestMethod::Sha1,
            c14n: C14nMode::Exclusive,
            chain: ChainInclusion::FullChain,
            signer_role: Some("Emisor".into()),
            production_place: Some(ProductionPlace {
                city: Some("Quito".into()),
                country_name: Some("Ecuador".into()),
                ..ProductionPlace::default()
            }),
            ..SignerConfig::default()
        };
        let xml = XadesSigner::new(km, config).unwrap().sign_str(INVOICE).unwrap().into_string();
        assert!(xml.contains("http://www.w3.org/2000/09/xmldsig#rsa-sha1"));
        assert!(xml.contains("http://www.w3.org/2001/10/xml-exc-c14n#"));
        assert_eq!(xml.matches("<ds:X509Certificate>").count(), 2);
        assert_valid(&xml);
    }

    #[test]
    fn test_ecdsa_signature() {
        let km = Arc::new(
            sellado_keys::load_key_material(&keys("ec-p256.p12"), "secret123", None, CertSelection::First)
                .unwrap(),
        );
        let signed = XadesSigner::new(km, SignerConfig::default()).unwrap().sign_str(INVOICE).unwrap();
        assert!(signed.as_str().contains("ecdsa-sha256"));
        assert!(!signed.as_str().contains("RSAKeyValue"));
        assert_valid(signed.as_str());
    }

    #[test]
    fn test_element_references_and_namespaced_root() {
        let input = concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<factura xmlns=\"urn:sri:factura\" id=\"comprobante\" version=\"1.1.0\">\n",
            "  <infoTributaria codigo=\"x1\"><ruc>1790011674001</ruc></infoTributaria>\n",
            "</factura>\n"
        );
        let config = SignerConfig {
            references: vec!["comprobante".into(), "x1".into()],
            id_attrs: vec!["codigo".into()],
            ..SignerConfig::default()
        };
        let signed = signer(config).sign_str(input).unwrap();
        let doc = sellado_xml::parse(signed.as_str()).unwrap();
        let uris: Vec<&str> = doc
            .descendants()
            .filter(|n| n.tag_name().name() == "Reference")
            .filter_map(|n| n.attribute("URI"))
            .collect();
        assert_eq!(uris.len(), 4);
        assert_eq!(&uris[..3], &["", "#comprobante", "#x1"]);
        assert!(signed.as_str().ends_with("</ds:Signature></factura>\n"));
        match verify(signed.as_str(), &["codigo".to_owned()]).unwrap() {
            VerifyResult::Valid(_) => {}
            VerifyResult::Invalid { reason } => panic!("{reason}"),
        }
    }

    #[test]
    fn test_self_closing_root_and_bom() {
        let signed = signer(SignerConfig::default()).sign_str("\u{feff}<Invoice total=\"1\"/>").unwrap();
        assert!(signed.as_str().starts_with("<Invoice total=\"1\"><ds:Signature"));
        assert!(signed.as_str().ends_with("</ds:Signature></Invoice>"));
        assert_valid(signed.as_str());
    }

    #[test]
    fn test_missing_reference_id_fails_with_format() {
        let mut progress = SigningProgress::new();
        let s = signer(SignerConfig {
            references: vec!["missing".into()],
            ..SignerConfig::default()
        });
        let err = s.sign_tracked(INVOICE, &mut progress).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.to_string().contains("missing"));
        assert_eq!(progress.state(), SigningState::Failed(ErrorKind::Format));
    }

    #[test]
    fn test_malformed_input_fails_with_format() {
        let err = signer(SignerConfig::default()).sign_str("<Invoice>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = signer(SignerConfig::default())
            .sign_str(r#"<r><a Id="x"/><b Id="x"/></r>"#)
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateId(_)));
    }

    #[test]
    fn test_sign_file_reaches_written() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("factura.xml");
        let output = dir.path().join("firmados").join("factura.xml");
        std::fs::write(&input, INVOICE).unwrap();
        let signed = signer(SignerConfig::default()).sign_file(&input, &output).unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), signed.as_str());
    }

    #[test]
    fn test_sign_file_failure_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("broken.xml");
        let output = dir.path().join("signed.xml");
        std::fs::write(&input, "<Invoice>").unwrap();
        assert!(signer(SignerConfig::default()).sign_file(&input, &output).is_err());
        assert!(!output.exists());
    }

    #[test]
    fn test_missing_input_is_io() {
        let dir = tempfile::tempdir().unwrap();
        let err = signer(SignerConfig::default())
            .sign_file(&dir.path().join("nope.xml"), &dir.path().join("out.xml"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_non_utf8_input_is_format() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("latin1.xml");
        let output = dir.path().join("out.xml");
        std::fs::write(&input, b"<Invoice>Pe\xf1a</Invoice>").unwrap();

        let err = read_input(&input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(err.to_string().contains("latin1.xml"));

        let err = signer(SignerConfig::default())
            .sign_file(&input, &output)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(!output.exists());
    }

    #[test]
    fn test_concurrent_signing_shares_one_signer() {
        let s = signer(SignerConfig::default());
        let ids: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|i| {
                    let s = &s;
                    scope.spawn(move || {
                        let xml = format!("<Invoice><Total>{i}</Total></Invoice>");
                        let signed = s.sign_str(&xml).unwrap();
                        assert_valid(signed.as_str());
                        signed.signature_id().to_owned()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        let unique: HashSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn test_id_allocator_avoids_existing() {
        let doc = sellado_xml::parse(r#"<r Id="taken"/>"#).unwrap();
        let ids = IdMap::build(&doc, &[]).unwrap();
        let mut alloc = IdAllocator::new(&ids);
        let a = alloc.next("Signature");
        let b = alloc.next("Signature");
        assert!(a.starts_with("Signature-"));
        assert_eq!(a.len(), "Signature-".len() + 16);
        assert_ne!(a, b);
    }
}
