#![forbid(unsafe_code)]

//! `ds:Reference` construction: resolve a URI, run its transforms and
//! digest the result.

use base64::Engine;
use roxmltree::Document;
use sellado_c14n::C14nMode;
use sellado_core::{algorithm, ns, Error};
use sellado_crypto::{CryptoBackend, DigestMethod};
use sellado_transforms::{uri, C14nTransform, EnvelopedSignatureTransform, TransformPipeline};
use sellado_xml::{xpath, Element, IdMap};

use crate::{ds, B64};

/// One `ds:Transform` as written into the signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformSpec {
    pub algorithm: String,
    pub inclusive_prefixes: Vec<String>,
}

/// A reference whose digest has been computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub id: Option<String>,
    pub uri: String,
    pub ref_type: Option<String>,
    pub transforms: Vec<TransformSpec>,
    pub digest_method: DigestMethod,
    pub digest_value: Vec<u8>,
}

impl Reference {
    /// A reference to the SignedProperties element whose digest is not
    /// known yet; used to lay out the signature before it is computed.
    pub(crate) fn signed_properties_placeholder(
        signed_properties_id: &str,
        digest_method: DigestMethod,
        c14n: C14nMode,
    ) -> Self {
        Self {
            id: None,
            uri: format!("#{signed_properties_id}"),
            ref_type: Some(algorithm::SIGNED_PROPERTIES_TYPE.into()),
            transforms: c14n_transform(c14n)
                .map(|t| vec![spec_of(&t)])
                .unwrap_or_default(),
            digest_method,
            digest_value: Vec::new(),
        }
    }

    pub fn to_element(&self) -> Element {
        let transforms = (!self.transforms.is_empty()).then(|| {
            self.transforms
                .iter()
                .fold(Element::new(ds(ns::node::TRANSFORMS)), |acc, t| {
                    acc.child(transform_element(t))
                })
        });
        let digest_value = if self.digest_value.is_empty() {
            Element::new(ds(ns::node::DIGEST_VALUE))
        } else {
            Element::new(ds(ns::node::DIGEST_VALUE)).text(B64.encode(&self.digest_value))
        };
        Element::new(ds(ns::node::REFERENCE))
            .attr_opt(ns::attr::ID, self.id.as_deref())
            .attr_opt(ns::attr::TYPE, self.ref_type.as_deref())
            .attr(ns::attr::URI, self.uri.as_str())
            .child_opt(transforms)
            .child(Element::new(ds(ns::node::DIGEST_METHOD)).attr(ns::attr::ALGORITHM, self.digest_method.uri()))
            .child(digest_value)
    }
}

fn transform_element(t: &TransformSpec) -> Element {
    let el = Element::new(ds(ns::node::TRANSFORM)).attr(ns::attr::ALGORITHM, t.algorithm.as_str());
    if t.inclusive_prefixes.is_empty() {
        return el;
    }
    el.child(
        Element::new(format!("ec:{}", ns::node::INCLUSIVE_NAMESPACES))
            .attr("xmlns:ec", ns::EXC_C14N)
            .attr(ns::attr::PREFIX_LIST, t.inclusive_prefixes.join(" ")),
    )
}

fn c14n_transform(mode: C14nMode) -> Option<C14nTransform> {
    mode.is_exclusive().then(|| C14nTransform::new(mode, Vec::new()))
}

fn spec_of(t: &dyn sellado_transforms::Transform) -> TransformSpec {
    TransformSpec {
        algorithm: t.uri().to_owned(),
        inclusive_prefixes: t.inclusive_prefixes().to_vec(),
    }
}

/// Computes references with one digest algorithm and C14N mode.
pub struct ReferenceBuilder<'a> {
    backend: &'a dyn CryptoBackend,
    digest: DigestMethod,
    c14n: C14nMode,
}

impl<'a> ReferenceBuilder<'a> {
    pub fn new(backend: &'a dyn CryptoBackend, digest: DigestMethod, c14n: C14nMode) -> Self {
        Self {
            backend,
            digest,
            c14n,
        }
    }

    /// The primary reference: `URI=""` with the enveloped-signature transform.
    pub fn document(
        &self,
        doc: &Document<'_>,
        ids: &IdMap,
        id: Option<String>,
    ) -> Result<Reference, Error> {
        let mut pipeline = TransformPipeline::new();
        pipeline.push(Box::new(EnvelopedSignatureTransform::before_signing()));
        self.push_c14n(&mut pipeline);
        self.compute("", doc, ids, pipeline, id, None)
    }

    /// A reference to the element carrying `element_id`.
    ///
    /// The enveloped transform is added when the element is the root,
    /// since the signature will end up inside it.
    pub fn element(&self, doc: &Document<'_>, ids: &IdMap, element_id: &str) -> Result<Reference, Error> {
        let node = xpath::resolve_id(doc, ids, element_id)?;
        let mut pipeline = TransformPipeline::new();
        if node.id() == doc.root_element().id() {
            pipeline.push(Box::new(EnvelopedSignatureTransform::before_signing()));
        }
        self.push_c14n(&mut pipeline);
        self.compute(&format!("#{element_id}"), doc, ids, pipeline, None, None)
    }

    /// The reference to `SignedProperties`, digested inside `doc`, which
    /// must already contain the signature skeleton.
    pub fn signed_properties(
        &self,
        doc: &Document<'_>,
        ids: &IdMap,
        signed_properties_id: &str,
    ) -> Result<Reference, Error> {
        let mut pipeline = TransformPipeline::new();
        self.push_c14n(&mut pipeline);
        self.compute(
            &format!("#{signed_properties_id}"),
            doc,
            ids,
            pipeline,
            None,
            Some(algorithm::SIGNED_PROPERTIES_TYPE.to_owned()),
        )
    }

    fn push_c14n(&self, pipeline: &mut TransformPipeline) {
        if let Some(t) = c14n_transform(self.c14n) {
            pipeline.push(Box::new(t));
        }
    }

    fn compute(
        &self,
        uri_value: &str,
        doc: &Document<'_>,
        ids: &IdMap,
        pipeline: TransformPipeline,
        id: Option<String>,
        ref_type: Option<String>,
    ) -> Result<Reference, Error> {
        let data = uri::resolve(uri_value, doc, ids)?;
        let octets = pipeline.execute(data)?;
        let digest_value = self.backend.digest(self.digest, &octets)?;
        log::debug!(
            "reference URI=\"{uri_value}\": {} octets digested with {}",
            octets.len(),
            self.digest
        );
        Ok(Reference {
            id,
            uri: uri_value.to_owned(),
            ref_type,
            transforms: pipeline.iter().map(spec_of).collect(),
            digest_method: self.digest,
            digest_value,
        })
    }
}
