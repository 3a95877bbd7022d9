#![forbid(unsafe_code)]

//! Transform pipeline and trait definitions.

use roxmltree::Document;
use sellado_c14n::C14nMode;
use sellado_core::Error;
use sellado_xml::NodeSet;

/// Data flowing through the transform pipeline.
pub enum TransformData<'d, 'input> {
    /// A node set over a parsed document.
    Xml {
        doc: &'d Document<'input>,
        node_set: NodeSet,
    },
    /// Raw octets.
    Binary(Vec<u8>),
}

impl TransformData<'_, '_> {
    /// Convert to octets, applying inclusive C14N to a node set.
    pub fn into_binary(self) -> Result<Vec<u8>, Error> {
        match self {
            TransformData::Binary(data) => Ok(data),
            TransformData::Xml { doc, node_set } => {
                sellado_c14n::canonicalize_doc(doc, C14nMode::Inclusive, Some(&node_set), &[])
            }
        }
    }
}

/// One step of a reference's transform chain.
pub trait Transform: Send + Sync {
    /// The algorithm URI written to `ds:Transform/@Algorithm`.
    fn uri(&self) -> &str;

    /// Exclusive C14N `InclusiveNamespaces/@PrefixList`, if any.
    fn inclusive_prefixes(&self) -> &[String] {
        &[]
    }

    fn execute<'d, 'input>(
        &self,
        input: TransformData<'d, 'input>,
    ) -> Result<TransformData<'d, 'input>, Error>;
}

/// A pipeline of transforms executed in sequence.
#[derive(Default)]
pub struct TransformPipeline {
    transforms: Vec<Box<dyn Transform>>,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, transform: Box<dyn Transform>) {
        self.transforms.push(transform);
    }

    /// Run every transform, then reduce the result to octets.
    pub fn execute(&self, input: TransformData<'_, '_>) -> Result<Vec<u8>, Error> {
        let mut data = input;
        for transform in &self.transforms {
            data = transform.execute(data)?;
        }
        data.into_binary()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Transform> {
        self.transforms.iter().map(|t| t.as_ref())
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl std::fmt::Debug for TransformPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter().map(|t| t.uri())).finish()
    }
}

// ── C14N Transform ───────────────────────────────────────────────────

/// A canonicalization transform.
#[derive(Debug, Clone)]
pub struct C14nTransform {
    mode: C14nMode,
    inclusive_prefixes: Vec<String>,
}

impl C14nTransform {
    pub fn new(mode: C14nMode, inclusive_prefixes: Vec<String>) -> Self {
        Self {
            mode,
            inclusive_prefixes,
        }
    }

    pub fn mode(&self) -> C14nMode {
        self.mode
    }
}

impl Transform for C14nTransform {
    fn uri(&self) -> &str {
        self.mode.uri()
    }

    fn inclusive_prefixes(&self) -> &[String] {
        &self.inclusive_prefixes
    }

    fn execute<'d, 'input>(
        &self,
        input: TransformData<'d, 'input>,
    ) -> Result<TransformData<'d, 'input>, Error> {
        let bytes = match input {
            TransformData::Xml { doc, mut node_set } => {
                if !self.mode.with_comments() {
                    node_set.remove_comments(doc);
                }
                sellado_c14n::canonicalize_doc(doc, self.mode, Some(&node_set), &self.inclusive_prefixes)?
            }
            TransformData::Binary(data) => {
                let text = std::str::from_utf8(&data)
                    .map_err(|e| Error::Transform(format!("invalid UTF-8: {e}")))?;
                sellado_c14n::canonicalize(text, self.mode, None, &self.inclusive_prefixes)?
            }
        };
        Ok(TransformData::Binary(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pipeline_is_inclusive_c14n() {
        let doc = sellado_xml::parse("<a  b='1'><c/></a>").unwrap();
        let out = TransformPipeline::new()
            .execute(TransformData::Xml {
                doc: &doc,
                node_set: NodeSet::all_without_comments(&doc),
            })
            .unwrap();
        assert_eq!(out, br#"<a b="1"><c></c></a>"#);
    }

    #[test]
    fn test_exclusive_drops_unused_namespace() {
        let doc = sellado_xml::parse(r#"<r xmlns:u="urn:u"><a>x</a></r>"#).unwrap();
        let a = doc.root_element().first_element_child().unwrap();
        let mut pipeline = TransformPipeline::new();
        pipeline.push(Box::new(C14nTransform::new(C14nMode::Exclusive, Vec::new())));
        let out = pipeline
            .execute(TransformData::Xml {
                doc: &doc,
                node_set: NodeSet::tree_without_comments(a),
            })
            .unwrap();
        assert_eq!(out, b"<a>x</a>");
        assert_eq!(format!("{pipeline:?}"), format!("[{:?}]", C14nMode::Exclusive.uri()));
    }

    #[test]
    fn test_c14n_over_binary() {
        let t = C14nTransform::new(C14nMode::Inclusive, Vec::new());
        let out = t
            .execute(TransformData::Binary(b"<x a='&lt;'/>".to_vec()))
            .unwrap()
            .into_binary()
            .unwrap();
        assert_eq!(out, br#"<x a="&lt;"></x>"#);
    }
}
