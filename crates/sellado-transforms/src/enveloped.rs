#![forbid(unsafe_code)]

//! Enveloped signature transform.
//!
//! Removes the `<Signature>` element holding the reference, with its
//! descendants, from the node set.

use roxmltree::NodeId;
use sellado_core::{algorithm, Error};

use crate::pipeline::{Transform, TransformData};

#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopedSignatureTransform {
    /// The enclosing `<Signature>`; `None` while the signature does not
    /// exist yet, which leaves the node set untouched.
    signature: Option<NodeId>,
}

impl EnvelopedSignatureTransform {
    /// For signing: no Signature element exists in the document yet.
    pub fn before_signing() -> Self {
        Self { signature: None }
    }

    /// For verification: strip the given Signature element.
    pub fn for_signature(signature: NodeId) -> Self {
        Self {
            signature: Some(signature),
        }
    }
}

impl Transform for EnvelopedSignatureTransform {
    fn uri(&self) -> &str {
        algorithm::ENVELOPED_SIGNATURE
    }

    fn execute<'d, 'input>(
        &self,
        input: TransformData<'d, 'input>,
    ) -> Result<TransformData<'d, 'input>, Error> {
        match input {
            TransformData::Xml { doc, mut node_set } => {
                if let Some(id) = self.signature {
                    let sig = doc.get_node(id).ok_or_else(|| {
                        Error::Transform("enveloped Signature element not in document".into())
                    })?;
                    node_set.remove_subtree(sig);
                }
                Ok(TransformData::Xml { doc, node_set })
            }
            TransformData::Binary(_) => Err(Error::Transform(
                "enveloped-signature transform requires XML input".into(),
            )),
        }
    }
}
