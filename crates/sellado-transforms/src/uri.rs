#![forbid(unsafe_code)]

//! URI resolution for XML-DSig references.
//!
//! Handles:
//! - Empty URI (""): the entire document minus comments
//! - Same-document references ("#id", "#xpointer(id('id'))"): the
//!   element subtree minus comments
//! - "#xpointer(/)": the entire document with comments
//!
//! External references are rejected.

use roxmltree::Document;
use sellado_core::Error;
use sellado_xml::{xpath, IdMap, NodeSet};

use crate::pipeline::TransformData;

/// Resolve a reference URI to the node set it selects.
pub fn resolve<'d, 'input>(
    uri: &str,
    doc: &'d Document<'input>,
    ids: &IdMap,
) -> Result<TransformData<'d, 'input>, Error> {
    let node_set = if uri.is_empty() {
        NodeSet::all_without_comments(doc)
    } else if let Some(fragment) = xpath::parse_same_document_ref(uri) {
        if fragment == "xpointer(/)" {
            NodeSet::all(doc)
        } else {
            let id = xpath::parse_xpointer_id(fragment).unwrap_or(fragment);
            let node = xpath::resolve_id(doc, ids, id)?;
            NodeSet::tree_without_comments(node)
        }
    } else {
        return Err(Error::InvalidUri(format!(
            "external URI not supported: {uri}"
        )));
    };
    log::trace!("URI '{uri}' selects {} nodes", node_set.len());
    Ok(TransformData::Xml { doc, node_set })
}
