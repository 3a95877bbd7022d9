#![forbid(unsafe_code)]

//! The few XPointer forms XML-DSig references actually use:
//! - same-document `#id-value`
//! - `#xpointer(/)` and `#xpointer(id('...'))`
//! - the ancestor-or-self axis (needed by the enveloped transform)

use crate::IdMap;
use sellado_core::Error;

/// Parse a same-document reference (e.g., `#foo` → `foo`).
pub fn parse_same_document_ref(uri: &str) -> Option<&str> {
    uri.strip_prefix('#')
}

/// Parse an `xpointer(id('...'))` expression and return the ID value.
pub fn parse_xpointer_id(expr: &str) -> Option<&str> {
    let inner = expr
        .strip_prefix("xpointer(id('")
        .and_then(|s| s.strip_suffix("'))"))
        .or_else(|| {
            expr.strip_prefix("xpointer(id(\"")
                .and_then(|s| s.strip_suffix("\"))"))
        })?;
    Some(inner)
}

/// Resolve an ID value in a parsed document.
pub fn resolve_id<'a, 'input>(
    doc: &'a roxmltree::Document<'input>,
    ids: &IdMap,
    id: &str,
) -> Result<roxmltree::Node<'a, 'input>, Error> {
    ids.find(doc, id)
        .ok_or_else(|| Error::IdNotFound(id.to_owned()))
}

/// Check if `ancestor` is an ancestor-or-self of `node`.
pub fn is_ancestor_or_self(
    ancestor: roxmltree::Node<'_, '_>,
    node: roxmltree::Node<'_, '_>,
) -> bool {
    node.ancestors().any(|n| n.id() == ancestor.id())
}
