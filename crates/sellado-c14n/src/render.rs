#![forbid(unsafe_code)]

//! Rendering pieces shared by the inclusive and exclusive canonicalizers.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use sellado_core::ns;
use sellado_xml::qname;

use crate::escape;

/// Prefix → namespace URI. The default namespace uses the key `""`; an
/// empty URI under that key records an explicit `xmlns=""`.
pub type NsMap = BTreeMap<String, String>;

/// A namespace declaration to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsDecl {
    /// The prefix ("" for default namespace).
    pub prefix: String,
    /// The namespace URI.
    pub uri: String,
}

impl NsDecl {
    pub fn render_into(&self, out: &mut Vec<u8>) {
        if self.prefix.is_empty() {
            out.extend_from_slice(b" xmlns=\"");
        } else {
            out.extend_from_slice(b" xmlns:");
            out.extend_from_slice(self.prefix.as_bytes());
            out.extend_from_slice(b"=\"");
        }
        escape::attr_into(out, &self.uri);
        out.push(b'"');
    }
}

impl Ord for NsDecl {
    // Default namespace first, then by prefix.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.prefix.is_empty(), other.prefix.is_empty()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => self.prefix.cmp(&other.prefix),
        }
    }
}

impl PartialOrd for NsDecl {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// An attribute to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    /// Namespace URI, "" for none.
    pub ns_uri: String,
    pub local_name: String,
    /// Qualified name as written in the source.
    pub qualified_name: String,
    pub value: String,
}

impl Attr {
    pub fn render_into(&self, out: &mut Vec<u8>) {
        out.push(b' ');
        out.extend_from_slice(self.qualified_name.as_bytes());
        out.extend_from_slice(b"=\"");
        escape::attr_into(out, &self.value);
        out.push(b'"');
    }

    /// Prefix of the qualified name, "" when unprefixed.
    pub fn prefix(&self) -> &str {
        qname::prefix_part(&self.qualified_name)
    }
}

impl Ord for Attr {
    // Unqualified attributes first by local name, then by (namespace URI, local name).
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.ns_uri.is_empty(), other.ns_uri.is_empty()) {
            (true, true) => self.local_name.cmp(&other.local_name),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self
                .ns_uri
                .cmp(&other.ns_uri)
                .then_with(|| self.local_name.cmp(&other.local_name)),
        }
    }
}

impl PartialOrd for Attr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The attributes of `node`, unsorted.
pub fn element_attrs(node: roxmltree::Node<'_, '_>) -> Vec<Attr> {
    node.attributes()
        .map(|a| Attr {
            ns_uri: a.namespace().unwrap_or("").to_owned(),
            local_name: a.name().to_owned(),
            qualified_name: qname::attribute_qname(node, &a).into_owned(),
            value: a.value().to_owned(),
        })
        .collect()
}

/// All namespace bindings in scope at `node`, excluding the `xml` prefix.
pub fn inscope_namespaces(node: roxmltree::Node<'_, '_>) -> NsMap {
    node.namespaces()
        .filter(|n| n.name() != Some("xml") && n.uri() != ns::XML)
        .map(|n| (n.name().unwrap_or("").to_owned(), n.uri().to_owned()))
        .collect()
}

/// Write `<qname decls attrs>`.
pub fn start_tag(out: &mut Vec<u8>, qname: &str, decls: &[NsDecl], attrs: &[Attr]) {
    out.push(b'<');
    out.extend_from_slice(qname.as_bytes());
    for d in decls {
        d.render_into(out);
    }
    for a in attrs {
        a.render_into(out);
    }
    out.push(b'>');
}

/// Write `</qname>`.
pub fn end_tag(out: &mut Vec<u8>, qname: &str) {
    out.extend_from_slice(b"</");
    out.extend_from_slice(qname.as_bytes());
    out.push(b'>');
}

/// Write a comment or processing instruction. Outside the document
/// element they are separated from it by a line feed.
pub fn comment_or_pi(out: &mut Vec<u8>, node: roxmltree::Node<'_, '_>) {
    let top_level = node.parent().is_some_and(|p| p.is_root());
    if top_level && node.prev_siblings().any(|s| s.is_element()) {
        out.push(b'\n');
    }
    if node.is_comment() {
        out.extend_from_slice(b"<!--");
        out.extend_from_slice(node.text().unwrap_or("").as_bytes());
        out.extend_from_slice(b"-->");
    } else if let Some(pi) = node.pi() {
        out.extend_from_slice(b"<?");
        out.extend_from_slice(pi.target.as_bytes());
        if let Some(value) = pi.value.filter(|v| !v.is_empty()) {
            out.push(b' ');
            escape::pi_into(out, value);
        }
        out.extend_from_slice(b"?>");
    }
    if top_level && node.next_siblings().any(|s| s.is_element()) {
        out.push(b'\n');
    }
}

/// xml:* attributes carried by the invisible ancestors of `node` up to
/// its nearest visible ancestor, nearest first, skipping names `node`
/// already carries.
pub fn inherited_xml_attrs(
    node: roxmltree::Node<'_, '_>,
    own: &[Attr],
    is_visible: impl Fn(roxmltree::Node<'_, '_>) -> bool,
) -> Vec<Attr> {
    let mut found: Vec<Attr> = Vec::new();
    for anc in node.ancestors().skip(1).filter(|n| n.is_element()) {
        if is_visible(anc) {
            break;
        }
        for a in anc.attributes().filter(|a| a.namespace() == Some(ns::XML)) {
            let taken = own
                .iter()
                .chain(found.iter())
                .any(|x| x.ns_uri == ns::XML && x.local_name == a.name());
            if !taken {
                found.push(Attr {
                    ns_uri: ns::XML.to_owned(),
                    local_name: a.name().to_owned(),
                    qualified_name: format!("xml:{}", a.name()),
                    value: a.value().to_owned(),
                });
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ns_decl_order() {
        let mut v = vec![
            NsDecl { prefix: "b".into(), uri: "u".into() },
            NsDecl { prefix: "".into(), uri: "d".into() },
            NsDecl { prefix: "a".into(), uri: "u".into() },
        ];
        v.sort();
        let prefixes: Vec<&str> = v.iter().map(|d| d.prefix.as_str()).collect();
        assert_eq!(prefixes, vec!["", "a", "b"]);
    }

    #[test]
    fn test_attr_order_by_namespace_uri_not_prefix() {
        let doc = sellado_xml::parse(
            r#"<e xmlns:z="urn:a" xmlns:a="urn:b" a:x="1" z:y="2" b="3"/>"#,
        )
        .unwrap();
        let mut attrs = element_attrs(doc.root_element());
        attrs.sort();
        let names: Vec<&str> = attrs.iter().map(|a| a.qualified_name.as_str()).collect();
        assert_eq!(names, vec!["b", "z:y", "a:x"]);
    }
}
