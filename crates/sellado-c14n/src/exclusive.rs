#![forbid(unsafe_code)]

//! Exclusive Canonical XML 1.0.
//!
//! Algorithm URI: `http://www.w3.org/2001/10/xml-exc-c14n#`
//!
//! A namespace declaration is rendered on an element only when the
//! element or one of its attributes visibly uses the prefix and the
//! nearest rendered ancestor did not already bind it to the same URI.
//! Prefixes named in the InclusiveNamespaces PrefixList (`#default` for
//! the default namespace) are treated the inclusive way.

use sellado_core::Error;
use sellado_xml::{qname, NodeSet};

use crate::render::{self, NsDecl, NsMap};

/// Canonicalize a document (or the subset in `node_set`) using exclusive C14N.
pub fn canonicalize(
    doc: &roxmltree::Document<'_>,
    with_comments: bool,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    let inclusive: Vec<String> = inclusive_prefixes
        .iter()
        .map(|p| if p == "#default" { String::new() } else { p.clone() })
        .collect();
    let ctx = ExcC14nContext {
        with_comments,
        node_set,
        inclusive,
    };
    let mut output = Vec::new();
    ctx.process_node(doc.root(), &mut output, &NsMap::new());
    Ok(output)
}

struct ExcC14nContext<'a> {
    with_comments: bool,
    node_set: Option<&'a NodeSet>,
    inclusive: Vec<String>,
}

impl ExcC14nContext<'_> {
    fn is_visible(&self, node: roxmltree::Node<'_, '_>) -> bool {
        self.node_set.map_or(true, |s| s.contains(node))
    }

    fn process_node(&self, node: roxmltree::Node<'_, '_>, out: &mut Vec<u8>, rendered: &NsMap) {
        match node.node_type() {
            roxmltree::NodeType::Root => {
                for child in node.children() {
                    self.process_node(child, out, rendered);
                }
            }
            roxmltree::NodeType::Element => self.process_element(node, out, rendered),
            roxmltree::NodeType::Text => {
                if self.is_visible(node) {
                    crate::escape::text_into(out, node.text().unwrap_or(""));
                }
            }
            roxmltree::NodeType::Comment => {
                if self.with_comments && self.is_visible(node) {
                    render::comment_or_pi(out, node);
                }
            }
            roxmltree::NodeType::PI => {
                if self.is_visible(node) {
                    render::comment_or_pi(out, node);
                }
            }
        }
    }

    fn process_element(&self, node: roxmltree::Node<'_, '_>, out: &mut Vec<u8>, rendered: &NsMap) {
        if !self.is_visible(node) {
            for child in node.children() {
                self.process_node(child, out, rendered);
            }
            return;
        }

        let name = qname::element_qname(node);
        let mut attrs = render::element_attrs(node);
        attrs.sort();

        // Visibly utilized prefixes, plus the inclusive ones.
        let mut utilized: Vec<String> = vec![qname::prefix_part(&name).to_owned()];
        for a in &attrs {
            let p = a.prefix();
            if !p.is_empty() && p != "xml" && !utilized.iter().any(|u| u == p) {
                utilized.push(p.to_owned());
            }
        }
        for p in &self.inclusive {
            if !utilized.contains(p) {
                utilized.push(p.clone());
            }
        }

        let in_scope = render::inscope_namespaces(node);
        let mut decls: Vec<NsDecl> = Vec::new();
        let mut child_scope = rendered.clone();
        for prefix in &utilized {
            let uri = in_scope.get(prefix).map(String::as_str).unwrap_or("");
            let previous = rendered.get(prefix).map(String::as_str).unwrap_or("");
            if prefix.is_empty() {
                // xmlns="" only undoes a rendered non-empty default.
                if uri != previous {
                    decls.push(NsDecl {
                        prefix: String::new(),
                        uri: uri.to_owned(),
                    });
                    child_scope.insert(String::new(), uri.to_owned());
                }
            } else if !uri.is_empty() && rendered.get(prefix).map(String::as_str) != Some(uri) {
                decls.push(NsDecl {
                    prefix: prefix.clone(),
                    uri: uri.to_owned(),
                });
                child_scope.insert(prefix.clone(), uri.to_owned());
            }
        }
        decls.sort();

        render::start_tag(out, &name, &decls, &attrs);
        for child in node.children() {
            self.process_node(child, out, &child_scope);
        }
        render::end_tag(out, &name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exc(xml: &str, prefixes: &[&str]) -> String {
        let doc = sellado_xml::parse(xml).unwrap();
        let prefixes: Vec<String> = prefixes.iter().map(|s| s.to_string()).collect();
        String::from_utf8(canonicalize(&doc, false, None, &prefixes).unwrap()).unwrap()
    }

    #[test]
    fn test_unused_namespaces_dropped() {
        assert_eq!(
            exc(r#"<r xmlns:u="urn:unused" xmlns:p="urn:p"><p:a/></r>"#, &[]),
            r#"<r><p:a xmlns:p="urn:p"></p:a></r>"#
        );
    }

    #[test]
    fn test_attribute_prefix_utilized() {
        assert_eq!(
            exc(r#"<r xmlns:p="urn:p" p:x="1"/>"#, &[]),
            r#"<r xmlns:p="urn:p" p:x="1"></r>"#
        );
    }

    #[test]
    fn test_inclusive_prefix_list() {
        assert_eq!(
            exc(r#"<r xmlns:u="urn:u" xmlns="urn:d"><a/></r>"#, &["u", "#default"]),
            r#"<r xmlns="urn:d" xmlns:u="urn:u"><a></a></r>"#
        );
    }

    #[test]
    fn test_default_namespace_undeclared() {
        assert_eq!(
            exc(r#"<r xmlns="urn:d"><a xmlns=""/></r>"#, &[]),
            r#"<r xmlns="urn:d"><a xmlns=""></a></r>"#
        );
        assert_eq!(exc(r#"<r><a xmlns=""/></r>"#, &[]), "<r><a></a></r>");
    }

    #[test]
    fn test_subtree_only_renders_what_it_uses() {
        let xml = r#"<r xmlns:ds="urn:ds" xmlns:x="urn:x"><ds:a><ds:b/></ds:a></r>"#;
        let doc = sellado_xml::parse(xml).unwrap();
        let a = doc
            .descendants()
            .find(|n| n.has_tag_name(("urn:ds", "a")))
            .unwrap();
        let set = NodeSet::tree_without_comments(a);
        let out = String::from_utf8(canonicalize(&doc, false, Some(&set), &[]).unwrap()).unwrap();
        assert_eq!(out, r#"<ds:a xmlns:ds="urn:ds"><ds:b></ds:b></ds:a>"#);
    }
}
