#![forbid(unsafe_code)]

//! Inclusive Canonical XML 1.0.
//!
//! Algorithm URI: `http://www.w3.org/TR/2001/REC-xml-c14n-20010315`
//!
//! Every namespace binding in scope is rendered on the apex of the
//! output, and again on a descendant only when it differs from what the
//! nearest rendered ancestor already put in scope.

use sellado_core::Error;
use sellado_xml::{qname, NodeSet};

use crate::render::{self, NsDecl, NsMap};

/// Canonicalize a document (or the subset in `node_set`) using C14N 1.0.
pub fn canonicalize(
    doc: &roxmltree::Document<'_>,
    with_comments: bool,
    node_set: Option<&NodeSet>,
) -> Result<Vec<u8>, Error> {
    let mut output = Vec::new();
    let ctx = C14nContext {
        with_comments,
        node_set,
    };
    ctx.process_node(doc.root(), &mut output, &NsMap::new());
    Ok(output)
}

struct C14nContext<'a> {
    with_comments: bool,
    node_set: Option<&'a NodeSet>,
}

impl C14nContext<'_> {
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
            // Hidden elements contribute nothing but their visible descendants.
            for child in node.children() {
                self.process_node(child, out, rendered);
            }
            return;
        }

        let in_scope = render::inscope_namespaces(node);
        let mut decls: Vec<NsDecl> = Vec::new();
        let mut child_scope = rendered.clone();

        for (prefix, uri) in &in_scope {
            if prefix.is_empty() && uri.is_empty() {
                continue;
            }
            if rendered.get(prefix) != Some(uri) {
                decls.push(NsDecl {
                    prefix: prefix.clone(),
                    uri: uri.clone(),
                });
                child_scope.insert(prefix.clone(), uri.clone());
            }
        }

        // Undeclare a default namespace the output ancestor put in scope.
        let own_default = in_scope.get("").filter(|u| !u.is_empty());
        let rendered_default = rendered.get("").filter(|u| !u.is_empty());
        if own_default.is_none() && rendered_default.is_some() {
            decls.push(NsDecl {
                prefix: String::new(),
                uri: String::new(),
            });
            child_scope.insert(String::new(), String::new());
        }
        decls.sort();

        let mut attrs = render::element_attrs(node);
        if self.node_set.is_some() {
            let extra = render::inherited_xml_attrs(node, &attrs, |n| self.is_visible(n));
            attrs.extend(extra);
        }
        attrs.sort();

        let name = qname::element_qname(node);
        render::start_tag(out, &name, &decls, &attrs);
        for child in node.children() {
            self.process_node(child, out, &child_scope);
        }
        render::end_tag(out, &name);
    }
}
