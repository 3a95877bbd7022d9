#![forbid(unsafe_code)]

//! Qualified names as written in the source document.
//!
//! roxmltree resolves names to `(namespace, local)` pairs. Canonical XML
//! needs the prefix the author actually used, so it is recovered from the
//! node's byte range in the input text.

use std::borrow::Cow;

use sellado_core::ns;

/// The qualified name (`prefix:local` or `local`) of an element.
pub fn element_qname<'a, 'input>(node: roxmltree::Node<'a, 'input>) -> Cow<'input, str> {
    let text = node.document().input_text();
    let range = node.range();
    if let Some(tag) = text.get(range.start..range.end) {
        if let Some(rest) = tag.strip_prefix('<') {
            let end = rest
                .find(|c: char| c.is_ascii_whitespace() || c == '/' || c == '>')
                .unwrap_or(rest.len());
            let candidate = &rest[..end];
            if local_part(candidate) == node.tag_name().name() {
                let start = range.start + 1;
                return Cow::Borrowed(&text[start..start + end]);
            }
        }
    }
    // Nodes produced by entity expansion have no usable source range.
    let name = node.tag_name();
    match name.namespace() {
        Some(uri) => match prefix_for(node, uri) {
            Some(p) if !p.is_empty() => Cow::Owned(format!("{p}:{}", name.name())),
            _ => Cow::Borrowed(name.name()),
        },
        None => Cow::Borrowed(name.name()),
    }
}

/// The prefix of an element, `""` when it is unprefixed.
pub fn element_prefix(node: roxmltree::Node<'_, '_>) -> String {
    prefix_part(&element_qname(node)).to_owned()
}

/// The qualified name of an attribute.
pub fn attribute_qname<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    attr: &roxmltree::Attribute<'a, 'input>,
) -> Cow<'input, str> {
    let text = node.document().input_text();
    if let Some(q) = text.get(attr.range_qname()) {
        if local_part(q) == attr.name() {
            return Cow::Borrowed(q);
        }
    }
    match attr.namespace() {
        Some(ns::XML) => Cow::Owned(format!("xml:{}", attr.name())),
        Some(uri) => match prefix_for(node, uri) {
            Some(p) if !p.is_empty() => Cow::Owned(format!("{p}:{}", attr.name())),
            _ => Cow::Borrowed(attr.name()),
        },
        None => Cow::Borrowed(attr.name()),
    }
}

/// The prefix part of a qualified name, `""` when there is none.
pub fn prefix_part(qname: &str) -> &str {
    match qname.split_once(':') {
        Some((prefix, _)) => prefix,
        None => "",
    }
}

/// The local part of a qualified name.
pub fn local_part(qname: &str) -> &str {
    match qname.split_once(':') {
        Some((_, local)) => local,
        None => qname,
    }
}

fn prefix_for<'input>(node: roxmltree::Node<'_, 'input>, uri: &str) -> Option<&'input str> {
    if node.default_namespace() == Some(uri) {
        return Some("");
    }
    node.lookup_prefix(uri)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_qname_keeps_prefix() {
        let xml = r#"<a:root xmlns:a="urn:a"><a:child/><plain/></a:root>"#;
        let doc = crate::parse(xml).unwrap();
        let root = doc.root_element();
        assert_eq!(element_qname(root), "a:root");
        let kids: Vec<_> = root.children().filter(|n| n.is_element()).collect();
        assert_eq!(element_qname(kids[0]), "a:child");
        assert_eq!(element_prefix(kids[0]), "a");
        assert_eq!(element_qname(kids[1]), "plain");
        assert_eq!(element_prefix(kids[1]), "");
    }

    #[test]
    fn test_attribute_qname() {
        let xml = r#"<r xmlns:b="urn:b" b:x="1" y="2" xml:lang="es"/>"#;
        let doc = crate::parse(xml).unwrap();
        let root = doc.root_element();
        let names: Vec<String> = root
            .attributes()
            .map(|a| attribute_qname(root, &a).into_owned())
            .collect();
        assert_eq!(names, vec!["b:x", "y", "xml:lang"]);
    }

    #[test]
    fn test_prefix_and_local_parts() {
        assert_eq!(prefix_part("ds:Signature"), "ds");
        assert_eq!(local_part("ds:Signature"), "Signature");
        assert_eq!(prefix_part("Signature"), "");
    }
}
