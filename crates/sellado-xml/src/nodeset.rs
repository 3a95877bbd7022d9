#![forbid(unsafe_code)]

//! NodeSet type for XML canonicalization and transforms.
//!
//! A `NodeSet` is the set of element, text, comment and processing
//! instruction nodes (plus the document root) selected by a Reference
//! URI after its transforms. Attributes and namespace declarations follow
//! their owning element.

use std::collections::HashSet;

use roxmltree::{Document, Node, NodeId};

/// A set of XML document nodes identified by `NodeId`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSet {
    nodes: HashSet<NodeId>,
}

impl NodeSet {
    /// Create an empty node set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every node of the document, comments included.
    pub fn all(doc: &Document<'_>) -> Self {
        Self {
            nodes: doc.descendants().map(|n| n.id()).collect(),
        }
    }

    /// Every node except comments: what `URI=""` selects.
    pub fn all_without_comments(doc: &Document<'_>) -> Self {
        Self {
            nodes: doc
                .descendants()
                .filter(|n| !n.is_comment())
                .map(|n| n.id())
                .collect(),
        }
    }

    /// The subtree rooted at `node` without comments: what `URI="#id"` selects.
    pub fn tree_without_comments(node: Node<'_, '_>) -> Self {
        Self {
            nodes: node
                .descendants()
                .filter(|n| !n.is_comment())
                .map(|n| n.id())
                .collect(),
        }
    }

    /// The subtree rooted at `node`, comments included.
    pub fn tree_with_comments(node: Node<'_, '_>) -> Self {
        Self {
            nodes: node.descendants().map(|n| n.id()).collect(),
        }
    }

    /// Remove `node` and all of its descendants.
    pub fn remove_subtree(&mut self, node: Node<'_, '_>) {
        for n in node.descendants() {
            self.nodes.remove(&n.id());
        }
    }

    /// Drop comment nodes from the set.
    pub fn remove_comments(&mut self, doc: &Document<'_>) {
        for n in doc.descendants().filter(|n| n.is_comment()) {
            self.nodes.remove(&n.id());
        }
    }

    pub fn insert(&mut self, id: NodeId) {
        self.nodes.insert(id);
    }

    /// Check if a node is in this set.
    pub fn contains(&self, node: Node<'_, '_>) -> bool {
        self.nodes.contains(&node.id())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = "<r><!--c--><a><b>t</b></a><s><x/></s></r>";

    #[test]
    fn test_all_and_without_comments() {
        let doc = crate::parse(XML).unwrap();
        let all = NodeSet::all(&doc);
        let no_comments = NodeSet::all_without_comments(&doc);
        assert_eq!(all.len(), no_comments.len() + 1);
        let comment = doc.descendants().find(|n| n.is_comment()).unwrap();
        assert!(all.contains(comment));
        assert!(!no_comments.contains(comment));
    }

    #[test]
    fn test_remove_subtree() {
        let doc = crate::parse(XML).unwrap();
        let mut set = NodeSet::all_without_comments(&doc);
        let s = doc.descendants().find(|n| n.has_tag_name("s")).unwrap();
        set.remove_subtree(s);
        assert!(!set.contains(s));
        assert!(!set.contains(s.first_child().unwrap()));
        assert!(set.contains(doc.root_element()));
    }

    #[test]
    fn test_tree_without_comments() {
        let doc = crate::parse(XML).unwrap();
        let a = doc.descendants().find(|n| n.has_tag_name("a")).unwrap();
        let set = NodeSet::tree_without_comments(a);
        // a, b and the text node
        assert_eq!(set.len(), 3);
        assert!(!set.contains(doc.root_element()));
    }
}
