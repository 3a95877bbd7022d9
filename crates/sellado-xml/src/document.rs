#![forbid(unsafe_code)]

//! XML document wrapper over roxmltree with ID attribute registration.

use sellado_core::Error;
use std::collections::HashMap;

/// Attribute names registered as identifiers on every document.
pub const DEFAULT_ID_ATTRS: [&str; 3] = ["Id", "ID", "id"];

/// An owned XML document.  Stores the text and pre-computed metadata.
///
/// To work with the parsed tree, call [`XmlDocument::parse_doc`] which
/// returns a temporary `roxmltree::Document` borrowing from the text.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    text: String,
    /// Additional ID attribute names to register (beyond `Id`, `ID`, `id`).
    extra_id_attrs: Vec<String>,
}

impl XmlDocument {
    /// Parse and validate XML from a string, taking ownership.
    ///
    /// A leading byte order mark is dropped.
    pub fn parse(text: String) -> Result<Self, Error> {
        let text = match text.strip_prefix('\u{feff}') {
            Some(rest) => rest.to_owned(),
            None => text,
        };
        crate::parse(&text)?;
        Ok(Self {
            text,
            extra_id_attrs: Vec::new(),
        })
    }

    /// Get the raw XML text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Register additional ID attribute names (e.g., `"id_comprobante"`).
    pub fn add_id_attr(&mut self, name: &str) {
        if !self.extra_id_attrs.iter().any(|a| a == name) {
            self.extra_id_attrs.push(name.to_owned());
        }
    }

    /// The extra ID attribute names registered on this document.
    pub fn extra_id_attrs(&self) -> &[String] {
        &self.extra_id_attrs
    }

    /// Parse the document and return a temporary `roxmltree::Document`.
    pub fn parse_doc(&self) -> Result<roxmltree::Document<'_>, Error> {
        crate::parse(&self.text)
    }

    /// Build the ID → NodeId mapping for a parsed document.
    pub fn build_id_map(&self, doc: &roxmltree::Document<'_>) -> Result<IdMap, Error> {
        IdMap::build(doc, &self.extra_id_attrs)
    }

    /// Find the first descendant element with the given local name and namespace.
    pub fn find_element<'a, 'input>(
        doc: &'a roxmltree::Document<'input>,
        ns: &str,
        local_name: &str,
    ) -> Option<roxmltree::Node<'a, 'input>> {
        doc.descendants().find(|n| is_element_named(*n, ns, local_name))
    }
}

/// Whether `node` is an element with the given namespace and local name.
pub fn is_element_named(node: roxmltree::Node<'_, '_>, ns: &str, local_name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == local_name
        && node.tag_name().namespace().unwrap_or("") == ns
}

/// Mapping from identifier values to the elements carrying them.
///
/// Building the map fails when one value is carried by two different
/// elements: a same-document reference to it would be ambiguous.
#[derive(Debug, Clone, Default)]
pub struct IdMap {
    ids: HashMap<String, roxmltree::NodeId>,
}

impl IdMap {
    /// Scan every element of `doc` for the default ID attributes plus `extra`.
    pub fn build(doc: &roxmltree::Document<'_>, extra: &[String]) -> Result<Self, Error> {
        let mut ids: HashMap<String, roxmltree::NodeId> = HashMap::new();
        for node in doc.descendants().filter(|n| n.is_element()) {
            let names = DEFAULT_ID_ATTRS
                .iter()
                .copied()
                .chain(extra.iter().map(String::as_str));
            for attr_name in names {
                if let Some(val) = node.attribute(attr_name) {
                    match ids.get(val) {
                        Some(existing) if *existing != node.id() => {
                            return Err(Error::DuplicateId(val.to_owned()));
                        }
                        _ => {
                            ids.insert(val.to_owned(), node.id());
                        }
                    }
                }
            }
        }
        Ok(Self { ids })
    }

    /// Look up the node carrying `id`.
    pub fn get(&self, id: &str) -> Option<roxmltree::NodeId> {
        self.ids.get(id).copied()
    }

    /// Whether `id` is already in use.
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains_key(id)
    }

    /// Resolve `id` to a node of `doc`.
    pub fn find<'a, 'input>(
        &self,
        doc: &'a roxmltree::Document<'input>,
        id: &str,
    ) -> Option<roxmltree::Node<'a, 'input>> {
        doc.get_node(self.get(id)?)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
