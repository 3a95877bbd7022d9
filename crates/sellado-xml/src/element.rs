#![forbid(unsafe_code)]

//! Owned element tree used to assemble signature markup before it is
//! spliced into a document.

use crate::writer::XmlWriter;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Content {
    Element(Element),
    Text(String),
}

/// An element with attributes and ordered children, built by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Content>,
}

impl Element {
    /// A new element with the qualified name `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Add an attribute. Attributes are written in insertion order.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    /// Add an attribute when `value` is present.
    pub fn attr_opt(self, name: impl Into<String>, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.attr(name, v),
            None => self,
        }
    }

    /// Append a child element.
    pub fn child(mut self, child: Element) -> Self {
        self.children.push(Content::Element(child));
        self
    }

    /// Append a child element when present.
    pub fn child_opt(self, child: Option<Element>) -> Self {
        match child {
            Some(c) => self.child(c),
            None => self,
        }
    }

    /// Append text content.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Content::Text(text.into()));
        self
    }

    /// Append a child element in place.
    pub fn push(&mut self, child: Element) {
        self.children.push(Content::Element(child));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value of the attribute with qualified name `name`.
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Child elements in document order.
    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|c| match c {
            Content::Element(e) => Some(e),
            Content::Text(_) => None,
        })
    }

    /// Serialize into `w`.
    pub fn write(&self, w: &mut XmlWriter) {
        let attrs: Vec<(&str, &str)> = self
            .attrs
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        if self.children.is_empty() {
            w.empty_element(&self.name, &attrs);
            return;
        }
        w.start_element(&self.name, &attrs);
        for c in &self.children {
            match c {
                Content::Element(e) => e.write(w),
                Content::Text(t) => w.write_text(t),
            }
        }
        w.end_element();
    }

    /// Serialize to a string.
    pub fn to_xml(&self) -> String {
        let mut w = XmlWriter::new();
        self.write(&mut w);
        w.into_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_and_serialize() {
        let el = Element::new("ds:Reference")
            .attr("URI", "")
            .child(Element::new("ds:DigestMethod").attr("Algorithm", "urn:sha"))
            .child(Element::new("ds:DigestValue").text("abc="))
            .child_opt(None);
        assert_eq!(
            el.to_xml(),
            r#"<ds:Reference URI=""><ds:DigestMethod Algorithm="urn:sha"/><ds:DigestValue>abc=</ds:DigestValue></ds:Reference>"#
        );
        assert_eq!(el.get_attr("URI"), Some(""));
        assert_eq!(el.children().count(), 2);
    }
}
