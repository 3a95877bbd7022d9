#![forbid(unsafe_code)]

//! A minimal XML writer for building signature markup.
//!
//! Output is compact: no indentation and no whitespace text between
//! elements, so the generated subtree canonicalizes without surprises.

/// Streaming writer producing XML text into a `String`.
#[derive(Debug, Default)]
pub struct XmlWriter {
    out: String,
    open: Vec<String>,
}

impl XmlWriter {
    /// Create a new XML writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the XML declaration.
    pub fn write_declaration(&mut self) {
        self.out
            .push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
    }

    /// Start an element with the given name and attributes.
    pub fn start_element(&mut self, name: &str, attrs: &[(&str, &str)]) {
        self.write_tag(name, attrs);
        self.out.push('>');
        self.open.push(name.to_owned());
    }

    /// Write an empty element (self-closing).
    pub fn empty_element(&mut self, name: &str, attrs: &[(&str, &str)]) {
        self.write_tag(name, attrs);
        self.out.push_str("/>");
    }

    /// End the most recently started element.
    pub fn end_element(&mut self) {
        if let Some(name) = self.open.pop() {
            self.out.push_str("</");
            self.out.push_str(&name);
            self.out.push('>');
        }
    }

    /// Write escaped text content.
    pub fn write_text(&mut self, text: &str) {
        for c in text.chars() {
            match c {
                '&' => self.out.push_str("&amp;"),
                '<' => self.out.push_str("&lt;"),
                '>' => self.out.push_str("&gt;"),
                '\r' => self.out.push_str("&#xD;"),
                _ => self.out.push(c),
            }
        }
    }

    /// Finish writing, closing any element still open.
    pub fn into_string(mut self) -> String {
        while !self.open.is_empty() {
            self.end_element();
        }
        self.out
    }

    fn write_tag(&mut self, name: &str, attrs: &[(&str, &str)]) {
        self.out.push('<');
        self.out.push_str(name);
        for (k, v) in attrs {
            self.out.push(' ');
            self.out.push_str(k);
            self.out.push_str("=\"");
            escape_attr_into(&mut self.out, v);
            self.out.push('"');
        }
    }
}

fn escape_attr_into(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_with_escaping() {
        let mut w = XmlWriter::new();
        w.start_element("ds:Object", &[("Id", "a\"b")]);
        w.empty_element("x", &[]);
        w.write_text("1 < 2 & 3");
        w.end_element();
        assert_eq!(
            w.into_string(),
            r#"<ds:Object Id="a&quot;b"><x/>1 &lt; 2 &amp; 3</ds:Object>"#
        );
    }

    #[test]
    fn test_into_string_closes_open_elements() {
        let mut w = XmlWriter::new();
        w.write_declaration();
        w.start_element("a", &[]);
        w.start_element("b", &[]);
        assert_eq!(
            w.into_string(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><a><b></b></a>"
        );
    }
}
