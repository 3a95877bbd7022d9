#![forbid(unsafe_code)]

//! Splicing the signature into the input text and writing the result.
//!
//! Every byte of the input outside the insertion point is preserved.

use std::io::Write;
use std::path::Path;

use roxmltree::Document;
use sellado_core::Error;

/// Where the signature goes: just before the root element's end tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Splice {
    offset: usize,
    /// Root written as `<root/>`: the `/>` is replaced by an explicit
    /// start/end pair around the signature.
    self_closing: Option<String>,
}

impl Splice {
    /// Locate the insertion point in `doc`, parsed from `text`.
    pub fn locate(doc: &Document<'_>, text: &str) -> Result<Self, Error> {
        let root = doc.root_element();
        let range = root.range();
        let element = text
            .get(range.clone())
            .ok_or_else(|| Error::XmlStructure("root element range outside document".into()))?;

        if element.ends_with("/>") {
            let qname = sellado_xml::qname::element_qname(root).into_owned();
            return Ok(Self {
                offset: range.end - 2,
                self_closing: Some(qname),
            });
        }
        let end_tag = element
            .rfind("</")
            .ok_or_else(|| Error::XmlStructure("root element has no end tag".into()))?;
        Ok(Self {
            offset: range.start + end_tag,
            self_closing: None,
        })
    }

    /// `text` with `signature` inserted as the root's last child.
    pub fn apply(&self, text: &str, signature: &str) -> String {
        let (head, tail) = text.split_at(self.offset);
        let mut out = String::with_capacity(text.len() + signature.len() + 16);
        out.push_str(head);
        match &self.self_closing {
            Some(qname) => {
                out.push('>');
                out.push_str(signature);
                out.push_str("</");
                out.push_str(qname);
                out.push('>');
                out.push_str(&tail[2..]);
            }
            None => {
                out.push_str(signature);
                out.push_str(tail);
            }
        }
        out
    }
}

/// Write `contents` to `path` atomically: a temporary file in the same
/// directory is renamed over the destination once fully written.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), Error> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| Error::file(dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::file(dir, e))?;
    tmp.write_all(contents)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| Error::file(path, e))?;
    tmp.persist(path).map_err(|e| Error::file(path, e.error))?;
    log::debug!("wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}
