#![forbid(unsafe_code)]

//! XML document abstraction for sellado.
//!
//! Provides a thin layer over `roxmltree`: owned documents with Id
//! registration, node sets for canonicalization and transforms, recovery
//! of qualified names from the source text, and a small writer plus an
//! owned element tree for building signature markup.

pub mod document;
pub mod element;
pub mod nodeset;
pub mod qname;
pub mod writer;
pub mod xpath;

pub use document::{IdMap, XmlDocument};
pub use element::Element;
pub use nodeset::NodeSet;

/// Return roxmltree parsing options that allow DTD.
///
/// roxmltree only expands internal entities and never fetches external
/// ones, so an internal subset in an invoice is harmless.
pub fn parsing_options() -> roxmltree::ParsingOptions {
    roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    }
}

/// Parse `text` with [`parsing_options`], mapping failures to a format error.
pub fn parse(text: &str) -> Result<roxmltree::Document<'_>, sellado_core::Error> {
    roxmltree::Document::parse_with_options(text, parsing_options())
        .map_err(|e| sellado_core::Error::XmlParse(e.to_string()))
}
