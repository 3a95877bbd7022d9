#![forbid(unsafe_code)]

//! XML Canonicalization (C14N) for sellado.
//!
//! Implements the four W3C variants used by XML-DSig signers:
//! - Canonical XML 1.0 (with and without comments)
//! - Exclusive Canonical XML 1.0 (with and without comments)

pub mod escape;
pub mod exclusive;
pub mod inclusive;
pub mod render;

use std::str::FromStr;

use sellado_core::{algorithm, Error};
use sellado_xml::NodeSet;

/// The canonicalization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum C14nMode {
    /// Canonical XML 1.0
    #[default]
    Inclusive,
    /// Canonical XML 1.0 with comments
    InclusiveWithComments,
    /// Exclusive Canonical XML 1.0
    Exclusive,
    /// Exclusive Canonical XML 1.0 with comments
    ExclusiveWithComments,
}

impl C14nMode {
    /// Get the algorithm URI for this mode.
    pub fn uri(&self) -> &'static str {
        match self {
            Self::Inclusive => algorithm::C14N,
            Self::InclusiveWithComments => algorithm::C14N_WITH_COMMENTS,
            Self::Exclusive => algorithm::EXC_C14N,
            Self::ExclusiveWithComments => algorithm::EXC_C14N_WITH_COMMENTS,
        }
    }

    /// Parse a C14N mode from an algorithm URI.
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            algorithm::C14N => Some(Self::Inclusive),
            algorithm::C14N_WITH_COMMENTS => Some(Self::InclusiveWithComments),
            algorithm::EXC_C14N => Some(Self::Exclusive),
            algorithm::EXC_C14N_WITH_COMMENTS => Some(Self::ExclusiveWithComments),
            _ => None,
        }
    }

    pub fn with_comments(&self) -> bool {
        matches!(self, Self::InclusiveWithComments | Self::ExclusiveWithComments)
    }

    pub fn is_exclusive(&self) -> bool {
        matches!(self, Self::Exclusive | Self::ExclusiveWithComments)
    }
}

impl FromStr for C14nMode {
    type Err = Error;

    /// Accepts `inclusive`, `exclusive` (optionally suffixed with
    /// `-with-comments`) or a full algorithm URI.
    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_ascii_lowercase().as_str() {
            "inclusive" | "c14n" => Ok(Self::Inclusive),
            "inclusive-with-comments" => Ok(Self::InclusiveWithComments),
            "exclusive" | "exc-c14n" => Ok(Self::Exclusive),
            "exclusive-with-comments" => Ok(Self::ExclusiveWithComments),
            _ => Self::from_uri(s).ok_or_else(|| Error::UnsupportedAlgorithm(s.to_owned())),
        }
    }
}

/// Canonicalize an XML document given as text.
///
/// - `xml`: the raw XML text
/// - `mode`: which C14N variant to use
/// - `node_set`: optional node set (for document-subset canonicalization)
/// - `inclusive_prefixes`: for exclusive C14N, the InclusiveNamespaces PrefixList
pub fn canonicalize(
    xml: &str,
    mode: C14nMode,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    let doc = sellado_xml::parse(xml)?;
    canonicalize_doc(&doc, mode, node_set, inclusive_prefixes)
}

/// Canonicalize a pre-parsed document.
pub fn canonicalize_doc(
    doc: &roxmltree::Document<'_>,
    mode: C14nMode,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    let out = if mode.is_exclusive() {
        exclusive::canonicalize(doc, mode.with_comments(), node_set, inclusive_prefixes)?
    } else {
        inclusive::canonicalize(doc, mode.with_comments(), node_set)?
    };
    log::trace!("{} produced {} bytes", mode.uri(), out.len());
    Ok(out)
}

/// Canonicalize the subtree rooted at `node` (comments excluded unless
/// the mode keeps them), with the namespace context of its position.
pub fn canonicalize_subtree(
    node: roxmltree::Node<'_, '_>,
    mode: C14nMode,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    let set = if mode.with_comments() {
        NodeSet::tree_with_comments(node)
    } else {
        NodeSet::tree_without_comments(node)
    };
    canonicalize_doc(node.document(), mode, Some(&set), inclusive_prefixes)
}
