#![forbid(unsafe_code)]

use std::path::PathBuf;

/// Coarse classification of an [`Error`], used by callers that only need
/// to know which operator action fixes the problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad keystore path or credential, no usable key or certificate,
    /// invalid option combination.
    Configuration,
    /// Input XML not well-formed, referenced Id missing or ambiguous.
    Format,
    /// Digest or signature computation failed, unsupported algorithm.
    Cryptographic,
    /// Unable to read input or write output.
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Configuration => "configuration error",
            Self::Format => "format error",
            Self::Cryptographic => "cryptographic error",
            Self::Io => "I/O error",
        };
        f.write_str(s)
    }
}

/// Errors produced by the sellado signing pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("invalid XML structure: {0}")]
    XmlStructure(String),

    #[error("element with Id '{0}' not found")]
    IdNotFound(String),

    #[error("duplicate Id '{0}' in document")]
    DuplicateId(String),

    #[error("invalid URI reference: {0}")]
    InvalidUri(String),

    #[error("missing required element: {0}")]
    MissingElement(String),

    #[error("missing required attribute: {0}")]
    MissingAttribute(String),

    #[error("base64 decode error: {0}")]
    Base64(String),

    #[error("transform error: {0}")]
    Transform(String),

    #[error("canonicalization error: {0}")]
    Canonicalization(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("cryptographic error: {0}")]
    Crypto(String),

    #[error("key error: {0}")]
    Key(String),

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("keystore {path}: {reason}")]
    KeyStore { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::XmlParse(_)
            | Self::XmlStructure(_)
            | Self::IdNotFound(_)
            | Self::DuplicateId(_)
            | Self::InvalidUri(_)
            | Self::MissingElement(_)
            | Self::MissingAttribute(_)
            | Self::Base64(_)
            | Self::Transform(_)
            | Self::Canonicalization(_) => ErrorKind::Format,
            Self::UnsupportedAlgorithm(_) | Self::Crypto(_) => ErrorKind::Cryptographic,
            Self::Key(_) | Self::Certificate(_) | Self::KeyStore { .. } | Self::Config(_) => {
                ErrorKind::Configuration
            }
            Self::Io(_) | Self::File { .. } => ErrorKind::Io,
        }
    }

    /// Wrap an I/O error with the path it concerns.
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::File {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
