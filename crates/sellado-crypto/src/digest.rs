#![forbid(unsafe_code)]

//! Digest (hash) algorithm implementations.

use std::fmt;
use std::str::FromStr;

use digest::Digest;
use sellado_core::{algorithm, Error};

/// Trait for streaming digest algorithms.
pub trait DigestAlgorithm: Send {
    /// Feed data into the hash.
    fn update(&mut self, data: &[u8]);
    /// Finalize and return the hash value.
    fn finalize(self: Box<Self>) -> Vec<u8>;
    /// Algorithm URI.
    fn uri(&self) -> &'static str;
}

/// The digest algorithms a signature may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DigestMethod {
    /// Legacy 160-bit hash, still demanded by some regulator profiles.
    Sha1,
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl DigestMethod {
    pub fn uri(&self) -> &'static str {
        match self {
            Self::Sha1 => algorithm::SHA1,
            Self::Sha256 => algorithm::SHA256,
            Self::Sha384 => algorithm::SHA384,
            Self::Sha512 => algorithm::SHA512,
        }
    }

    pub fn from_uri(uri: &str) -> Result<Self, Error> {
        match uri {
            algorithm::SHA1 => Ok(Self::Sha1),
            algorithm::SHA256 => Ok(Self::Sha256),
            algorithm::SHA384 => Ok(Self::Sha384),
            algorithm::SHA512 => Ok(Self::Sha512),
            _ => Err(Error::UnsupportedAlgorithm(format!("digest algorithm: {uri}"))),
        }
    }

    /// Short lowercase name (`sha256`).
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// Output length in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// A fresh streaming hasher.
    pub fn hasher(&self) -> Box<dyn DigestAlgorithm> {
        match self {
            Self::Sha1 => Box::new(Sha1Digest::new()),
            Self::Sha256 => Box::new(Sha256Digest::new()),
            Self::Sha384 => Box::new(Sha384Digest::new()),
            Self::Sha512 => Box::new(Sha512Digest::new()),
        }
    }

    /// Hash `data` in one shot.
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        let mut h = self.hasher();
        h.update(data);
        h.finalize()
    }
}

impl fmt::Display for DigestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestMethod {
    type Err = Error;

    /// Accepts `sha1`, `sha-256`, `SHA256`, … or an algorithm URI.
    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            _ => Self::from_uri(s),
        }
    }
}

// ── Concrete implementations ─────────────────────────────────────────

macro_rules! impl_digest {
    ($name:ident, $hasher:ty, $uri:expr) => {
        struct $name {
            inner: $hasher,
        }

        impl $name {
            fn new() -> Self {
                Self {
                    inner: <$hasher>::new(),
                }
            }
        }

        impl DigestAlgorithm for $name {
            fn update(&mut self, data: &[u8]) {
                Digest::update(&mut self.inner, data);
            }

            fn finalize(self: Box<Self>) -> Vec<u8> {
                Digest::finalize(self.inner).to_vec()
            }

            fn uri(&self) -> &'static str {
                $uri
            }
        }
    };
}

impl_digest!(Sha1Digest, sha1::Sha1, algorithm::SHA1);
impl_digest!(Sha256Digest, sha2::Sha256, algorithm::SHA256);
impl_digest!(Sha384Digest, sha2::Sha384, algorithm::SHA384);
impl_digest!(Sha512Digest, sha2::Sha512, algorithm::SHA512);

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn test_sha256() {
        let result = DigestMethod::from_uri(algorithm::SHA256).unwrap().digest(b"hello");
        assert_eq!(
            hex(&result),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_sha1() {
        let result = DigestMethod::Sha1.digest(b"hello");
        assert_eq!(hex(&result), "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d");
    }

    #[test]
    fn test_lengths_and_uris() {
        for m in [
            DigestMethod::Sha1,
            DigestMethod::Sha256,
            DigestMethod::Sha384,
            DigestMethod::Sha512,
        ] {
            assert_eq!(m.digest(b"x").len(), m.output_len());
            assert_eq!(DigestMethod::from_uri(m.uri()).unwrap(), m);
            assert_eq!(m.hasher().uri(), m.uri());
        }
    }

    #[test]
    fn test_streaming_matches_one_shot() {
        let mut h = DigestMethod::Sha384.hasher();
        h.update(b"hel");
        h.update(b"lo");
        assert_eq!(h.finalize(), DigestMethod::Sha384.digest(b"hello"));
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("SHA-256".parse::<DigestMethod>().unwrap(), DigestMethod::Sha256);
        assert_eq!("sha1".parse::<DigestMethod>().unwrap(), DigestMethod::Sha1);
        let err = "md5".parse::<DigestMethod>().unwrap_err();
        assert_eq!(err.kind(), sellado_core::ErrorKind::Cryptographic);
        assert!(err.to_string().contains("md5"));
    }

    #[test]
    fn test_default_is_sha256() {
        assert_eq!(DigestMethod::default(), DigestMethod::Sha256);
    }
}
