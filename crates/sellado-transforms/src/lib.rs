#![forbid(unsafe_code)]

//! Transform pipeline for sellado references.
//!
//! Each reference carries a sequence of transforms applied in order to
//! the node set its URI selects; the result is the octet stream that
//! gets digested.

pub mod enveloped;
pub mod pipeline;
pub mod uri;

pub use enveloped::EnvelopedSignatureTransform;
pub use pipeline::{C14nTransform, Transform, TransformData, TransformPipeline};
