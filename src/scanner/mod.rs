//! File classification.
//!
//! This module provides:
//! - Magic byte and container structure detection
//! - Bounded peeks into gzip, bzip2 and zip payloads
//! - Per-format checks returning a verdict pair

pub mod archive;
pub mod classifier;
pub mod filetype;

#[cfg(test)]
pub(crate) mod fixtures;

pub use archive::{ArchiveMember, Compression, ContainerReader, StreamPeek, ZipMembers};
pub use classifier::Classifier;
pub use filetype::{ByteSignature, MagicMatcher, BZIP2_MAGIC, GZIP_MAGIC};
