//! blobsniff: content classification and markup screening for uploaded files
//!
//! Given a path, decides whether the file is gzip, bzip2, zip, tar, an image,
//! binary or text from its bytes alone, and peeks into compressed payloads for
//! embedded HTML that could turn into stored XSS if the file were later
//! rendered. Every read is bounded by a byte window, a line budget or a member
//! count.

pub mod core;
pub mod detection;
pub mod scanner;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use crate::core::config::{ClassifierConfig, Config};
pub use crate::core::error::{Error, Result};
pub use crate::core::types::*;
pub use crate::scanner::Classifier;
