//! Content screening.
//!
//! Line-bounded pattern rules for markup that could execute script or
//! redirect a browser if the file were rendered as HTML.

pub mod markup;

pub use markup::MarkupScanner;
