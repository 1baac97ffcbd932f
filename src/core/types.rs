//! Core type definitions used throughout blobsniff.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Structural kind of a file, as decided from its content rather than its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// GZIP compressed stream
    Gzip,
    /// BZIP2 compressed stream
    Bzip2,
    /// ZIP archive
    Zip,
    /// TAR archive (plain or compressed)
    Tar,
    /// Recognized image format
    Image,
    /// Binary data of no recognized format
    Binary,
    /// Plain text
    Text,
    /// Empty or unreadable
    Unknown,
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileKind::Gzip => write!(f, "GZIP Compressed"),
            FileKind::Bzip2 => write!(f, "BZIP2 Compressed"),
            FileKind::Zip => write!(f, "ZIP Archive"),
            FileKind::Tar => write!(f, "TAR Archive"),
            FileKind::Image => write!(f, "Image"),
            FileKind::Binary => write!(f, "Binary Data"),
            FileKind::Text => write!(f, "Plain Text"),
            FileKind::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Markup construct that can execute script or redirect when rendered.
///
/// Variants are listed in the order the scanner evaluates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkupRule {
    /// `<a ... href ...>`
    AnchorHref,
    /// `<iframe>`
    Iframe,
    /// `<frameset>`
    Frameset,
    /// `<meta>` (refresh/redirect injection)
    Meta,
    /// `<script>`
    Script,
}

impl MarkupRule {
    /// All rules in evaluation order.
    pub const ALL: [MarkupRule; 5] = [
        MarkupRule::AnchorHref,
        MarkupRule::Iframe,
        MarkupRule::Frameset,
        MarkupRule::Meta,
        MarkupRule::Script,
    ];

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkupRule::AnchorHref => "anchor_href",
            MarkupRule::Iframe => "iframe",
            MarkupRule::Frameset => "frameset",
            MarkupRule::Meta => "meta",
            MarkupRule::Script => "script",
        }
    }
}

impl std::fmt::Display for MarkupRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a check produced the verdict it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "rule")]
pub enum VerdictReason {
    /// Magic bytes or container structure did not match
    NotFormat,
    /// The source could not be opened or read
    Unreadable,
    /// Format matched and the content scan was skipped on request
    ContentNotChecked,
    /// Decompressed payload carries a known binary signature
    KnownBinaryPayload,
    /// Format matched but the payload failed to decompress or parse
    Corrupt,
    /// Payload contains renderable markup
    UnsafeMarkup(MarkupRule),
    /// Payload was scanned and nothing was found
    Clean,
}

/// Outcome of a per-format check.
///
/// `is_format == false` always implies `is_safe == false`. A matching format
/// with `is_safe == false` means "do not trust this blob", whether the payload
/// was corrupt or carried markup; `reason` tells the two apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// The source matched the format
    pub is_format: bool,
    /// The content is valid and carries no unsafe markup
    pub is_safe: bool,
    /// Diagnostic reason
    pub reason: Option<VerdictReason>,
}

impl Verdict {
    /// Format did not match.
    pub fn not_format() -> Self {
        Self {
            is_format: false,
            is_safe: false,
            reason: Some(VerdictReason::NotFormat),
        }
    }

    /// Source could not be read at all.
    pub fn unreadable() -> Self {
        Self {
            is_format: false,
            is_safe: false,
            reason: Some(VerdictReason::Unreadable),
        }
    }

    /// Format matched and content is acceptable.
    pub fn safe(reason: VerdictReason) -> Self {
        Self {
            is_format: true,
            is_safe: true,
            reason: Some(reason),
        }
    }

    /// Format matched but the payload is corrupt.
    pub fn corrupt() -> Self {
        Self {
            is_format: true,
            is_safe: false,
            reason: Some(VerdictReason::Corrupt),
        }
    }

    /// Format matched but the payload carries markup.
    pub fn unsafe_markup(rule: MarkupRule) -> Self {
        Self {
            is_format: true,
            is_safe: false,
            reason: Some(VerdictReason::UnsafeMarkup(rule)),
        }
    }

    /// The verdict as a plain `(is_format, is_safe)` pair.
    pub fn as_pair(&self) -> (bool, bool) {
        (self.is_format, self.is_safe)
    }
}

impl From<Verdict> for (bool, bool) {
    fn from(verdict: Verdict) -> Self {
        verdict.as_pair()
    }
}

/// Everything the classifier can say about one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Path that was classified
    pub path: PathBuf,
    /// Overall structural kind
    pub kind: FileKind,
    /// GZIP check
    pub gzip: Verdict,
    /// BZIP2 check
    pub bz2: Verdict,
    /// ZIP check
    pub zip: Verdict,
    /// ZIP holds at most one regular member
    pub single_file_zip: bool,
    /// TAR check
    pub tar: bool,
    /// Image check
    pub image: bool,
    /// Binary heuristic over the raw prefix
    pub binary: bool,
    /// Raw (uncompressed) content carries markup
    pub html: bool,
}

impl ClassificationReport {
    /// Check if any content check flagged the file.
    pub fn is_flagged(&self) -> bool {
        self.html
            || [self.gzip, self.bz2, self.zip]
                .iter()
                .any(|v| v.is_format && !v.is_safe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_format_is_never_safe() {
        assert_eq!(Verdict::not_format().as_pair(), (false, false));
        assert_eq!(Verdict::unreadable().as_pair(), (false, false));
    }

    #[test]
    fn test_corrupt_and_unsafe_share_pair() {
        let corrupt = Verdict::corrupt();
        let markup = Verdict::unsafe_markup(MarkupRule::Script);
        assert_eq!(corrupt.as_pair(), markup.as_pair());
        assert_ne!(corrupt.reason, markup.reason);
    }

    #[test]
    fn test_verdict_into_pair() {
        let pair: (bool, bool) = Verdict::safe(VerdictReason::Clean).into();
        assert_eq!(pair, (true, true));
    }

    #[test]
    fn test_reason_serialization() {
        let reason = VerdictReason::UnsafeMarkup(MarkupRule::Iframe);
        let json = serde_json::to_string(&reason).unwrap();
        assert_eq!(json, r#"{"reason":"unsafe_markup","rule":"iframe"}"#);
    }
}
