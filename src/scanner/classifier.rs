//! Per-format checks combining magic matching, bounded peeks and markup scanning.
//!
//! Every check returns a [`Verdict`] or a plain boolean. Errors from the
//! lower layers are logged and folded into the verdict: an unreadable source
//! or mismatched signature is "not this format", a matching source whose
//! payload cannot be decoded is "format, not safe".

use crate::core::config::ClassifierConfig;
use crate::core::error::{Error, Result};
use crate::core::types::{ClassificationReport, FileKind, Verdict, VerdictReason};
use crate::detection::markup::MarkupScanner;
use crate::scanner::archive::{Compression, ContainerReader, StreamPeek};
use crate::scanner::filetype::MagicMatcher;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Stateless classifier for files of unknown provenance.
///
/// Holds only its bounds and compiled patterns, so one instance can be shared
/// across threads checking independent files.
#[derive(Debug, Clone)]
pub struct Classifier {
    config: ClassifierConfig,
    reader: ContainerReader,
    scanner: MarkupScanner,
}

impl Classifier {
    /// Create a classifier with the default bounds.
    pub fn new() -> Result<Self> {
        Self::with_config(ClassifierConfig::default())
    }

    /// Create a classifier with explicit bounds.
    pub fn with_config(config: ClassifierConfig) -> Result<Self> {
        config.validate()?;

        let reader = ContainerReader::new().with_window(config.peek_window_bytes);
        let scanner =
            MarkupScanner::with_limits(config.html_check_lines, config.max_line_bytes)?;

        Ok(Self {
            config,
            reader,
            scanner,
        })
    }

    /// Bounds in effect.
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    // ===== Compressed streams =====

    /// Check for a gzip file and, optionally, markup inside it.
    pub fn check_gzip(&self, path: &Path, check_content: bool) -> Verdict {
        self.check_compressed(path, Compression::Gzip, check_content)
    }

    /// Check for a bzip2 file and, optionally, markup inside it.
    pub fn check_bz2(&self, path: &Path, check_content: bool) -> Verdict {
        self.check_compressed(path, Compression::Bzip2, check_content)
    }

    fn check_compressed(
        &self,
        path: &Path,
        compression: Compression,
        check_content: bool,
    ) -> Verdict {
        let signature = compression.signature();
        let prefix = match MagicMatcher::read_prefix(path, signature.bytes.len()) {
            Ok(prefix) => prefix,
            Err(e) => {
                log::debug!("Cannot read {:?} for {} check: {}", path, compression, e);
                return Verdict::unreadable();
            }
        };

        if !signature.matches(&prefix) {
            return Verdict::not_format();
        }

        if !check_content {
            return Verdict::safe(VerdictReason::ContentNotChecked);
        }

        match self.reader.peek_compressed(path, compression) {
            Ok(StreamPeek::NotFormat) => Verdict::not_format(),
            Ok(StreamPeek::KnownBinary) => Verdict::safe(VerdictReason::KnownBinaryPayload),
            Ok(StreamPeek::Content(chunk)) => self.verdict_for_chunk(path, &chunk),
            Err(e) if e.is_recoverable() => {
                log::warn!(
                    "{} signature matched but payload is unreadable: {}",
                    compression,
                    e
                );
                Verdict::corrupt()
            }
            Err(e) => {
                log::debug!("{}", e);
                Verdict::unreadable()
            }
        }
    }

    fn verdict_for_chunk(&self, path: &Path, chunk: &[u8]) -> Verdict {
        match self.scanner.scan_chunk(chunk) {
            Some(rule) => {
                log::info!("Embedded {} markup in {:?}", rule, path);
                Verdict::unsafe_markup(rule)
            }
            None => Verdict::safe(VerdictReason::Clean),
        }
    }

    // ===== Zip archives =====

    /// Check for a zip archive and, optionally, markup in its first members.
    ///
    /// Scans at most `files + 1` regular members. Empty members are skipped
    /// without scanning but still count toward the bound.
    pub fn check_zip(&self, path: &Path, check_content: bool, files: usize) -> Verdict {
        let mut members = match self.reader.zip_members(path) {
            Ok(members) => members,
            Err(e @ Error::FileOpen { .. }) => {
                log::debug!("{}", e);
                return Verdict::unreadable();
            }
            Err(e) => {
                log::trace!("{}", e);
                return Verdict::not_format();
            }
        };

        if !check_content {
            return Verdict::safe(VerdictReason::ContentNotChecked);
        }

        let mut scanned = 0usize;
        while let Some(next) = members.next_member() {
            let mut member = match next {
                Ok(member) => member,
                Err(e) => {
                    log::warn!("Zip member unreadable: {}", e);
                    return Verdict::corrupt();
                }
            };

            let chunk = match member.peek(self.config.peek_window_bytes) {
                Ok(chunk) => chunk,
                Err(e) => {
                    log::warn!(
                        "Zip member {} failed to decompress: {}",
                        member.name(),
                        e
                    );
                    return Verdict::corrupt();
                }
            };

            if !chunk.is_empty() {
                if let Some(rule) = self.scanner.scan_chunk(&chunk) {
                    log::info!(
                        "Embedded {} markup in {:?} member {}",
                        rule,
                        path,
                        member.name()
                    );
                    return Verdict::unsafe_markup(rule);
                }
            }

            if scanned >= files {
                break;
            }
            scanned += 1;
        }

        Verdict::safe(VerdictReason::Clean)
    }

    /// Check a zip archive with the configured member bound.
    pub fn check_zip_default(&self, path: &Path) -> Verdict {
        self.check_zip(path, true, self.config.zip_scan_files)
    }

    /// Check whether a zip archive holds at most one regular member.
    ///
    /// Anything that is not a readable zip is `false`.
    pub fn is_single_file_zip(&self, path: &Path) -> bool {
        let result = self
            .reader
            .zip_members(path)
            .map(|members| members.has_at_most_one());

        match result {
            Ok(single) => single,
            Err(e) => {
                log::debug!("Single-file zip check failed: {}", e);
                false
            }
        }
    }

    // ===== Convenience predicates =====

    /// Gzip signature present.
    pub fn is_gzip(&self, path: &Path) -> bool {
        self.check_gzip(path, false).is_format
    }

    /// Bzip2 signature present.
    pub fn is_bz2(&self, path: &Path) -> bool {
        self.check_bz2(path, false).is_format
    }

    /// Zip central directory present.
    pub fn is_zip(&self, path: &Path) -> bool {
        self.check_zip(path, false, 0).is_format
    }

    /// Tar header present (plain, gzip- or bzip2-wrapped).
    pub fn is_tar(&self, path: &Path) -> bool {
        MagicMatcher::is_tar(path)
    }

    /// Recognized image format.
    pub fn check_image(&self, path: &Path) -> bool {
        let prefix = match MagicMatcher::read_prefix(path, self.config.image_prefix_bytes) {
            Ok(prefix) => prefix,
            Err(e) => {
                log::debug!("{}", e);
                return false;
            }
        };

        match imagesize::image_type(&prefix) {
            Ok(image_type) => {
                log::trace!("{:?} is a {:?} image", path, image_type);
                true
            }
            Err(_) => false,
        }
    }

    // ===== Raw content =====

    /// Binary heuristic over the first bytes of a file.
    pub fn check_binary_path(&self, path: &Path) -> bool {
        match MagicMatcher::read_prefix(path, self.config.binary_prefix_bytes) {
            Ok(prefix) => MagicMatcher::is_binary(&prefix),
            Err(e) => {
                log::debug!("{}", e);
                false
            }
        }
    }

    /// Binary heuristic over the first bytes of an in-memory buffer.
    pub fn check_binary_bytes(&self, bytes: &[u8]) -> bool {
        let end = bytes.len().min(self.config.binary_prefix_bytes);
        MagicMatcher::is_binary(&bytes[..end])
    }

    /// Markup scan over the raw (not decompressed) lines of a file.
    pub fn check_html_path(&self, path: &Path) -> bool {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                log::debug!("{}", Error::file_open(path, e));
                return false;
            }
        };

        match self.scanner.scan_reader(BufReader::new(file)) {
            Ok(found) => found.is_some(),
            Err(e) => {
                log::debug!("{}", Error::file_read(path, e));
                false
            }
        }
    }

    /// Markup scan over an in-memory chunk.
    pub fn check_html_chunk(&self, chunk: &[u8]) -> bool {
        self.scanner.scan_chunk(chunk).is_some()
    }

    /// Markup scan over already-split lines.
    pub fn check_html_lines<I>(&self, lines: I) -> bool
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        self.scanner.is_unsafe(lines)
    }

    // ===== Aggregate =====

    /// Structural kind of a file, from content only.
    ///
    /// Checked in order gzip, bzip2, zip, tar, image; anything left is binary
    /// or text by the NUL heuristic, or unknown when empty or unreadable.
    pub fn classify(&self, path: &Path) -> FileKind {
        if self.is_gzip(path) {
            return FileKind::Gzip;
        }
        if self.is_bz2(path) {
            return FileKind::Bzip2;
        }
        if self.is_zip(path) {
            return FileKind::Zip;
        }
        if self.is_tar(path) {
            return FileKind::Tar;
        }
        if self.check_image(path) {
            return FileKind::Image;
        }

        match MagicMatcher::read_prefix(path, self.config.binary_prefix_bytes) {
            Ok(prefix) if prefix.is_empty() => FileKind::Unknown,
            Ok(prefix) if MagicMatcher::is_binary(&prefix) => FileKind::Binary,
            Ok(_) => FileKind::Text,
            Err(_) => FileKind::Unknown,
        }
    }

    /// Run every check on one file.
    ///
    /// Fails only when the path cannot be opened at all.
    pub fn report(&self, path: &Path) -> Result<ClassificationReport> {
        drop(File::open(path).map_err(|e| Error::file_open(path, e))?);

        let zip = self.check_zip_default(path);
        Ok(ClassificationReport {
            path: path.to_path_buf(),
            kind: self.classify(path),
            gzip: self.check_gzip(path, true),
            bz2: self.check_bz2(path, true),
            single_file_zip: zip.is_format && self.is_single_file_zip(path),
            zip,
            tar: self.is_tar(path),
            image: self.check_image(path),
            binary: self.check_binary_path(path),
            html: self.check_html_path(path),
        })
    }

    /// Like [`report`](Self::report), but only matches formats.
    ///
    /// Nothing is decompressed and no markup scan runs; `html` is `false`.
    pub fn report_formats(&self, path: &Path) -> Result<ClassificationReport> {
        drop(File::open(path).map_err(|e| Error::file_open(path, e))?);

        let zip = self.check_zip(path, false, 0);
        Ok(ClassificationReport {
            path: path.to_path_buf(),
            kind: self.classify(path),
            gzip: self.check_gzip(path, false),
            bz2: self.check_bz2(path, false),
            single_file_zip: zip.is_format && self.is_single_file_zip(path),
            zip,
            tar: self.is_tar(path),
            image: self.check_image(path),
            binary: self.check_binary_path(path),
            html: false,
        })
    }
}
