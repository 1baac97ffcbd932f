//! Bounded views into compressed and archived content.
//!
//! Nothing here materializes a whole payload: compressed streams are read up
//! to a fixed window, and zip members are visited one at a time through a
//! single-pass enumerator that owns the archive handle.

use crate::core::config::DEFAULT_PEEK_WINDOW_BYTES;
use crate::core::error::{Error, Result};
use crate::scanner::filetype::{ByteSignature, BZIP2_MAGIC, GZIP_MAGIC};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use zip::read::ZipFile;
use zip::ZipArchive;

/// Leading bytes of a decompressed SFF (Standard Flowgram Format) payload.
pub const SFF_MAGIC: &[u8] = b".sff";

/// Compression ratio above which a zip member is logged as suspicious.
const SUSPICIOUS_COMPRESSION_RATIO: f64 = 100.0;

/// Single-stream compression formats that can be peeked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Bzip2,
}

impl Compression {
    /// Leading bytes of the compressed stream.
    pub fn signature(&self) -> &'static ByteSignature {
        match self {
            Compression::Gzip => &GZIP_MAGIC,
            Compression::Bzip2 => &BZIP2_MAGIC,
        }
    }

    /// Short name used in errors and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Compression::Gzip => "gzip",
            Compression::Bzip2 => "bzip2",
        }
    }

    /// Whether a decompressed head identifies a payload that never holds markup.
    fn is_known_binary(&self, head: &[u8]) -> bool {
        *self == Compression::Gzip && head.starts_with(SFF_MAGIC)
    }

    fn decoder<R: Read + 'static>(&self, inner: R) -> Box<dyn Read> {
        match self {
            Compression::Gzip => Box::new(PaddedGzDecoder::new(BufReader::new(inner))),
            Compression::Bzip2 => Box::new(bzip2::read::MultiBzDecoder::new(inner)),
        }
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Multi-member gzip reader that stops at trailing NUL padding.
///
/// Block-padded gzip files end with zeros after the last member; those are
/// end of stream, not a malformed next header.
struct PaddedGzDecoder<R: BufRead> {
    member: Option<flate2::bufread::GzDecoder<R>>,
}

impl<R: BufRead> PaddedGzDecoder<R> {
    fn new(inner: R) -> Self {
        Self {
            member: Some(flate2::bufread::GzDecoder::new(inner)),
        }
    }
}

impl<R: BufRead> Read for PaddedGzDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            let mut member = match self.member.take() {
                Some(member) => member,
                None => return Ok(0),
            };

            let read = member.read(buf)?;
            if read > 0 {
                self.member = Some(member);
                return Ok(read);
            }

            let mut inner = member.into_inner();
            if skip_padding(&mut inner)? {
                self.member = Some(flate2::bufread::GzDecoder::new(inner));
            }
        }
    }
}

/// Consume NUL bytes. Returns `true` when non-zero data follows.
fn skip_padding<R: BufRead>(reader: &mut R) -> io::Result<bool> {
    loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            return Ok(false);
        }

        let zeros = available.iter().take_while(|&&b| b == 0).count();
        let more = zeros < available.len();
        reader.consume(zeros);
        if more {
            return Ok(true);
        }
    }
}

/// Result of peeking into a compressed stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamPeek {
    /// Outer signature did not match; nothing was decompressed
    NotFormat,
    /// Decompressed head carries a known binary signature; peek stopped there
    KnownBinary,
    /// Up to one window of decompressed bytes
    Content(Vec<u8>),
}

/// Reader producing bounded, decompressed views of container files.
#[derive(Debug, Clone)]
pub struct ContainerReader {
    window: usize,
}

impl Default for ContainerReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerReader {
    /// Create a reader with the default 32 KiB window.
    pub fn new() -> Self {
        Self {
            window: DEFAULT_PEEK_WINDOW_BYTES,
        }
    }

    /// Set the peek window in bytes.
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    /// Peek window in bytes.
    pub fn window(&self) -> usize {
        self.window
    }

    /// Peek into a gzip file.
    ///
    /// A decompressed head of `.sff` stops the peek with
    /// [`StreamPeek::KnownBinary`] before the rest of the window is read.
    pub fn peek_gzip(&self, path: &Path) -> Result<StreamPeek> {
        self.peek_compressed(path, Compression::Gzip)
    }

    /// Peek into a bzip2 file.
    pub fn peek_bz2(&self, path: &Path) -> Result<StreamPeek> {
        self.peek_compressed(path, Compression::Bzip2)
    }

    /// Check the outer signature, then decompress at most one window.
    ///
    /// A mismatched signature is never handed to a decoder. A corrupt or
    /// truncated stream inside the window is a [`Error::Decompress`].
    pub fn peek_compressed(&self, path: &Path, compression: Compression) -> Result<StreamPeek> {
        let mut file = File::open(path).map_err(|e| Error::file_open(path, e))?;

        let signature = compression.signature();
        let mut magic = Vec::with_capacity(signature.bytes.len());
        (&mut file)
            .take(signature.bytes.len() as u64)
            .read_to_end(&mut magic)
            .map_err(|e| Error::file_read(path, e))?;
        if !signature.matches(&magic) {
            return Ok(StreamPeek::NotFormat);
        }
        file.rewind().map_err(|e| Error::file_read(path, e))?;

        let mut decoder = compression.decoder(file).take(self.window as u64);
        let mut buffer = Vec::with_capacity(self.window.min(DEFAULT_PEEK_WINDOW_BYTES));

        (&mut decoder)
            .take(SFF_MAGIC.len() as u64)
            .read_to_end(&mut buffer)
            .map_err(|e| Error::decompress(path, compression.name(), e))?;
        if compression.is_known_binary(&buffer) {
            log::debug!("Known binary payload in {:?}, skipping content peek", path);
            return Ok(StreamPeek::KnownBinary);
        }

        decoder
            .read_to_end(&mut buffer)
            .map_err(|e| Error::decompress(path, compression.name(), e))?;

        log::trace!(
            "Peeked {} decompressed bytes from {} file {:?}",
            buffer.len(),
            compression,
            path
        );
        Ok(StreamPeek::Content(buffer))
    }

    /// Open a zip archive for member enumeration.
    pub fn zip_members(&self, path: &Path) -> Result<ZipMembers> {
        ZipMembers::open(path)
    }
}

/// Single-pass enumerator over the regular (non-directory) members of a zip.
///
/// The enumerator owns the open archive; dropping it closes the file. Each
/// [`ArchiveMember`] borrows the enumerator mutably, so a member cannot
/// outlive the request for the next one.
pub struct ZipMembers {
    archive: ZipArchive<File>,
    path: PathBuf,
    index: usize,
}

impl ZipMembers {
    /// Open and validate a zip archive.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::file_open(path, e))?;
        let archive = ZipArchive::new(file).map_err(|e| Error::archive(path, e))?;

        Ok(Self {
            archive,
            path: path.to_path_buf(),
            index: 0,
        })
    }

    /// Number of central-directory entries, directories included.
    pub fn entry_count(&self) -> usize {
        self.archive.len()
    }

    /// Advance to the next regular member.
    pub fn next_member(&mut self) -> Option<Result<ArchiveMember<'_>>> {
        while self.index < self.archive.len() {
            let i = self.index;
            self.index += 1;

            let is_dir = match self.archive.by_index_raw(i) {
                Ok(entry) => entry.name().ends_with('/'),
                Err(e) => return Some(Err(Error::archive(&self.path, e))),
            };
            if is_dir {
                continue;
            }

            let path = &self.path;
            return Some(
                self.archive
                    .by_index(i)
                    .map(|entry| ArchiveMember {
                        name: entry.name().to_string(),
                        entry,
                        path,
                    })
                    .map_err(|e| Error::archive(path, e)),
            );
        }

        None
    }

    /// Check whether the archive holds at most one regular member.
    ///
    /// Only central-directory names are consulted, so encrypted members and
    /// unsupported compression methods still count.
    pub fn has_at_most_one(&self) -> bool {
        self.archive
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .nth(1)
            .is_none()
    }
}

/// One regular member of a zip archive, readable until the next is requested.
pub struct ArchiveMember<'a> {
    name: String,
    entry: ZipFile<'a>,
    path: &'a Path,
}

impl ArchiveMember<'_> {
    /// Member name inside the archive.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared uncompressed size.
    pub fn size(&self) -> u64 {
        self.entry.size()
    }

    /// Declared compression ratio, 0 for empty or stored-empty members.
    pub fn compression_ratio(&self) -> f64 {
        let compressed = self.entry.compressed_size();
        if compressed == 0 {
            return 0.0;
        }
        self.entry.size() as f64 / compressed as f64
    }

    /// Read at most `window` decompressed bytes.
    pub fn peek(&mut self, window: usize) -> Result<Vec<u8>> {
        let ratio = self.compression_ratio();
        if ratio > SUSPICIOUS_COMPRESSION_RATIO {
            log::warn!(
                "Suspicious compression ratio ({:.1}x) in {:?}: {}",
                ratio,
                self.path,
                self.name
            );
        }

        let mut buffer = Vec::with_capacity(window.min(DEFAULT_PEEK_WINDOW_BYTES));
        (&mut self.entry)
            .take(window as u64)
            .read_to_end(&mut buffer)
            .map_err(|e| Error::decompress(self.path, "zip", e))?;
        Ok(buffer)
    }
}

impl std::fmt::Debug for ArchiveMember<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveMember")
            .field("name", &self.name)
            .field("size", &self.entry.size())
            .finish()
    }
}
