//! File type detection using magic bytes and container structure.
//!
//! Every check here is advisory: an unreadable or malformed source is "not
//! this format", never an error. Files are opened read-only and closed when
//! the handle drops, on every return path.

use crate::core::error::{Error, Result};
use crate::core::types::FileKind;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

/// Bytes needed to recognize any signature below.
pub const MAGIC_BYTES_SIZE: usize = 4;

/// Size of one tar header block.
const TAR_BLOCK_SIZE: u64 = 512;

/// A fixed leading byte sequence identifying a stream format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteSignature {
    /// Exact leading bytes
    pub bytes: &'static [u8],
    /// Format they identify
    pub kind: FileKind,
}

impl ByteSignature {
    /// Check the signature against the literal leading bytes of a stream.
    pub fn matches(&self, prefix: &[u8]) -> bool {
        prefix.starts_with(self.bytes)
    }
}

/// GZIP member header (ID1, ID2).
pub const GZIP_MAGIC: ByteSignature = ByteSignature {
    bytes: b"\x1f\x8b",
    kind: FileKind::Gzip,
};

/// BZIP2 stream header ("BZh").
pub const BZIP2_MAGIC: ByteSignature = ByteSignature {
    bytes: b"BZh",
    kind: FileKind::Bzip2,
};

/// Magic byte detector.
pub struct MagicMatcher;

impl MagicMatcher {
    /// Read at most `len` bytes from the start of a file.
    ///
    /// This is the only primitive in the module that reports failure; callers
    /// decide whether an unopenable path matters.
    pub fn read_prefix(path: &Path, len: usize) -> Result<Vec<u8>> {
        let file = File::open(path).map_err(|e| Error::file_open(path, e))?;
        let mut buffer = Vec::with_capacity(len.min(64 * 1024));
        file.take(len as u64)
            .read_to_end(&mut buffer)
            .map_err(|e| Error::file_read(path, e))?;
        Ok(buffer)
    }

    /// Check whether a prefix starts with the gzip signature.
    pub fn matches_gzip(prefix: &[u8]) -> bool {
        GZIP_MAGIC.matches(prefix)
    }

    /// Check whether a prefix starts with the bzip2 signature.
    pub fn matches_bzip2(prefix: &[u8]) -> bool {
        BZIP2_MAGIC.matches(prefix)
    }

    /// Check whether a file starts with the given signature.
    pub fn file_matches(path: &Path, signature: &ByteSignature) -> bool {
        match Self::read_prefix(path, signature.bytes.len()) {
            Ok(prefix) => signature.matches(&prefix),
            Err(e) => {
                log::debug!(
                    "Magic check for {} failed on {:?}: {}",
                    signature.kind,
                    path,
                    e
                );
                false
            }
        }
    }

    /// Binary-vs-text heuristic: a NUL byte anywhere in the prefix.
    ///
    /// Like grep, this misreads UTF-16 text as binary.
    pub fn is_binary(prefix: &[u8]) -> bool {
        prefix.contains(&0)
    }

    /// Check whether a file parses as a zip archive (central directory found).
    pub fn is_zip(path: &Path) -> bool {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                log::debug!("Cannot open {:?} for zip check: {}", path, e);
                return false;
            }
        };

        match zip::ZipArchive::new(file) {
            Ok(_) => true,
            Err(e) => {
                log::trace!("Not a zip archive {:?}: {}", path, e);
                false
            }
        }
    }

    /// Check whether a file holds a tar archive with at least one valid header.
    ///
    /// Gzip- and bzip2-wrapped archives are unwrapped first. Only the first
    /// header block is decompressed and checksummed; GNU long-name and pax
    /// extension records count as headers and are not followed. An archive
    /// holding nothing but end-of-archive blocks is not a tar.
    pub fn is_tar(path: &Path) -> bool {
        match Self::first_tar_header(path) {
            Ok(found) => found,
            Err(e) => {
                log::trace!("Not a tar archive {:?}: {}", path, e);
                false
            }
        }
    }

    fn first_tar_header(path: &Path) -> Result<bool> {
        let mut file = File::open(path).map_err(|e| Error::file_open(path, e))?;

        let mut magic = Vec::with_capacity(MAGIC_BYTES_SIZE);
        (&mut file)
            .take(MAGIC_BYTES_SIZE as u64)
            .read_to_end(&mut magic)
            .map_err(|e| Error::file_read(path, e))?;
        file.rewind().map_err(|e| Error::file_read(path, e))?;

        let reader: Box<dyn Read> = if Self::matches_gzip(&magic) {
            Box::new(flate2::read::MultiGzDecoder::new(file).take(TAR_BLOCK_SIZE))
        } else if Self::matches_bzip2(&magic) {
            Box::new(bzip2::read::MultiBzDecoder::new(file).take(TAR_BLOCK_SIZE))
        } else {
            Box::new(file.take(TAR_BLOCK_SIZE))
        };

        let mut archive = tar::Archive::new(reader);
        let mut entries = archive
            .entries()
            .map_err(|e| Error::archive(path, e))?
            .raw(true);
        match entries.next() {
            Some(Ok(_)) => Ok(true),
            Some(Err(e)) => Err(Error::archive(path, e)),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::fixtures::{write_bz2, write_gzip, write_raw, write_tar, write_zip};
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_gzip_signature() {
        assert!(MagicMatcher::matches_gzip(b"\x1f\x8b\x08\x00"));
        assert!(!MagicMatcher::matches_gzip(b"\x1f"));
        assert!(!MagicMatcher::matches_gzip(b"\x8b\x1f"));
    }

    #[test]
    fn test_bzip2_signature() {
        assert!(MagicMatcher::matches_bzip2(b"BZh91AY&SY"));
        assert!(!MagicMatcher::matches_bzip2(b"BZ"));
        assert!(!MagicMatcher::matches_bzip2(b"bzh9"));
    }

    #[test]
    fn test_binary_heuristic() {
        assert!(!MagicMatcher::is_binary(b"plain text\nwith lines\t\r\n"));
        assert!(!MagicMatcher::is_binary("\u{394}elta".as_bytes()));
        assert!(MagicMatcher::is_binary(b"ab\x00cd"));
        assert!(!MagicMatcher::is_binary(b""));
    }

    #[test]
    fn test_read_prefix_is_bounded() {
        let dir = tempdir().unwrap();
        let path = write_raw(&dir, "data.bin", &[b'x'; 4096]);

        let prefix = MagicMatcher::read_prefix(&path, 1024).unwrap();
        assert_eq!(prefix.len(), 1024);
    }

    #[test]
    fn test_read_prefix_missing_file() {
        let dir = tempdir().unwrap();
        let err = MagicMatcher::read_prefix(&dir.path().join("missing"), 16).unwrap_err();
        assert!(matches!(err, Error::FileOpen { .. }));
    }

    #[test]
    fn test_empty_file_matches_nothing() {
        let dir = tempdir().unwrap();
        let path = write_raw(&dir, "empty", b"");

        assert!(!MagicMatcher::file_matches(&path, &GZIP_MAGIC));
        assert!(!MagicMatcher::file_matches(&path, &BZIP2_MAGIC));
        assert!(!MagicMatcher::is_zip(&path));
        assert!(!MagicMatcher::is_tar(&path));
    }

    #[test]
    fn test_tar_detection() {
        let dir = tempdir().unwrap();
        let path = write_tar(&dir, "bundle.tar", &[("hello.txt", b"hello tar")]);

        assert!(MagicMatcher::is_tar(&path));
        assert!(!MagicMatcher::is_zip(&path));
    }

    #[test]
    fn test_compressed_tar_detection() {
        let dir = tempdir().unwrap();
        let plain = write_tar(&dir, "bundle.tar", &[("inside.txt", b"inside")]);
        let bytes = std::fs::read(&plain).unwrap();

        let gz = write_gzip(&dir, "bundle.tar.gz", &bytes);
        let bz = write_bz2(&dir, "bundle.tar.bz2", &bytes);
        assert!(MagicMatcher::is_tar(&gz));
        assert!(MagicMatcher::is_tar(&bz));
    }

    #[test]
    fn test_empty_tar_is_not_tar() {
        let dir = tempdir().unwrap();
        let path = write_tar(&dir, "empty.tar", &[]);
        assert!(!MagicMatcher::is_tar(&path));
    }

    #[test]
    fn test_long_name_tar_detection() {
        let dir = tempdir().unwrap();
        let long_name = format!("{}/payload.txt", "nested".repeat(26));
        assert!(long_name.len() > 100);
        let path = write_tar(&dir, "long.tar", &[(long_name.as_str(), b"deep")]);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes[156], b'L');
        assert!(MagicMatcher::is_tar(&path));
    }

    #[test]
    fn test_pax_tar_detection() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pax.tar");
        let mut builder = tar::Builder::new(File::create(&path).unwrap());
        builder
            .append_pax_extensions([("user.origin", b"upload".as_slice())])
            .unwrap();
        let mut header = tar::Header::new_ustar();
        header.set_size(3);
        header.set_mode(0o644);
        builder.append_data(&mut header, "pax.txt", &b"pax"[..]).unwrap();
        builder.finish().unwrap();
        drop(builder);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes[156], b'x');
        assert!(MagicMatcher::is_tar(&path));

        let gz = write_gzip(&dir, "pax.tar.gz", &bytes);
        assert!(MagicMatcher::is_tar(&gz));
    }

    #[test]
    fn test_zip_detection() {
        let dir = tempdir().unwrap();
        let path = write_zip(&dir, "a.zip", &[], &[("a.txt", b"a")]);
        assert!(MagicMatcher::is_zip(&path));
        assert!(!MagicMatcher::is_tar(&path));
    }

    #[test]
    fn test_text_is_not_tar() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        let mut file = File::create(&path).unwrap();
        for i in 0..100 {
            writeln!(file, "line {} of some ordinary text", i).unwrap();
        }
        drop(file);

        assert!(!MagicMatcher::is_tar(&path));
        assert!(!MagicMatcher::is_zip(&path));
    }
}
