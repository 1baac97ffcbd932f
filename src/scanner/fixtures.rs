//! On-disk fixtures for scanner tests.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

pub fn write_raw(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

pub fn write_gzip(dir: &TempDir, name: &str, payload: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    let file = File::create(&path).unwrap();
    let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    encoder.write_all(payload).unwrap();
    encoder.finish().unwrap();
    path
}

pub fn write_bz2(dir: &TempDir, name: &str, payload: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    let file = File::create(&path).unwrap();
    let mut encoder = bzip2::write::BzEncoder::new(file, bzip2::Compression::default());
    encoder.write_all(payload).unwrap();
    encoder.finish().unwrap();
    path
}

pub fn write_zip(dir: &TempDir, name: &str, dirs: &[&str], files: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.path().join(name);
    let file = File::create(&path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for d in dirs {
        zip.add_directory(*d, options).unwrap();
    }
    for (member, data) in files {
        zip.start_file(*member, options).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap();
    path
}

/// Single stored member with the encryption flag set in both headers.
pub fn write_encrypted_zip(dir: &TempDir, name: &str, member: &str, data: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    let mut buffer = std::io::Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buffer);
        let options =
            zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
        zip.start_file(member, options).unwrap();
        zip.write_all(data).unwrap();
        zip.finish().unwrap();
    }

    let mut bytes = buffer.into_inner();
    for (signature, flag_offset) in [(b"PK\x03\x04", 6), (b"PK\x01\x02", 8)] {
        let at = bytes.windows(4).position(|w| w == signature).unwrap();
        bytes[at + flag_offset] |= 1;
    }
    std::fs::write(&path, bytes).unwrap();
    path
}

pub fn write_tar(dir: &TempDir, name: &str, files: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.path().join(name);
    let file = File::create(&path).unwrap();
    let mut builder = tar::Builder::new(file);
    for (member, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, member, *data).unwrap();
    }
    builder.finish().unwrap();
    path
}

/// PNG signature followed by a 1x1 IHDR chunk.
pub const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\
\x00\x00\x00\x0dIHDR\x00\x00\x00\x01\x00\x00\x00\x01\x08\x02\x00\x00\x00\x90\x77\x53\xde";
