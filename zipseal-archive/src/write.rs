//! Archive writing: streaming local records and the trailing central
//! directory.

use crate::header::{CentralDirHeader, EndOfCentralDir, LocalFileHeader};
use std::io::Write;
use zipseal_core::{Result, ZipSealError};

/// A pre-encoded file entry, ready to be written verbatim.
///
/// The payload is the stored bytes: compressed and, for encrypted entries,
/// wrapped in the scheme's framing. Header fields describe the original
/// data; the writer derives the compressed size from the payload length.
#[derive(Debug)]
pub struct RawFileEntry<'a> {
    /// Entry name with forward-slash separators.
    pub name: &'a str,
    /// General purpose bit flags.
    pub flags: u16,
    /// Compression method as written to the headers (99 for AES entries).
    pub method: u16,
    /// DOS modification time.
    pub mtime: u16,
    /// DOS modification date.
    pub mdate: u16,
    /// CRC-32 of the uncompressed data (0 for AE-2 entries).
    pub crc32: u32,
    /// Size of the uncompressed data.
    pub uncompressed_size: u32,
    /// Extra field bytes (AES field for encrypted entries).
    pub extra: &'a [u8],
    /// The stored payload.
    pub payload: &'a [u8],
}

/// ZIP archive writer.
///
/// Entries are written in call order; [`finish`](Self::finish) writes the
/// central directory and EOCD exactly once and must be called before the
/// output is used.
pub struct ZipWriter<W: Write> {
    writer: W,
    central: Vec<CentralDirHeader>,
    offset: u64,
    finished: bool,
}

impl<W: Write> ZipWriter<W> {
    /// Create a writer over an output stream positioned at the start.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            central: Vec::new(),
            offset: 0,
            finished: false,
        }
    }

    /// Append a pre-encoded file entry.
    pub fn add_file_raw(&mut self, entry: &RawFileEntry<'_>) -> Result<()> {
        if entry.payload.len() > u32::MAX as usize {
            return Err(ZipSealError::invalid_header(
                "entry payload exceeds the 32-bit ZIP size limit",
            ));
        }
        let compressed_size = entry.payload.len() as u32;
        let local_header_offset = self.offset as u32;

        let version_needed = if entry.method == 99 {
            51
        } else if entry.method == 8 {
            20
        } else {
            10
        };

        let local = LocalFileHeader {
            version_needed,
            flags: entry.flags,
            method: entry.method,
            mtime: entry.mtime,
            mdate: entry.mdate,
            crc32: entry.crc32,
            compressed_size,
            uncompressed_size: entry.uncompressed_size,
            filename: entry.name.to_string(),
            extra: entry.extra.to_vec(),
        };
        self.offset += local.write(&mut self.writer)?;
        self.writer.write_all(entry.payload)?;
        self.offset += entry.payload.len() as u64;

        self.central.push(CentralDirHeader {
            version_made_by: 0x031E, // Unix, version 3.0
            version_needed,
            flags: entry.flags,
            method: entry.method,
            mtime: entry.mtime,
            mdate: entry.mdate,
            crc32: entry.crc32,
            compressed_size,
            uncompressed_size: entry.uncompressed_size,
            disk_start: 0,
            internal_attr: 0,
            external_attr: 0o100644 << 16, // Regular file, rw-r--r--
            local_header_offset,
            filename: entry.name.to_string(),
            extra: entry.extra.to_vec(),
            comment: String::new(),
        });

        Ok(())
    }

    /// Append a directory entry. Directory names are normalized to end
    /// with `/` and carry no payload.
    pub fn add_directory(&mut self, name: &str, mtime: u16, mdate: u16) -> Result<()> {
        let dir_name = if name.ends_with('/') {
            name.to_string()
        } else {
            format!("{name}/")
        };
        let local_header_offset = self.offset as u32;

        let local = LocalFileHeader {
            version_needed: 10,
            flags: 0,
            method: 0,
            mtime,
            mdate,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            filename: dir_name.clone(),
            extra: vec![],
        };
        self.offset += local.write(&mut self.writer)?;

        self.central.push(CentralDirHeader {
            version_made_by: 0x031E,
            version_needed: 10,
            flags: 0,
            method: 0,
            mtime,
            mdate,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            disk_start: 0,
            internal_attr: 0,
            external_attr: 0o40755 << 16, // Directory, rwxr-xr-x
            local_header_offset,
            filename: dir_name,
            extra: vec![],
            comment: String::new(),
        });

        Ok(())
    }

    /// Write the central directory and EOCD record.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }

        if self.offset > u32::MAX as u64 || self.central.len() > u16::MAX as usize {
            return Err(ZipSealError::invalid_header(
                "archive exceeds the 32-bit ZIP limits",
            ));
        }

        let cd_offset = self.offset as u32;
        let mut cd_size = 0u64;
        for header in &self.central {
            cd_size += header.write(&mut self.writer)?;
        }

        EndOfCentralDir {
            total_entries: self.central.len() as u16,
            cd_size: cd_size as u32,
            cd_offset,
        }
        .write(&mut self.writer)?;

        self.writer.flush()?;
        self.finished = true;
        Ok(())
    }

    /// Finish and return the inner writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.finish()?;
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EncryptionScheme;
    use crate::read::{sniff_format, ZipReader};
    use std::io::Cursor;

    fn stored_entry<'a>(name: &'a str, data: &'a [u8], crc32: u32) -> RawFileEntry<'a> {
        RawFileEntry {
            name,
            flags: 0,
            method: 0,
            mtime: 0x6000,
            mdate: 0x58CF,
            crc32,
            uncompressed_size: data.len() as u32,
            extra: &[],
            payload: data,
        }
    }

    #[test]
    fn test_writer_reader_roundtrip() {
        let crc = zipseal_core::Crc32::compute(b"hello");
        let mut buf = Vec::new();
        {
            let mut writer = ZipWriter::new(&mut buf);
            writer.add_directory("sub", 0x6000, 0x58CF).unwrap();
            writer
                .add_file_raw(&stored_entry("notes.txt", b"hello", crc))
                .unwrap();
            writer.finish().unwrap();
        }

        let mut cursor = Cursor::new(buf);
        assert!(sniff_format(&mut cursor));

        let mut reader = ZipReader::new(cursor).unwrap();
        assert_eq!(reader.entries().len(), 2);
        assert_eq!(reader.entries()[0].name, "sub/");
        assert!(reader.entries()[0].is_dir());

        let entry = reader.entries()[1].clone();
        assert_eq!(entry.name, "notes.txt");
        assert_eq!(entry.crc32, crc);
        assert_eq!(reader.read_raw(&entry).unwrap(), b"hello");
    }

    #[test]
    fn test_finish_is_idempotent() {
        let mut buf = Vec::new();
        let mut writer = ZipWriter::new(&mut buf);
        writer.finish().unwrap();
        writer.finish().unwrap();
        drop(writer);
        assert_eq!(buf.len(), crate::header::EOCD_SIZE);
    }

    #[test]
    fn test_encrypted_flags_survive_roundtrip() {
        let mut buf = Vec::new();
        {
            let mut writer = ZipWriter::new(&mut buf);
            writer
                .add_file_raw(&RawFileEntry {
                    name: "weak.bin",
                    flags: crate::entry::FLAG_ENCRYPTED,
                    method: 8,
                    mtime: 0,
                    mdate: 0x0021,
                    crc32: 0xCAFEBABE,
                    uncompressed_size: 64,
                    extra: &[],
                    payload: &[0u8; 32],
                })
                .unwrap();
            writer.finish().unwrap();
        }

        let reader = ZipReader::new(Cursor::new(buf)).unwrap();
        assert_eq!(reader.entries()[0].scheme, EncryptionScheme::PkzipWeak);
    }
}
