//! Archive reading: central directory walk and raw payload access.

use crate::aes::AesExtraField;
use crate::entry::{CompressionMethod, EncryptionScheme, ZipEntry};
use crate::header::{
    CentralDirHeader, EndOfCentralDir, EOCD_SEARCH_SPAN, EOCD_SIZE, END_OF_CENTRAL_DIR_SIG,
    LOCAL_FILE_HEADER_SIG, LOCAL_FILE_HEADER_SIZE,
};
use std::io::{Read, Seek, SeekFrom};
use zipseal_core::{Result, ZipSealError};

/// ZIP archive reader.
///
/// Parses the central directory up front; raw payloads are read on demand
/// through [`read_raw`](Self::read_raw) without buffering the whole file.
pub struct ZipReader<R: Read + Seek> {
    reader: R,
    entries: Vec<ZipEntry>,
}

impl<R: Read + Seek> ZipReader<R> {
    /// Open an archive and read its central directory.
    pub fn new(mut reader: R) -> Result<Self> {
        let entries = Self::read_entries(&mut reader)?;
        Ok(Self { reader, entries })
    }

    /// Entries in central directory order.
    pub fn entries(&self) -> &[ZipEntry] {
        &self.entries
    }

    /// Read an entry's raw payload: the bytes as stored, including any
    /// cipher framing, bounded by the entry's compressed size.
    pub fn read_raw(&mut self, entry: &ZipEntry) -> Result<Vec<u8>> {
        self.read_raw_prefix(entry, entry.compressed_size as usize)
    }

    /// Read at most `max` leading bytes of an entry's raw payload.
    ///
    /// Used by the cheap password checks, which only need the cipher
    /// framing at the front of the payload.
    pub fn read_raw_prefix(&mut self, entry: &ZipEntry, max: usize) -> Result<Vec<u8>> {
        let len = max.min(entry.compressed_size as usize);

        // The central directory's size field is untrusted input; refuse it
        // before allocating if it points past the end of the file.
        let file_size = self.reader.seek(SeekFrom::End(0))?;
        let available = file_size.saturating_sub(entry.data_offset);
        if len as u64 > available {
            return Err(ZipSealError::invalid_header(
                "entry payload extends past end of file",
            ));
        }

        self.reader.seek(SeekFrom::Start(entry.data_offset))?;
        let mut payload = vec![0u8; len];
        self.reader.read_exact(&mut payload)?;
        Ok(payload)
    }

    /// Consume the reader, returning the inner source.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn read_entries(reader: &mut R) -> Result<Vec<ZipEntry>> {
        let eocd = find_eocd(reader)?;

        reader.seek(SeekFrom::Start(eocd.cd_offset as u64))?;
        let mut headers = Vec::with_capacity(eocd.total_entries as usize);
        for _ in 0..eocd.total_entries {
            headers.push(CentralDirHeader::read(reader)?);
        }

        let mut entries = Vec::with_capacity(headers.len());
        for header in headers {
            let data_offset = resolve_data_offset(reader, header.local_header_offset)?;
            let method = CompressionMethod::from_u16(header.method);
            let aes = AesExtraField::find(&header.extra);
            let scheme = EncryptionScheme::classify(header.flags, method, aes.as_ref());

            entries.push(ZipEntry {
                name: header.filename,
                flags: header.flags,
                method,
                mtime: header.mtime,
                mdate: header.mdate,
                crc32: header.crc32,
                compressed_size: header.compressed_size,
                uncompressed_size: header.uncompressed_size,
                data_offset,
                aes,
                scheme,
            });
        }

        Ok(entries)
    }
}

/// Locate and parse the end-of-central-directory record.
///
/// Scans backwards through the trailing bytes of the file; the EOCD can be
/// at most 65557 bytes from the end (fixed record plus maximum comment).
fn find_eocd<R: Read + Seek>(reader: &mut R) -> Result<EndOfCentralDir> {
    let file_size = reader.seek(SeekFrom::End(0))?;
    if file_size < EOCD_SIZE as u64 {
        return Err(ZipSealError::invalid_header("file too small for a ZIP archive"));
    }

    let search_start = file_size.saturating_sub(EOCD_SEARCH_SPAN);
    reader.seek(SeekFrom::Start(search_start))?;
    let mut tail = vec![0u8; (file_size - search_start) as usize];
    reader.read_exact(&mut tail)?;

    let sig = END_OF_CENTRAL_DIR_SIG.to_le_bytes();
    let offset = tail
        .windows(4)
        .rposition(|w| w == sig)
        .ok_or_else(|| ZipSealError::invalid_header("end of central directory not found"))?;

    EndOfCentralDir::parse(&tail[offset..])
}

/// Resolve an entry's payload offset through its local header.
///
/// The local header's name and extra lengths can differ from the central
/// directory's, so the offset has to come from the local record itself.
fn resolve_data_offset<R: Read + Seek>(reader: &mut R, local_header_offset: u32) -> Result<u64> {
    let pos = reader.stream_position()?;
    reader.seek(SeekFrom::Start(local_header_offset as u64 + 26))?;
    let mut lens = [0u8; 4];
    reader.read_exact(&mut lens)?;
    let filename_len = u16::from_le_bytes([lens[0], lens[1]]) as u64;
    let extra_len = u16::from_le_bytes([lens[2], lens[3]]) as u64;
    reader.seek(SeekFrom::Start(pos))?;
    Ok(local_header_offset as u64 + LOCAL_FILE_HEADER_SIZE + filename_len + extra_len)
}

/// Test whether the stream looks like a ZIP archive.
///
/// Requires a leading local-file-header signature (or a bare EOCD for an
/// empty archive) and a parseable EOCD record at the tail. Truncated files
/// and foreign formats return `false`, never an error.
pub fn sniff_format<R: Read + Seek>(reader: &mut R) -> bool {
    sniff_inner(reader).unwrap_or(false)
}

fn sniff_inner<R: Read + Seek>(reader: &mut R) -> Result<bool> {
    reader.seek(SeekFrom::Start(0))?;
    let mut sig = [0u8; 4];
    if reader.read_exact(&mut sig).is_err() {
        return Ok(false);
    }
    let leading = u32::from_le_bytes(sig);
    if leading != LOCAL_FILE_HEADER_SIG && leading != END_OF_CENTRAL_DIR_SIG {
        return Ok(false);
    }
    Ok(find_eocd(reader).is_ok())
}
