//! ZIP header records.
//!
//! Parsers and writers for the fixed records of the 32-bit ZIP format:
//! local file header, central directory header, and end-of-central-directory
//! record. Zip64 archives are detected through their marker values and
//! rejected rather than mis-parsed.

use std::io::{Read, Write};
use zipseal_core::{Result, ZipSealError};

/// ZIP local file header signature.
pub const LOCAL_FILE_HEADER_SIG: u32 = 0x04034B50;

/// ZIP central directory header signature.
pub const CENTRAL_DIR_HEADER_SIG: u32 = 0x02014B50;

/// ZIP end of central directory signature.
pub const END_OF_CENTRAL_DIR_SIG: u32 = 0x06054B50;

/// Data descriptor signature (optional, PK\x07\x08).
pub const DATA_DESCRIPTOR_SIG: u32 = 0x08074B50;

/// Marker value signalling a Zip64 field (32-bit).
pub const ZIP64_MARKER_32: u32 = 0xFFFF_FFFF;

/// Marker value signalling a Zip64 field (16-bit).
pub const ZIP64_MARKER_16: u16 = 0xFFFF;

/// Fixed size of the local file header.
pub const LOCAL_FILE_HEADER_SIZE: u64 = 30;

/// Fixed size of the EOCD record.
pub const EOCD_SIZE: usize = 22;

/// Maximum distance of the EOCD signature from the end of the file
/// (fixed record plus the largest possible archive comment).
pub const EOCD_SEARCH_SPAN: u64 = EOCD_SIZE as u64 + 65535;

/// ZIP local file header.
#[derive(Debug, Clone)]
pub struct LocalFileHeader {
    /// Minimum version needed to extract.
    pub version_needed: u16,
    /// General purpose bit flag.
    pub flags: u16,
    /// Compression method (raw header value).
    pub method: u16,
    /// Last modification time (DOS).
    pub mtime: u16,
    /// Last modification date (DOS).
    pub mdate: u16,
    /// CRC-32 of uncompressed data.
    pub crc32: u32,
    /// Compressed size.
    pub compressed_size: u32,
    /// Uncompressed size.
    pub uncompressed_size: u32,
    /// File name.
    pub filename: String,
    /// Extra field.
    pub extra: Vec<u8>,
}

impl LocalFileHeader {
    /// Read a local file header from the current position.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; 30];
        reader.read_exact(&mut buf)?;

        let signature = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if signature != LOCAL_FILE_HEADER_SIG {
            return Err(ZipSealError::invalid_header(format!(
                "bad local file header signature: {signature:#010x}"
            )));
        }

        let version_needed = u16::from_le_bytes([buf[4], buf[5]]);
        let flags = u16::from_le_bytes([buf[6], buf[7]]);
        let method = u16::from_le_bytes([buf[8], buf[9]]);
        let mtime = u16::from_le_bytes([buf[10], buf[11]]);
        let mdate = u16::from_le_bytes([buf[12], buf[13]]);
        let crc32 = u32::from_le_bytes([buf[14], buf[15], buf[16], buf[17]]);
        let compressed_size = u32::from_le_bytes([buf[18], buf[19], buf[20], buf[21]]);
        let uncompressed_size = u32::from_le_bytes([buf[22], buf[23], buf[24], buf[25]]);
        let filename_len = u16::from_le_bytes([buf[26], buf[27]]) as usize;
        let extra_len = u16::from_le_bytes([buf[28], buf[29]]) as usize;

        if compressed_size == ZIP64_MARKER_32 || uncompressed_size == ZIP64_MARKER_32 {
            return Err(ZipSealError::invalid_header(
                "Zip64 archives are not supported",
            ));
        }

        let mut filename_bytes = vec![0u8; filename_len];
        reader.read_exact(&mut filename_bytes)?;
        let filename = String::from_utf8_lossy(&filename_bytes).into_owned();

        let mut extra = vec![0u8; extra_len];
        reader.read_exact(&mut extra)?;

        Ok(Self {
            version_needed,
            flags,
            method,
            mtime,
            mdate,
            crc32,
            compressed_size,
            uncompressed_size,
            filename,
            extra,
        })
    }

    /// Write the header. Returns the number of bytes written.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<u64> {
        let filename_bytes = self.filename.as_bytes();

        writer.write_all(&LOCAL_FILE_HEADER_SIG.to_le_bytes())?;
        writer.write_all(&self.version_needed.to_le_bytes())?;
        writer.write_all(&self.flags.to_le_bytes())?;
        writer.write_all(&self.method.to_le_bytes())?;
        writer.write_all(&self.mtime.to_le_bytes())?;
        writer.write_all(&self.mdate.to_le_bytes())?;
        writer.write_all(&self.crc32.to_le_bytes())?;
        writer.write_all(&self.compressed_size.to_le_bytes())?;
        writer.write_all(&self.uncompressed_size.to_le_bytes())?;
        writer.write_all(&(filename_bytes.len() as u16).to_le_bytes())?;
        writer.write_all(&(self.extra.len() as u16).to_le_bytes())?;
        writer.write_all(filename_bytes)?;
        writer.write_all(&self.extra)?;

        Ok(LOCAL_FILE_HEADER_SIZE + filename_bytes.len() as u64 + self.extra.len() as u64)
    }
}

/// ZIP central directory header.
#[derive(Debug, Clone)]
pub struct CentralDirHeader {
    /// Version made by.
    pub version_made_by: u16,
    /// Minimum version needed to extract.
    pub version_needed: u16,
    /// General purpose bit flag.
    pub flags: u16,
    /// Compression method (raw header value).
    pub method: u16,
    /// Last modification time (DOS).
    pub mtime: u16,
    /// Last modification date (DOS).
    pub mdate: u16,
    /// CRC-32 of uncompressed data.
    pub crc32: u32,
    /// Compressed size.
    pub compressed_size: u32,
    /// Uncompressed size.
    pub uncompressed_size: u32,
    /// Disk number start.
    pub disk_start: u16,
    /// Internal file attributes.
    pub internal_attr: u16,
    /// External file attributes.
    pub external_attr: u32,
    /// Relative offset of the local header.
    pub local_header_offset: u32,
    /// File name.
    pub filename: String,
    /// Extra field.
    pub extra: Vec<u8>,
    /// File comment.
    pub comment: String,
}

impl CentralDirHeader {
    /// Read a central directory header from the current position.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; 46];
        reader.read_exact(&mut buf)?;

        let signature = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if signature != CENTRAL_DIR_HEADER_SIG {
            return Err(ZipSealError::invalid_header(format!(
                "bad central directory signature: {signature:#010x}"
            )));
        }

        let version_made_by = u16::from_le_bytes([buf[4], buf[5]]);
        let version_needed = u16::from_le_bytes([buf[6], buf[7]]);
        let flags = u16::from_le_bytes([buf[8], buf[9]]);
        let method = u16::from_le_bytes([buf[10], buf[11]]);
        let mtime = u16::from_le_bytes([buf[12], buf[13]]);
        let mdate = u16::from_le_bytes([buf[14], buf[15]]);
        let crc32 = u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]);
        let compressed_size = u32::from_le_bytes([buf[20], buf[21], buf[22], buf[23]]);
        let uncompressed_size = u32::from_le_bytes([buf[24], buf[25], buf[26], buf[27]]);
        let filename_len = u16::from_le_bytes([buf[28], buf[29]]) as usize;
        let extra_len = u16::from_le_bytes([buf[30], buf[31]]) as usize;
        let comment_len = u16::from_le_bytes([buf[32], buf[33]]) as usize;
        let disk_start = u16::from_le_bytes([buf[34], buf[35]]);
        let internal_attr = u16::from_le_bytes([buf[36], buf[37]]);
        let external_attr = u32::from_le_bytes([buf[38], buf[39], buf[40], buf[41]]);
        let local_header_offset = u32::from_le_bytes([buf[42], buf[43], buf[44], buf[45]]);

        if compressed_size == ZIP64_MARKER_32
            || uncompressed_size == ZIP64_MARKER_32
            || local_header_offset == ZIP64_MARKER_32
        {
            return Err(ZipSealError::invalid_header(
                "Zip64 archives are not supported",
            ));
        }

        let mut filename_bytes = vec![0u8; filename_len];
        reader.read_exact(&mut filename_bytes)?;
        let filename = String::from_utf8_lossy(&filename_bytes).into_owned();

        let mut extra = vec![0u8; extra_len];
        reader.read_exact(&mut extra)?;

        let mut comment_bytes = vec![0u8; comment_len];
        reader.read_exact(&mut comment_bytes)?;
        let comment = String::from_utf8_lossy(&comment_bytes).into_owned();

        Ok(Self {
            version_made_by,
            version_needed,
            flags,
            method,
            mtime,
            mdate,
            crc32,
            compressed_size,
            uncompressed_size,
            disk_start,
            internal_attr,
            external_attr,
            local_header_offset,
            filename,
            extra,
            comment,
        })
    }

    /// Write the header. Returns the number of bytes written.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<u64> {
        let filename_bytes = self.filename.as_bytes();
        let comment_bytes = self.comment.as_bytes();

        writer.write_all(&CENTRAL_DIR_HEADER_SIG.to_le_bytes())?;
        writer.write_all(&self.version_made_by.to_le_bytes())?;
        writer.write_all(&self.version_needed.to_le_bytes())?;
        writer.write_all(&self.flags.to_le_bytes())?;
        writer.write_all(&self.method.to_le_bytes())?;
        writer.write_all(&self.mtime.to_le_bytes())?;
        writer.write_all(&self.mdate.to_le_bytes())?;
        writer.write_all(&self.crc32.to_le_bytes())?;
        writer.write_all(&self.compressed_size.to_le_bytes())?;
        writer.write_all(&self.uncompressed_size.to_le_bytes())?;
        writer.write_all(&(filename_bytes.len() as u16).to_le_bytes())?;
        writer.write_all(&(self.extra.len() as u16).to_le_bytes())?;
        writer.write_all(&(comment_bytes.len() as u16).to_le_bytes())?;
        writer.write_all(&self.disk_start.to_le_bytes())?;
        writer.write_all(&self.internal_attr.to_le_bytes())?;
        writer.write_all(&self.external_attr.to_le_bytes())?;
        writer.write_all(&self.local_header_offset.to_le_bytes())?;
        writer.write_all(filename_bytes)?;
        writer.write_all(&self.extra)?;
        writer.write_all(comment_bytes)?;

        Ok(46 + filename_bytes.len() as u64 + self.extra.len() as u64 + comment_bytes.len() as u64)
    }
}

/// End of central directory record.
#[derive(Debug, Clone, Copy)]
pub struct EndOfCentralDir {
    /// Total number of central directory entries.
    pub total_entries: u16,
    /// Size of the central directory in bytes.
    pub cd_size: u32,
    /// Offset of the central directory from the start of the file.
    pub cd_offset: u32,
}

impl EndOfCentralDir {
    /// Parse the record from a buffer positioned at its signature.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < EOCD_SIZE {
            return Err(ZipSealError::invalid_header("EOCD record too short"));
        }
        let signature = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if signature != END_OF_CENTRAL_DIR_SIG {
            return Err(ZipSealError::invalid_header(format!(
                "bad EOCD signature: {signature:#010x}"
            )));
        }

        let disk_number = u16::from_le_bytes([buf[4], buf[5]]);
        let cd_disk = u16::from_le_bytes([buf[6], buf[7]]);
        let disk_entries = u16::from_le_bytes([buf[8], buf[9]]);
        let total_entries = u16::from_le_bytes([buf[10], buf[11]]);
        let cd_size = u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]);
        let cd_offset = u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]);

        if disk_number != 0 || cd_disk != 0 || disk_entries != total_entries {
            return Err(ZipSealError::invalid_header(
                "multi-disk archives are not supported",
            ));
        }
        if total_entries == ZIP64_MARKER_16 || cd_offset == ZIP64_MARKER_32 {
            return Err(ZipSealError::invalid_header(
                "Zip64 archives are not supported",
            ));
        }

        Ok(Self {
            total_entries,
            cd_size,
            cd_offset,
        })
    }

    /// Write the record with an empty archive comment.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&END_OF_CENTRAL_DIR_SIG.to_le_bytes())?;
        writer.write_all(&0u16.to_le_bytes())?; // disk number
        writer.write_all(&0u16.to_le_bytes())?; // central directory disk
        writer.write_all(&self.total_entries.to_le_bytes())?;
        writer.write_all(&self.total_entries.to_le_bytes())?;
        writer.write_all(&self.cd_size.to_le_bytes())?;
        writer.write_all(&self.cd_offset.to_le_bytes())?;
        writer.write_all(&0u16.to_le_bytes())?; // comment length
        Ok(())
    }
}
