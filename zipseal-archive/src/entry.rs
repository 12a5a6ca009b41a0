//! Archive entry metadata and encryption scheme classification.

use crate::aes::AesExtraField;
use std::time::SystemTime;
use zipseal_core::dostime;

/// Flag bit indicating an encrypted entry in the general purpose bit flags.
pub const FLAG_ENCRYPTED: u16 = 0x0001;

/// Flag bit indicating a data descriptor follows the entry data.
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;

/// Flag bit indicating PKWARE strong encryption (SES). Not supported.
pub const FLAG_STRONG_ENCRYPTION: u16 = 0x0040;

/// ZIP compression methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    /// Stored (no compression).
    Stored,
    /// Deflate compression.
    Deflate,
    /// WinZip AES marker (method 99). The real method is in the extra field.
    Aes,
    /// Unknown method.
    Unknown(u16),
}

impl CompressionMethod {
    /// Create from a u16 header value.
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => Self::Stored,
            8 => Self::Deflate,
            99 => Self::Aes,
            _ => Self::Unknown(value),
        }
    }

    /// Convert to the u16 header value.
    pub fn to_u16(self) -> u16 {
        match self {
            Self::Stored => 0,
            Self::Deflate => 8,
            Self::Aes => 99,
            Self::Unknown(value) => value,
        }
    }
}

/// The encryption scheme protecting a single archive entry.
///
/// Classification is per entry; mixed archives are possible and each entry
/// carries its own scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionScheme {
    /// Entry is not encrypted.
    None,
    /// PKWARE weak encryption (ZipCrypto).
    PkzipWeak,
    /// WinZip AES with a 128-bit key.
    WinZipAes128,
    /// WinZip AES with a 256-bit key.
    WinZipAes256,
    /// Encrypted with a scheme this library cannot process.
    Unsupported,
}

impl EncryptionScheme {
    /// Classify an entry from its header fields.
    ///
    /// The ladder follows what the headers actually assert: the encryption
    /// flag gates everything, the strong-encryption flag and an unparseable
    /// AES field both land in [`Unsupported`](Self::Unsupported), and plain
    /// flag-bit-0 entries are the weak cipher.
    pub fn classify(flags: u16, method: CompressionMethod, aes: Option<&AesExtraField>) -> Self {
        if flags & FLAG_ENCRYPTED == 0 {
            return Self::None;
        }
        if flags & FLAG_STRONG_ENCRYPTION != 0 {
            return Self::Unsupported;
        }
        if let Some(field) = aes {
            return match field.strength {
                1 => Self::WinZipAes128,
                3 => Self::WinZipAes256,
                _ => Self::Unsupported,
            };
        }
        if method == CompressionMethod::Aes {
            // Method 99 promises an AES extra field; without one the entry
            // cannot be decrypted.
            return Self::Unsupported;
        }
        Self::PkzipWeak
    }

    /// Human-readable label, matching the `show` command's output.
    pub fn label(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::PkzipWeak => "PKZip classic encryption",
            Self::WinZipAes128 => "Winzip AES128 encryption",
            Self::WinZipAes256 => "Winzip AES256 encryption",
            Self::Unsupported => "Unsupported encryption",
        }
    }
}

/// Metadata for one archive entry, as recorded in the central directory.
#[derive(Debug, Clone)]
pub struct ZipEntry {
    /// Entry name with forward-slash separators. Directories end with `/`.
    pub name: String,
    /// General purpose bit flags.
    pub flags: u16,
    /// Compression method from the header (method 99 for AES entries).
    pub method: CompressionMethod,
    /// DOS modification time.
    pub mtime: u16,
    /// DOS modification date.
    pub mdate: u16,
    /// CRC-32 of the uncompressed data (0 for AE-2 entries).
    pub crc32: u32,
    /// Size of the entry payload as stored, including cipher framing.
    pub compressed_size: u32,
    /// Size of the uncompressed data.
    pub uncompressed_size: u32,
    /// Absolute offset of the entry payload in the archive.
    pub data_offset: u64,
    /// WinZip AES extra field, when present.
    pub aes: Option<AesExtraField>,
    /// Classified encryption scheme.
    pub scheme: EncryptionScheme,
}

impl ZipEntry {
    /// Whether this entry is a directory marker.
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/')
    }

    /// Modification time as a [`SystemTime`].
    pub fn modified(&self) -> SystemTime {
        dostime::dos_to_system_time(self.mdate, self.mtime)
    }
}
