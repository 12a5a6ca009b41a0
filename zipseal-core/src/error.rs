//! Error types for ZipSeal operations.
//!
//! A single error enum covers every failure the library can surface:
//! container-format problems, credential and integrity failures from the
//! cipher layer, codec failures, and plain I/O.

use std::io;
use thiserror::Error;

/// The main error type for ZipSeal operations.
#[derive(Debug, Error)]
pub enum ZipSealError {
    /// I/O error from underlying reader/writer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input is not a ZIP archive.
    #[error("Not a zip archive: {path}")]
    NotAnArchive {
        /// Path of the offending file.
        path: String,
    },

    /// Entry uses an encryption scheme this library cannot process.
    #[error("Unsupported encryption scheme on entry: {entry}")]
    UnsupportedScheme {
        /// Name of the entry.
        entry: String,
    },

    /// Supplied password failed the cheap verification check.
    #[error("Invalid password for entry: {entry}")]
    InvalidCredential {
        /// Name of the entry that rejected the password.
        entry: String,
    },

    /// Authentication tag mismatch on an authenticated entry.
    ///
    /// The password was accepted but the ciphertext has been altered;
    /// this is never retried with another password.
    #[error("Integrity check failed for entry: {entry}")]
    IntegrityCheckFailed {
        /// Name of the tampered entry.
        entry: String,
    },

    /// Compression or decompression failure.
    #[error("Codec error: {message}")]
    Codec {
        /// Description from the codec.
        message: String,
    },

    /// Malformed container structure.
    #[error("Invalid header: {message}")]
    InvalidHeader {
        /// Description of the header error.
        message: String,
    },

    /// CRC checksum mismatch after decoding.
    #[error("CRC mismatch: expected {expected:#x}, computed {computed:#x}")]
    CrcMismatch {
        /// Expected CRC value from the archive.
        expected: u32,
        /// Computed CRC value of the decoded data.
        computed: u32,
    },
}

/// Result type alias for ZipSeal operations.
pub type Result<T> = std::result::Result<T, ZipSealError>;

impl ZipSealError {
    /// Create a not-an-archive error.
    pub fn not_an_archive(path: impl Into<String>) -> Self {
        Self::NotAnArchive { path: path.into() }
    }

    /// Create an unsupported scheme error.
    pub fn unsupported_scheme(entry: impl Into<String>) -> Self {
        Self::UnsupportedScheme {
            entry: entry.into(),
        }
    }

    /// Create an invalid credential error.
    pub fn invalid_credential(entry: impl Into<String>) -> Self {
        Self::InvalidCredential {
            entry: entry.into(),
        }
    }

    /// Create an integrity check error.
    pub fn integrity_check_failed(entry: impl Into<String>) -> Self {
        Self::IntegrityCheckFailed {
            entry: entry.into(),
        }
    }

    /// Create a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Create an invalid header error.
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            message: message.into(),
        }
    }

    /// Create a CRC mismatch error.
    pub fn crc_mismatch(expected: u32, computed: u32) -> Self {
        Self::CrcMismatch { expected, computed }
    }
}
