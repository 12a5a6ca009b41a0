//! # ZipSeal Archive
//!
//! ZIP container codec and password rotation engine.
//!
//! This crate reads and writes 32-bit ZIP archives with the two encryption
//! schemes found in password-protected archives in the wild:
//!
//! - **PKWARE weak encryption** (ZipCrypto): the original stream cipher from
//!   APPNOTE.TXT. Kept for legacy compatibility only; it is not secure.
//! - **WinZip AES** (AE-1/AE-2): PBKDF2-derived keys, AES-CTR, and an
//!   HMAC-SHA1 authentication tag.
//!
//! On top of the codec sit the operations the `zipseal` tool exposes:
//!
//! - [`query`]: detect archives, describe per-entry encryption, and verify a
//!   password without decompressing anything.
//! - [`rotate`]: add, remove, or change an archive's password with atomic
//!   crash-safe replacement of the file.
//! - [`fs`]: create an archive from a file or directory tree and extract an
//!   archive to disk.
//!
//! ## Example
//!
//! ```no_run
//! use zipseal_archive::rotate::{add_password, remove_password};
//!
//! add_password("docs.zip".as_ref(), "hunter2")?;
//! remove_password("docs.zip".as_ref(), "hunter2")?;
//! # Ok::<(), zipseal_core::ZipSealError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod aes;
pub mod crypto;
pub mod entry;
pub mod fs;
pub mod header;
pub mod pipeline;
pub mod query;
pub mod read;
pub mod rotate;
pub mod write;

pub use entry::{CompressionMethod, EncryptionScheme, ZipEntry};
pub use query::{describe_encryption, is_archive, is_encrypted, verify_password};
pub use read::{sniff_format, ZipReader};
pub use rotate::{add_password, change_password, change_password_with, remove_password};
pub use write::ZipWriter;
