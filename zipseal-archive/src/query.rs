//! Query operations: detection, description, and password verification.
//!
//! These are the read-only operations behind the `show` and `verify`
//! commands. All of them are total: I/O errors, foreign formats, and
//! damaged archives fold into `false` or a diagnostic string rather than
//! surfacing as errors.

use crate::entry::EncryptionScheme;
use crate::pipeline::{check_entry_password, check_prefix_len};
use crate::read::{sniff_format, ZipReader};
use std::fs::File;
use std::path::Path;
use zipseal_core::Result;

fn has_zip_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("zip"))
        .unwrap_or(false)
}

fn open_sniffed(path: &Path) -> Option<File> {
    let mut file = File::open(path).ok()?;
    if sniff_format(&mut file) {
        Some(file)
    } else {
        None
    }
}

/// Whether the path names a readable ZIP archive.
///
/// Requires the `.zip` extension (ASCII case-insensitive) and a container
/// that passes the format sniff.
pub fn is_archive(path: &Path) -> bool {
    has_zip_extension(path) && open_sniffed(path).is_some()
}

/// Whether any entry of the archive is encrypted.
///
/// Non-archives and unreadable files are reported as not encrypted.
pub fn is_encrypted(path: &Path) -> bool {
    let Some(file) = open_sniffed(path) else {
        return false;
    };
    match ZipReader::new(file) {
        Ok(reader) => reader
            .entries()
            .iter()
            .any(|e| e.scheme != EncryptionScheme::None),
        Err(_) => false,
    }
}

/// Describe the encryption of every entry, one line per entry.
///
/// Output matches the `show` command: a `List of items:` heading followed
/// by `name:\tlabel` lines in archive order. Non-archives report
/// `Not zip file`; archives whose directory cannot be read report
/// `Unsupported file format`.
pub fn describe_encryption(path: &Path) -> String {
    let Some(file) = open_sniffed(path) else {
        return "Not zip file".to_string();
    };

    let mut out = String::from("List of items:");
    match ZipReader::new(file) {
        Ok(reader) => {
            for entry in reader.entries() {
                out.push('\n');
                out.push_str(&entry.name);
                out.push_str(":\t");
                out.push_str(entry.scheme.label());
            }
        }
        Err(_) => {
            out.push('\n');
            out.push_str("Unsupported file format");
        }
    }
    out
}

/// Verify a password against every file entry of the archive.
///
/// Uses the cheap per-scheme checks only (weak-cipher header, AES
/// verifier word); nothing is decompressed. Directory entries carry no
/// cipher framing and are skipped. Returns `false` for non-archives,
/// unreadable files, entries with unsupported schemes, and any entry that
/// rejects the password. An archive with no encrypted file entries
/// accepts any password.
pub fn verify_password(path: &Path, password: &str) -> bool {
    verify_inner(path, password).unwrap_or(false)
}

fn verify_inner(path: &Path, password: &str) -> Result<bool> {
    let Some(file) = open_sniffed(path) else {
        return Ok(false);
    };
    let mut reader = ZipReader::new(file)?;
    let entries = reader.entries().to_vec();

    for entry in &entries {
        if entry.is_dir() || entry.scheme == EncryptionScheme::None {
            continue;
        }
        if entry.scheme == EncryptionScheme::Unsupported {
            return Ok(false);
        }
        let prefix = reader.read_raw_prefix(entry, check_prefix_len(entry))?;
        if !check_entry_password(&prefix, entry, password)? {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_archive_requires_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"not relevant").unwrap();
        assert!(!is_archive(&path));
    }

    #[test]
    fn test_non_archive_reports_not_zip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.zip");
        let mut file = File::create(&path).unwrap();
        file.write_all(b"plain text pretending to be a zip").unwrap();
        drop(file);

        assert!(!is_archive(&path));
        assert!(!is_encrypted(&path));
        assert_eq!(describe_encryption(&path), "Not zip file");
        assert!(!verify_password(&path, "anything"));
    }

    #[test]
    fn test_missing_file_folds_to_false() {
        let path = Path::new("/nonexistent/nowhere.zip");
        assert!(!is_archive(path));
        assert!(!is_encrypted(path));
        assert_eq!(describe_encryption(path), "Not zip file");
        assert!(!verify_password(path, "pw"));
    }
}
