//! Password rotation with atomic crash-safe replacement.
//!
//! Rotation runs in strict phases: sniff the container, decode every entry
//! under the old credential, stage the plaintext, rewrite everything under
//! the new credential into a temporary file in the destination directory,
//! then atomically rename over the original. A failure in any phase leaves
//! the source archive untouched; the temporary file is deleted on drop.
//!
//! Plaintext is staged in spooled temporary files, so peak memory is
//! bounded by the spool threshold plus the largest single entry rather
//! than the archive size.

use crate::entry::EncryptionScheme;
use crate::pipeline::{decode_entry, encode_entry};
use crate::read::{sniff_format, ZipReader};
use crate::write::{RawFileEntry, ZipWriter};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::{NamedTempFile, SpooledTempFile};
use zipseal_core::{Result, ZipSealError};

/// Per-entry spool threshold before staged plaintext spills to disk.
const SPOOL_THRESHOLD: usize = 4 * 1024 * 1024;

/// One staged entry awaiting re-encoding.
enum Staged {
    /// Directory marker. Distinct from an empty file.
    Dir { name: String, mtime: u16, mdate: u16 },
    /// File plaintext, spooled to disk past the threshold.
    File {
        name: String,
        mtime: u16,
        mdate: u16,
        plaintext: SpooledTempFile,
    },
}

/// Change an archive's password from `old` to `new`.
///
/// An empty `old` means the archive is currently unprotected; an empty
/// `new` removes protection. Non-empty new passwords encrypt with
/// AES-256; use [`change_password_with`] for an explicit scheme.
pub fn change_password(path: &Path, old: &str, new: &str) -> Result<()> {
    let scheme = if new.is_empty() {
        EncryptionScheme::None
    } else {
        EncryptionScheme::WinZipAes256
    };
    change_password_with(path, old, new, scheme)
}

/// Add password protection to an unprotected archive.
pub fn add_password(path: &Path, new: &str) -> Result<()> {
    change_password(path, "", new)
}

/// Remove password protection from an archive.
pub fn remove_password(path: &Path, old: &str) -> Result<()> {
    change_password(path, old, "")
}

/// Change an archive's password, writing every entry under an explicit
/// target scheme.
///
/// The whole archive comes out under one scheme; per-entry mixes are not
/// produced even when the source was mixed.
pub fn change_password_with(
    path: &Path,
    old: &str,
    new: &str,
    scheme: EncryptionScheme,
) -> Result<()> {
    if scheme == EncryptionScheme::Unsupported {
        return Err(ZipSealError::unsupported_scheme(path.to_string_lossy()));
    }
    if scheme != EncryptionScheme::None && new.is_empty() {
        return Err(ZipSealError::invalid_credential(path.to_string_lossy()));
    }

    let mut source = File::open(path)?;
    if !sniff_format(&mut source) {
        return Err(ZipSealError::not_an_archive(path.to_string_lossy()));
    }

    // Phase 1: decode everything under the old credential. Any failure
    // here aborts before a single output byte exists.
    let staged = stage_entries(source, old)?;

    // Phase 2: rewrite under the new credential into a temp file next to
    // the destination, so the final rename stays on one filesystem.
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    write_staged(temp.as_file_mut(), staged, scheme, new)?;

    // Phase 3: commit. On any earlier failure the temp file is dropped
    // and deleted; the source is only replaced by this rename.
    temp.persist(path).map_err(|e| ZipSealError::Io(e.error))?;
    Ok(())
}

fn stage_entries(source: File, password: &str) -> Result<Vec<Staged>> {
    let mut reader = ZipReader::new(source)?;
    let entries = reader.entries().to_vec();
    let mut staged = Vec::with_capacity(entries.len());

    for entry in &entries {
        // Scheme first: even a directory marker can carry flags naming a
        // scheme this crate cannot rewrite.
        if entry.scheme == EncryptionScheme::Unsupported {
            return Err(ZipSealError::unsupported_scheme(&entry.name));
        }
        if entry.is_dir() {
            staged.push(Staged::Dir {
                name: entry.name.clone(),
                mtime: entry.mtime,
                mdate: entry.mdate,
            });
            continue;
        }

        let raw = reader.read_raw(entry)?;
        let plaintext = decode_entry(&raw, entry, password)?;

        let mut spool = SpooledTempFile::new(SPOOL_THRESHOLD);
        spool.write_all(&plaintext)?;
        staged.push(Staged::File {
            name: entry.name.clone(),
            mtime: entry.mtime,
            mdate: entry.mdate,
            plaintext: spool,
        });
    }

    Ok(staged)
}

fn write_staged(
    out: &mut File,
    staged: Vec<Staged>,
    scheme: EncryptionScheme,
    password: &str,
) -> Result<()> {
    let mut writer = ZipWriter::new(out);

    for item in staged {
        match item {
            Staged::Dir { name, mtime, mdate } => {
                writer.add_directory(&name, mtime, mdate)?;
            }
            Staged::File {
                name,
                mtime,
                mdate,
                mut plaintext,
            } => {
                plaintext.seek(SeekFrom::Start(0))?;
                let mut data = Vec::new();
                plaintext.read_to_end(&mut data)?;

                let encoded = encode_entry(&data, &name, scheme, password)?;
                writer.add_file_raw(&RawFileEntry {
                    name: &name,
                    flags: encoded.flags,
                    method: encoded.method,
                    mtime,
                    mdate,
                    crc32: encoded.crc32,
                    uncompressed_size: encoded.uncompressed_size,
                    extra: &encoded.extra,
                    payload: &encoded.payload,
                })?;
            }
        }
    }

    writer.finish()
}
