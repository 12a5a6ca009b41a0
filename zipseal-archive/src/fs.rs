//! Filesystem operations: create an archive from a path and extract an
//! archive to disk.

use crate::entry::EncryptionScheme;
use crate::pipeline::{decode_entry, encode_entry};
use crate::read::{sniff_format, ZipReader};
use crate::write::{RawFileEntry, ZipWriter};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use zipseal_core::{dostime, Result, ZipSealError};

fn scheme_for(password: &str) -> EncryptionScheme {
    if password.is_empty() {
        EncryptionScheme::None
    } else {
        EncryptionScheme::WinZipAes256
    }
}

fn dos_mtime_of(path: &Path) -> (u16, u16) {
    let modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(std::time::UNIX_EPOCH);
    let (mdate, mtime) = dostime::system_time_to_dos(modified);
    (mtime, mdate)
}

/// Archive-relative entry name: forward slashes, no leading separator.
fn entry_name(base: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(base)
        .map_err(|_| ZipSealError::invalid_header("path escapes the archive root"))?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

/// Collect the contents of a directory tree, directories first within each
/// level, in a deterministic order.
fn walk(dir: &Path, out: &mut Vec<(PathBuf, bool)>) -> Result<()> {
    let mut children: Vec<_> = fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    children.sort_by_key(|e| e.file_name());

    for child in children {
        let path = child.path();
        let file_type = child.file_type()?;
        if file_type.is_dir() {
            out.push((path.clone(), true));
            walk(&path, out)?;
        } else if file_type.is_file() {
            out.push((path, false));
        }
        // Symlinks and special files are skipped.
    }
    Ok(())
}

/// Create a ZIP archive from a file or directory tree.
///
/// A file becomes a single-entry archive; a directory is archived
/// recursively with names relative to it, directory entries included
/// (empty directories survive). A non-empty password encrypts every file
/// entry with AES-256. `dest` defaults to the source path with `.zip`
/// appended. Returns the path of the created archive.
pub fn compress_path(src: &Path, dest: Option<&Path>, password: &str) -> Result<PathBuf> {
    let dest = match dest {
        Some(d) => d.to_path_buf(),
        None => {
            let mut os = src.as_os_str().to_os_string();
            os.push(".zip");
            PathBuf::from(os)
        }
    };
    let scheme = scheme_for(password);

    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    let mut writer = ZipWriter::new(temp.as_file_mut());

    let meta = fs::metadata(src)?;
    if meta.is_dir() {
        let mut contents = Vec::new();
        walk(src, &mut contents)?;
        for (path, is_dir) in contents {
            let name = entry_name(src, &path)?;
            let (mtime, mdate) = dos_mtime_of(&path);
            if is_dir {
                writer.add_directory(&name, mtime, mdate)?;
            } else {
                add_file(&mut writer, &path, &name, scheme, password, mtime, mdate)?;
            }
        }
    } else {
        let name = src
            .file_name()
            .ok_or_else(|| ZipSealError::invalid_header("source path has no file name"))?
            .to_string_lossy()
            .into_owned();
        let (mtime, mdate) = dos_mtime_of(src);
        add_file(&mut writer, src, &name, scheme, password, mtime, mdate)?;
    }

    writer.finish()?;
    temp.persist(&dest).map_err(|e| ZipSealError::Io(e.error))?;
    Ok(dest)
}

fn add_file(
    writer: &mut ZipWriter<&mut File>,
    path: &Path,
    name: &str,
    scheme: EncryptionScheme,
    password: &str,
    mtime: u16,
    mdate: u16,
) -> Result<()> {
    let data = fs::read(path)?;
    let encoded = encode_entry(&data, name, scheme, password)?;
    writer.add_file_raw(&RawFileEntry {
        name,
        flags: encoded.flags,
        method: encoded.method,
        mtime,
        mdate,
        crc32: encoded.crc32,
        uncompressed_size: encoded.uncompressed_size,
        extra: &encoded.extra,
        payload: &encoded.payload,
    })
}

/// A traversal-safe on-disk path for an entry name.
///
/// Drops root and parent components, so a hostile `../../etc/passwd`
/// entry lands inside the destination. Returns `None` when nothing safe
/// remains.
fn sanitized_name(name: &str) -> Option<PathBuf> {
    let mut path = PathBuf::new();
    for part in name.split(['/', '\\']) {
        if part.is_empty() || part == "." || part == ".." {
            continue;
        }
        path.push(part);
    }
    if path.as_os_str().is_empty() {
        None
    } else {
        Some(path)
    }
}

/// Extract every entry of an archive to disk.
///
/// `dest_dir` defaults to the archive's directory. Parent directories are
/// created as needed and entry names are sanitized against path
/// traversal. Every entry must decode under the password; a failure
/// mid-extraction leaves already-written files in place.
pub fn extract_all(src: &Path, dest_dir: Option<&Path>, password: &str) -> Result<()> {
    let dest = match dest_dir {
        Some(d) => d.to_path_buf(),
        None => src
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };

    let mut file = File::open(src)?;
    if !sniff_format(&mut file) {
        return Err(ZipSealError::not_an_archive(src.to_string_lossy()));
    }

    let mut reader = ZipReader::new(file)?;
    let entries = reader.entries().to_vec();

    for entry in &entries {
        let Some(relative) = sanitized_name(&entry.name) else {
            continue;
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = reader.read_raw(entry)?;
        let data = decode_entry(&raw, entry, password)?;
        fs::write(&target, data)?;
    }

    Ok(())
}
