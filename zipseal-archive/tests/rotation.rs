//! End-to-end rotation tests over real files.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use zipseal_archive::entry::{FLAG_ENCRYPTED, FLAG_STRONG_ENCRYPTION};
use zipseal_archive::pipeline::encode_entry;
use zipseal_archive::write::{RawFileEntry, ZipWriter};
use zipseal_archive::{
    add_password, change_password, change_password_with, describe_encryption, is_encrypted,
    query, remove_password, EncryptionScheme, ZipReader,
};
use zipseal_core::ZipSealError;

/// Entries for a test archive: `(name, contents)`, `None` for a directory.
type Layout<'a> = &'a [(&'a str, Option<&'a [u8]>)];

fn build_archive(path: &Path, layout: Layout<'_>, scheme: EncryptionScheme, password: &str) {
    let mut file = File::create(path).unwrap();
    let mut writer = ZipWriter::new(&mut file);
    for (name, contents) in layout {
        match contents {
            None => writer.add_directory(name, 0x6000, 0x58CF).unwrap(),
            Some(data) => {
                let encoded = encode_entry(data, name, scheme, password).unwrap();
                writer
                    .add_file_raw(&RawFileEntry {
                        name,
                        flags: encoded.flags,
                        method: encoded.method,
                        mtime: 0x6000,
                        mdate: 0x58CF,
                        crc32: encoded.crc32,
                        uncompressed_size: encoded.uncompressed_size,
                        extra: &encoded.extra,
                        payload: &encoded.payload,
                    })
                    .unwrap();
            }
        }
    }
    writer.finish().unwrap();
}

/// Decode every entry; directories come back as `None`.
fn read_contents(path: &Path, password: &str) -> Vec<(String, Option<Vec<u8>>)> {
    let mut reader = ZipReader::new(File::open(path).unwrap()).unwrap();
    let entries = reader.entries().to_vec();
    entries
        .iter()
        .map(|entry| {
            if entry.is_dir() {
                (entry.name.clone(), None)
            } else {
                let raw = reader.read_raw(entry).unwrap();
                let data =
                    zipseal_archive::pipeline::decode_entry(&raw, entry, password).unwrap();
                (entry.name.clone(), Some(data))
            }
        })
        .collect()
}

fn schemes_of(path: &Path) -> Vec<EncryptionScheme> {
    let reader = ZipReader::new(File::open(path).unwrap()).unwrap();
    reader.entries().iter().map(|e| e.scheme).collect()
}

const DOCS: Layout<'static> = &[
    ("notes.txt", Some(b"hello")),
    ("sub/", None),
    ("sub/data.bin", Some(&[0u8, 1, 2, 3, 255, 254])),
];

fn temp_archive(layout: Layout<'_>, scheme: EncryptionScheme, password: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("docs.zip");
    build_archive(&path, layout, scheme, password);
    (dir, path)
}

#[test]
fn add_then_remove_password_roundtrip() {
    let (_dir, path) = temp_archive(DOCS, EncryptionScheme::None, "");
    let original = read_contents(&path, "");

    add_password(&path, "hunter2").unwrap();
    assert!(is_encrypted(&path));
    assert!(schemes_of(&path)
        .iter()
        .zip(DOCS)
        .all(|(s, (_, c))| c.is_none() || *s == EncryptionScheme::WinZipAes256));

    remove_password(&path, "hunter2").unwrap();
    assert!(!is_encrypted(&path));
    assert_eq!(read_contents(&path, ""), original);
}

#[test]
fn change_password_weak_to_aes() {
    let (_dir, path) = temp_archive(DOCS, EncryptionScheme::PkzipWeak, "old1");

    change_password(&path, "old1", "new2").unwrap();

    assert!(query::verify_password(&path, "new2"));
    assert!(!query::verify_password(&path, "old1"));
    let contents = read_contents(&path, "new2");
    assert_eq!(contents[0], ("notes.txt".to_string(), Some(b"hello".to_vec())));
    assert_eq!(contents[1], ("sub/".to_string(), None));
}

#[test]
fn explicit_scheme_rotation() {
    let (_dir, path) = temp_archive(DOCS, EncryptionScheme::None, "");

    change_password_with(&path, "", "pw", EncryptionScheme::PkzipWeak).unwrap();
    let schemes = schemes_of(&path);
    assert_eq!(schemes[0], EncryptionScheme::PkzipWeak);
    assert!(query::verify_password(&path, "pw"));

    change_password_with(&path, "pw", "pw", EncryptionScheme::WinZipAes128).unwrap();
    assert_eq!(schemes_of(&path)[0], EncryptionScheme::WinZipAes128);
    assert_eq!(
        read_contents(&path, "pw")[0].1.as_deref(),
        Some(b"hello".as_slice())
    );
}

#[test]
fn noop_rotation_preserves_contents() {
    let (_dir, path) = temp_archive(DOCS, EncryptionScheme::WinZipAes256, "same");
    let before = read_contents(&path, "same");

    change_password(&path, "same", "same").unwrap();
    assert_eq!(read_contents(&path, "same"), before);
}

#[test]
fn wrong_password_aborts_without_touching_source() {
    for scheme in [EncryptionScheme::PkzipWeak, EncryptionScheme::WinZipAes256] {
        let (_dir, path) = temp_archive(DOCS, scheme, "right");
        let original_bytes = fs::read(&path).unwrap();

        let err = change_password(&path, "wrong", "new").unwrap_err();
        assert!(matches!(err, ZipSealError::InvalidCredential { .. }));
        assert_eq!(fs::read(&path).unwrap(), original_bytes);
    }
}

#[test]
fn tampered_aes_entry_fails_integrity_and_preserves_source() {
    let (_dir, path) = temp_archive(DOCS, EncryptionScheme::WinZipAes256, "pw");

    // Flip one ciphertext byte of the first file entry: past the 16-byte
    // salt and 2-byte verifier so the password still checks out.
    let entry = {
        let reader = ZipReader::new(File::open(&path).unwrap()).unwrap();
        reader.entries()[0].clone()
    };
    let mut bytes = fs::read(&path).unwrap();
    let ct_offset = entry.data_offset as usize + 16 + 2;
    bytes[ct_offset] ^= 0x01;
    fs::write(&path, &bytes).unwrap();

    let tampered = fs::read(&path).unwrap();
    let err = change_password(&path, "pw", "new").unwrap_err();
    assert!(matches!(err, ZipSealError::IntegrityCheckFailed { .. }));
    assert_eq!(fs::read(&path).unwrap(), tampered);

    // Tampering is also not a password problem for verify: the cheap
    // check still passes, only decoding fails.
    assert!(query::verify_password(&path, "pw"));
}

#[test]
fn unsupported_entry_aborts_rotation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("strong.zip");

    // One ordinary entry plus one flagged with PKWARE strong encryption.
    let mut file = File::create(&path).unwrap();
    let mut writer = ZipWriter::new(&mut file);
    let encoded = encode_entry(b"plain", "a.txt", EncryptionScheme::None, "").unwrap();
    writer
        .add_file_raw(&RawFileEntry {
            name: "a.txt",
            flags: encoded.flags,
            method: encoded.method,
            mtime: 0,
            mdate: 0x0021,
            crc32: encoded.crc32,
            uncompressed_size: encoded.uncompressed_size,
            extra: &encoded.extra,
            payload: &encoded.payload,
        })
        .unwrap();
    writer
        .add_file_raw(&RawFileEntry {
            name: "sealed.bin",
            flags: FLAG_ENCRYPTED | FLAG_STRONG_ENCRYPTION,
            method: 8,
            mtime: 0,
            mdate: 0x0021,
            crc32: 0x12345678,
            uncompressed_size: 32,
            extra: &[],
            payload: &[0u8; 48],
        })
        .unwrap();
    writer.finish().unwrap();
    drop(writer);
    drop(file);

    let original = fs::read(&path).unwrap();
    assert_eq!(schemes_of(&path)[1], EncryptionScheme::Unsupported);

    let err = add_password(&path, "pw").unwrap_err();
    assert!(matches!(err, ZipSealError::UnsupportedScheme { .. }));
    assert_eq!(fs::read(&path).unwrap(), original);

    // The unsupported entry also makes verification fail outright.
    assert!(!query::verify_password(&path, "pw"));
}

#[test]
fn unsupported_directory_entry_aborts_rotation() {
    // A directory marker whose flags name PKWARE strong encryption is
    // still an unsupported entry, not a plain directory.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("strongdir.zip");

    let mut file = File::create(&path).unwrap();
    let mut writer = ZipWriter::new(&mut file);
    writer
        .add_file_raw(&RawFileEntry {
            name: "sealed/",
            flags: FLAG_ENCRYPTED | FLAG_STRONG_ENCRYPTION,
            method: 0,
            mtime: 0,
            mdate: 0x0021,
            crc32: 0,
            uncompressed_size: 0,
            extra: &[],
            payload: &[],
        })
        .unwrap();
    writer.finish().unwrap();
    drop(writer);
    drop(file);

    let original = fs::read(&path).unwrap();
    let entries = schemes_of(&path);
    assert_eq!(entries, vec![EncryptionScheme::Unsupported]);

    let err = add_password(&path, "pw").unwrap_err();
    assert!(matches!(err, ZipSealError::UnsupportedScheme { .. }));
    assert_eq!(fs::read(&path).unwrap(), original);
}

#[test]
fn rotation_refuses_non_archive() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.zip");
    fs::write(&path, b"just some text, no ZIP records here").unwrap();

    let err = add_password(&path, "pw").unwrap_err();
    assert!(matches!(err, ZipSealError::NotAnArchive { .. }));
    assert_eq!(fs::read(&path).unwrap(), b"just some text, no ZIP records here");
}

#[test]
fn describe_encryption_lists_schemes() {
    let (_dir, path) = temp_archive(DOCS, EncryptionScheme::PkzipWeak, "pw");
    let report = describe_encryption(&path);
    assert_eq!(
        report,
        "List of items:\n\
         notes.txt:\tPKZip classic encryption\n\
         sub/:\tNone\n\
         sub/data.bin:\tPKZip classic encryption"
    );
}

#[test]
fn verify_skips_directories() {
    // Directory markers carry no cipher framing; only file entries are
    // checked.
    let (_dir, path) = temp_archive(
        &[("sub/", None), ("sub/x.txt", Some(b"x"))],
        EncryptionScheme::WinZipAes128,
        "pw",
    );
    assert!(query::verify_password(&path, "pw"));
    assert!(!query::verify_password(&path, "other"));
}

#[test]
fn scenario_weak_docs_rotation() {
    // docs.zip protected with the weak cipher under "old1": rotate to
    // "new2", verify both passwords, then extract and read the text back.
    let (dir, path) = temp_archive(
        &[("notes.txt", Some(b"hello")), ("sub/", None)],
        EncryptionScheme::PkzipWeak,
        "old1",
    );

    change_password(&path, "old1", "new2").unwrap();
    assert!(query::verify_password(&path, "new2"));
    assert!(!query::verify_password(&path, "old1"));

    let out = dir.path().join("extracted");
    fs::create_dir(&out).unwrap();
    zipseal_archive::fs::extract_all(&path, Some(&out), "new2").unwrap();
    assert_eq!(fs::read(out.join("notes.txt")).unwrap(), b"hello");
    assert!(out.join("sub").is_dir());
}

#[test]
fn duplicate_names_are_preserved() {
    let (_dir, path) = temp_archive(
        &[("same.txt", Some(b"first")), ("same.txt", Some(b"second"))],
        EncryptionScheme::None,
        "",
    );

    add_password(&path, "pw").unwrap();
    let contents = read_contents(&path, "pw");
    assert_eq!(contents.len(), 2);
    assert_eq!(contents[0], ("same.txt".to_string(), Some(b"first".to_vec())));
    assert_eq!(contents[1], ("same.txt".to_string(), Some(b"second".to_vec())));
}
