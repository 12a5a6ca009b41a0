//! Per-entry decode and encode pipeline.
//!
//! Decoding strips the entry's cipher framing, decrypts, decompresses, and
//! checks the CRC. Encoding runs the same stages in reverse under a target
//! scheme. Dispatch happens once per entry on the classified scheme; the
//! hot loops below it are monomorphic.

use crate::aes::{self, AesExtraField, AesStrength, AUTH_TAG_SIZE, VERIFIER_SIZE};
use crate::crypto::{header_check_value, ZipCrypto, ENCRYPTION_HEADER_SIZE};
use crate::entry::{CompressionMethod, EncryptionScheme, ZipEntry, FLAG_ENCRYPTED};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use zipseal_core::{Crc32, Result, ZipSealError};

/// Deflate level used when encoding entries.
const DEFLATE_LEVEL: u32 = 6;

/// Compress with raw deflate. Falls back to the input when deflate does
/// not shrink it; the caller records the method accordingly.
pub fn compress(data: &[u8]) -> Result<(Vec<u8>, CompressionMethod)> {
    let mut encoder = DeflateEncoder::new(
        Vec::with_capacity(data.len() / 2),
        Compression::new(DEFLATE_LEVEL),
    );
    encoder
        .write_all(data)
        .and_then(|()| encoder.finish())
        .map_err(|e| ZipSealError::codec(format!("deflate failed: {e}")))
        .map(|compressed| {
            if compressed.len() < data.len() {
                (compressed, CompressionMethod::Deflate)
            } else {
                (data.to_vec(), CompressionMethod::Stored)
            }
        })
}

/// Decompress an entry's data according to its compression method.
pub fn decompress(data: &[u8], method: CompressionMethod, expected_size: usize) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::Stored => Ok(data.to_vec()),
        CompressionMethod::Deflate => {
            let mut out = Vec::with_capacity(expected_size);
            DeflateDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|e| ZipSealError::codec(format!("inflate failed: {e}")))?;
            Ok(out)
        }
        CompressionMethod::Aes | CompressionMethod::Unknown(_) => Err(ZipSealError::codec(
            format!("unsupported compression method: {}", method.to_u16()),
        )),
    }
}

fn verify_crc(entry_crc: u32, data: &[u8]) -> Result<()> {
    let computed = Crc32::compute(data);
    if computed != entry_crc {
        return Err(ZipSealError::crc_mismatch(entry_crc, computed));
    }
    Ok(())
}

fn aes_strength(entry: &ZipEntry) -> Result<(AesStrength, AesExtraField)> {
    let field = entry
        .aes
        .ok_or_else(|| ZipSealError::unsupported_scheme(&entry.name))?;
    let strength = AesStrength::from_strength_byte(field.strength)
        .ok_or_else(|| ZipSealError::unsupported_scheme(&entry.name))?;
    Ok((strength, field))
}

/// Decode an entry's raw payload to its original bytes.
///
/// The password is ignored for unencrypted entries. Errors distinguish a
/// wrong password (`InvalidCredential`) from tampering
/// (`IntegrityCheckFailed`) and from structural damage.
pub fn decode_entry(raw: &[u8], entry: &ZipEntry, password: &str) -> Result<Vec<u8>> {
    let expected_size = entry.uncompressed_size as usize;
    match entry.scheme {
        EncryptionScheme::None => {
            let data = decompress(raw, entry.method, expected_size)?;
            verify_crc(entry.crc32, &data)?;
            Ok(data)
        }
        EncryptionScheme::PkzipWeak => {
            if raw.len() < ENCRYPTION_HEADER_SIZE {
                return Err(ZipSealError::invalid_header(format!(
                    "encrypted payload too short for entry {}",
                    entry.name
                )));
            }
            let mut cipher = ZipCrypto::new(password.as_bytes());
            let mut header = [0u8; ENCRYPTION_HEADER_SIZE];
            header.copy_from_slice(&raw[..ENCRYPTION_HEADER_SIZE]);
            let check = header_check_value(entry.crc32, entry.flags, entry.mtime);
            if !cipher.verify_header(&header, check) {
                return Err(ZipSealError::invalid_credential(&entry.name));
            }

            let mut data = raw[ENCRYPTION_HEADER_SIZE..].to_vec();
            cipher.decrypt_buffer(&mut data);
            let data = decompress(&data, entry.method, expected_size)?;
            verify_crc(entry.crc32, &data)?;
            Ok(data)
        }
        EncryptionScheme::WinZipAes128 | EncryptionScheme::WinZipAes256 => {
            let (strength, field) = aes_strength(entry)?;
            let compressed =
                aes::decrypt_payload(raw, password.as_bytes(), strength, &entry.name)?;
            let method = CompressionMethod::from_u16(field.method);
            let data = decompress(&compressed, method, expected_size)?;
            // AE-2 zeroes the CRC field and relies on the tag; AE-1 keeps it.
            if field.vendor_version == 1 {
                verify_crc(entry.crc32, &data)?;
            }
            Ok(data)
        }
        EncryptionScheme::Unsupported => Err(ZipSealError::unsupported_scheme(&entry.name)),
    }
}

/// Cheap password test for one entry, without decompressing anything.
///
/// `prefix` needs only the leading cipher framing of the payload (see
/// [`check_prefix_len`]). Unencrypted entries accept any password.
pub fn check_entry_password(prefix: &[u8], entry: &ZipEntry, password: &str) -> Result<bool> {
    match entry.scheme {
        EncryptionScheme::None => Ok(true),
        EncryptionScheme::PkzipWeak => {
            if prefix.len() < ENCRYPTION_HEADER_SIZE {
                return Err(ZipSealError::invalid_header(format!(
                    "encrypted payload too short for entry {}",
                    entry.name
                )));
            }
            let mut header = [0u8; ENCRYPTION_HEADER_SIZE];
            header.copy_from_slice(&prefix[..ENCRYPTION_HEADER_SIZE]);
            let check = header_check_value(entry.crc32, entry.flags, entry.mtime);
            Ok(ZipCrypto::new(password.as_bytes()).verify_header(&header, check))
        }
        EncryptionScheme::WinZipAes128 | EncryptionScheme::WinZipAes256 => {
            let (strength, _) = aes_strength(entry)?;
            aes::check_password(prefix, password.as_bytes(), strength)
        }
        EncryptionScheme::Unsupported => Err(ZipSealError::unsupported_scheme(&entry.name)),
    }
}

/// How many leading payload bytes [`check_entry_password`] needs.
pub fn check_prefix_len(entry: &ZipEntry) -> usize {
    match entry.scheme {
        EncryptionScheme::None | EncryptionScheme::Unsupported => 0,
        EncryptionScheme::PkzipWeak => ENCRYPTION_HEADER_SIZE,
        EncryptionScheme::WinZipAes128 => AesStrength::Aes128.salt_len() + VERIFIER_SIZE,
        EncryptionScheme::WinZipAes256 => AesStrength::Aes256.salt_len() + VERIFIER_SIZE,
    }
}

/// A freshly encoded entry and the header fields describing it.
#[derive(Debug)]
pub struct EncodedEntry {
    /// Stored payload, including cipher framing.
    pub payload: Vec<u8>,
    /// Method value for the headers (99 for AES entries).
    pub method: u16,
    /// General purpose bit flags.
    pub flags: u16,
    /// CRC-32 field value (0 for AE-2 entries).
    pub crc32: u32,
    /// Uncompressed size.
    pub uncompressed_size: u32,
    /// Extra field bytes.
    pub extra: Vec<u8>,
}

/// Encode plaintext under a target scheme.
///
/// Data is deflated (or stored, when deflate does not shrink it) and then
/// wrapped per the scheme: a fresh random encryption header for the weak
/// cipher, a fresh salt and derived keys for AES (written as AE-2).
pub fn encode_entry(
    plaintext: &[u8],
    name: &str,
    scheme: EncryptionScheme,
    password: &str,
) -> Result<EncodedEntry> {
    if plaintext.len() > u32::MAX as usize {
        return Err(ZipSealError::invalid_header(
            "entry exceeds the 32-bit ZIP size limit",
        ));
    }
    let crc32 = Crc32::compute(plaintext);
    let uncompressed_size = plaintext.len() as u32;
    let (compressed, method) = compress(plaintext)?;

    match scheme {
        EncryptionScheme::None => Ok(EncodedEntry {
            payload: compressed,
            method: method.to_u16(),
            flags: 0,
            crc32,
            uncompressed_size,
            extra: vec![],
        }),
        EncryptionScheme::PkzipWeak => {
            let mut cipher = ZipCrypto::new(password.as_bytes());
            // No data descriptor on write, so the check value comes from
            // the CRC.
            let header = cipher.generate_header((crc32 >> 16) as u16);
            let mut payload = Vec::with_capacity(ENCRYPTION_HEADER_SIZE + compressed.len());
            payload.extend_from_slice(&header);
            let mut data = compressed;
            cipher.encrypt_buffer(&mut data);
            payload.extend_from_slice(&data);

            Ok(EncodedEntry {
                payload,
                method: method.to_u16(),
                flags: FLAG_ENCRYPTED,
                crc32,
                uncompressed_size,
                extra: vec![],
            })
        }
        EncryptionScheme::WinZipAes128 | EncryptionScheme::WinZipAes256 => {
            let strength = match scheme {
                EncryptionScheme::WinZipAes128 => AesStrength::Aes128,
                _ => AesStrength::Aes256,
            };
            let payload = aes::encrypt_payload(&compressed, password.as_bytes(), strength)?;
            let field = AesExtraField {
                vendor_version: 2,
                strength: strength.strength_byte(),
                method: method.to_u16(),
            };

            Ok(EncodedEntry {
                payload,
                method: 99,
                flags: FLAG_ENCRYPTED,
                crc32: 0,
                uncompressed_size,
                extra: field.to_bytes().to_vec(),
            })
        }
        EncryptionScheme::Unsupported => Err(ZipSealError::unsupported_scheme(name)),
    }
}

/// Stored-payload overhead added by a scheme's cipher framing.
pub fn payload_overhead(scheme: EncryptionScheme) -> usize {
    match scheme {
        EncryptionScheme::None | EncryptionScheme::Unsupported => 0,
        EncryptionScheme::PkzipWeak => ENCRYPTION_HEADER_SIZE,
        EncryptionScheme::WinZipAes128 => {
            AesStrength::Aes128.salt_len() + VERIFIER_SIZE + AUTH_TAG_SIZE
        }
        EncryptionScheme::WinZipAes256 => {
            AesStrength::Aes256.salt_len() + VERIFIER_SIZE + AUTH_TAG_SIZE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_for(encoded: &EncodedEntry, name: &str) -> ZipEntry {
        let method = CompressionMethod::from_u16(encoded.method);
        let aes = AesExtraField::find(&encoded.extra);
        ZipEntry {
            name: name.to_string(),
            flags: encoded.flags,
            method,
            mtime: 0x6000,
            mdate: 0x58CF,
            crc32: encoded.crc32,
            compressed_size: encoded.payload.len() as u32,
            uncompressed_size: encoded.uncompressed_size,
            data_offset: 0,
            aes,
            scheme: EncryptionScheme::classify(encoded.flags, method, aes.as_ref()),
        }
    }

    #[test]
    fn test_compress_falls_back_to_store() {
        // High-entropy bytes do not deflate.
        let data: Vec<u8> = (0..64u32)
            .map(|i| (i.wrapping_mul(2654435761) >> 24) as u8)
            .collect();
        let (out, method) = compress(&data).unwrap();
        if method == CompressionMethod::Stored {
            assert_eq!(out, data);
        } else {
            assert!(out.len() < data.len());
        }

        // Repetitive data always deflates.
        let (out, method) = compress(&vec![b'a'; 4096]).unwrap();
        assert_eq!(method, CompressionMethod::Deflate);
        assert!(out.len() < 4096);
    }

    #[test]
    fn test_encode_decode_plain() {
        let encoded = encode_entry(b"hello world", "a.txt", EncryptionScheme::None, "").unwrap();
        let entry = entry_for(&encoded, "a.txt");
        assert_eq!(entry.scheme, EncryptionScheme::None);
        let decoded = decode_entry(&encoded.payload, &entry, "").unwrap();
        assert_eq!(decoded, b"hello world");
    }

    #[test]
    fn test_encode_decode_weak_cipher() {
        let encoded =
            encode_entry(b"hello", "a.txt", EncryptionScheme::PkzipWeak, "old1").unwrap();
        let entry = entry_for(&encoded, "a.txt");
        assert_eq!(entry.scheme, EncryptionScheme::PkzipWeak);
        assert_eq!(decode_entry(&encoded.payload, &entry, "old1").unwrap(), b"hello");
    }

    #[test]
    fn test_encode_decode_aes() {
        for scheme in [
            EncryptionScheme::WinZipAes128,
            EncryptionScheme::WinZipAes256,
        ] {
            let body = vec![b'x'; 2000];
            let encoded = encode_entry(&body, "a.txt", scheme, "pw").unwrap();
            assert_eq!(encoded.method, 99);
            assert_eq!(encoded.crc32, 0);

            let entry = entry_for(&encoded, "a.txt");
            assert_eq!(entry.scheme, scheme);
            assert_eq!(decode_entry(&encoded.payload, &entry, "pw").unwrap(), body);
        }
    }

    #[test]
    fn test_weak_cipher_wrong_password() {
        let encoded =
            encode_entry(b"hello", "a.txt", EncryptionScheme::PkzipWeak, "old1").unwrap();
        let entry = entry_for(&encoded, "a.txt");
        let err = decode_entry(&encoded.payload, &entry, "new2").unwrap_err();
        assert!(matches!(err, ZipSealError::InvalidCredential { .. }));
    }

    #[test]
    fn test_aes_wrong_password() {
        let encoded =
            encode_entry(b"hello", "a.txt", EncryptionScheme::WinZipAes256, "old1").unwrap();
        let entry = entry_for(&encoded, "a.txt");
        let err = decode_entry(&encoded.payload, &entry, "new2").unwrap_err();
        assert!(matches!(err, ZipSealError::InvalidCredential { .. }));
    }

    #[test]
    fn test_aes_tamper_detection() {
        let encoded =
            encode_entry(b"important data", "a.txt", EncryptionScheme::WinZipAes256, "pw").unwrap();
        let entry = entry_for(&encoded, "a.txt");

        let mut tampered = encoded.payload.clone();
        let ct_start = AesStrength::Aes256.salt_len() + VERIFIER_SIZE;
        tampered[ct_start] ^= 0x80;

        let err = decode_entry(&tampered, &entry, "pw").unwrap_err();
        assert!(matches!(err, ZipSealError::IntegrityCheckFailed { .. }));
    }

    #[test]
    fn test_check_entry_password_cheap_path() {
        let encoded =
            encode_entry(b"hello", "a.txt", EncryptionScheme::WinZipAes128, "pw").unwrap();
        let entry = entry_for(&encoded, "a.txt");

        let prefix = &encoded.payload[..check_prefix_len(&entry)];
        assert!(check_entry_password(prefix, &entry, "pw").unwrap());
        assert!(!check_entry_password(prefix, &entry, "other").unwrap());
    }

    #[test]
    fn test_unsupported_scheme_never_attempted() {
        let mut entry = entry_for(
            &encode_entry(b"x", "a.txt", EncryptionScheme::None, "").unwrap(),
            "a.txt",
        );
        entry.scheme = EncryptionScheme::Unsupported;
        let err = decode_entry(&[0u8; 16], &entry, "pw").unwrap_err();
        assert!(matches!(err, ZipSealError::UnsupportedScheme { .. }));
    }

    #[test]
    fn test_crc_mismatch_detected() {
        let mut encoded = encode_entry(b"hello", "a.txt", EncryptionScheme::None, "").unwrap();
        encoded.crc32 ^= 1;
        let entry = entry_for(&encoded, "a.txt");
        let err = decode_entry(&encoded.payload, &entry, "").unwrap_err();
        assert!(matches!(err, ZipSealError::CrcMismatch { .. }));
    }

    #[test]
    fn test_empty_file_roundtrip() {
        for scheme in [
            EncryptionScheme::None,
            EncryptionScheme::PkzipWeak,
            EncryptionScheme::WinZipAes256,
        ] {
            let encoded = encode_entry(b"", "empty.txt", scheme, "pw").unwrap();
            assert_eq!(encoded.payload.len(), payload_overhead(scheme));
            let entry = entry_for(&encoded, "empty.txt");
            assert_eq!(decode_entry(&encoded.payload, &entry, "pw").unwrap(), b"");
        }
    }
}
