//! WinZip AES encryption (AE-1/AE-2).
//!
//! The scheme defined by WinZip's AES extension:
//!
//! - Keys are derived with PBKDF2-HMAC-SHA1 (1000 iterations) from the
//!   password and a fresh random salt. The derived block is split into the
//!   encryption key, the MAC key, and a 2-byte password verifier.
//! - Data is encrypted with AES in CTR mode. The 128-bit counter starts at
//!   1 and increments little-endian, which is not what generic CTR
//!   implementations default to, so the mode is implemented here over the
//!   block cipher.
//! - An HMAC-SHA1 over the ciphertext, truncated to 10 bytes, authenticates
//!   the entry.
//!
//! Entry payload layout: `salt ‖ verifier(2) ‖ ciphertext ‖ tag(10)`.
//!
//! A verifier mismatch means the password is wrong (with a 1/65536 false
//! accept rate); a tag mismatch after a good verifier means the ciphertext
//! was altered and is never treated as a password problem.

use aes::{Aes128, Aes256};
use cipher::generic_array::GenericArray;
use cipher::{BlockEncrypt, KeyInit};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha1::Sha1;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;
use zipseal_core::{Result, ZipSealError};

type HmacSha1 = Hmac<Sha1>;

/// Extra field header ID for WinZip AES.
pub const AES_EXTRA_FIELD_ID: u16 = 0x9901;

/// Size of the truncated HMAC-SHA1 authentication tag.
pub const AUTH_TAG_SIZE: usize = 10;

/// Size of the password verifier word.
pub const VERIFIER_SIZE: usize = 2;

/// PBKDF2 iteration count fixed by the WinZip AES specification.
pub const PBKDF2_ITERATIONS: u32 = 1000;

/// AES key strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AesStrength {
    /// AES-128: 8-byte salt, 16-byte key.
    Aes128,
    /// AES-256: 16-byte salt, 32-byte key.
    Aes256,
}

impl AesStrength {
    /// Salt length in bytes.
    pub fn salt_len(self) -> usize {
        match self {
            Self::Aes128 => 8,
            Self::Aes256 => 16,
        }
    }

    /// Key length in bytes.
    pub fn key_len(self) -> usize {
        match self {
            Self::Aes128 => 16,
            Self::Aes256 => 32,
        }
    }

    /// The strength byte stored in the extra field.
    pub fn strength_byte(self) -> u8 {
        match self {
            Self::Aes128 => 1,
            Self::Aes256 => 3,
        }
    }

    /// Map an extra-field strength byte. AES-192 (2) is not supported.
    pub fn from_strength_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Aes128),
            3 => Some(Self::Aes256),
            _ => None,
        }
    }
}

/// WinZip AES extra field (header ID 0x9901).
///
/// Carries the AE version, vendor ID "AE", key strength, and the real
/// compression method (the header method is the marker value 99).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AesExtraField {
    /// 1 for AE-1 (CRC present), 2 for AE-2 (CRC zeroed, tag is authority).
    pub vendor_version: u16,
    /// Strength byte: 1 = AES-128, 2 = AES-192, 3 = AES-256.
    pub strength: u8,
    /// The actual compression method of the entry data.
    pub method: u16,
}

impl AesExtraField {
    /// Search an extra-field blob for the AES field.
    ///
    /// Returns `None` when the field is absent or truncated; the caller
    /// classifies such entries as unsupported when method 99 is set.
    pub fn find(extra: &[u8]) -> Option<Self> {
        let mut offset = 0;
        while offset + 4 <= extra.len() {
            let header_id = u16::from_le_bytes([extra[offset], extra[offset + 1]]);
            let data_size = u16::from_le_bytes([extra[offset + 2], extra[offset + 3]]) as usize;
            offset += 4;

            if header_id == AES_EXTRA_FIELD_ID {
                if data_size < 7 || offset + 7 > extra.len() {
                    return None;
                }
                let field = &extra[offset..offset + 7];
                if &field[2..4] != b"AE" {
                    return None;
                }
                return Some(Self {
                    vendor_version: u16::from_le_bytes([field[0], field[1]]),
                    strength: field[4],
                    method: u16::from_le_bytes([field[5], field[6]]),
                });
            }

            offset += data_size;
        }
        None
    }

    /// Serialize the field including its ID and size prefix.
    pub fn to_bytes(self) -> [u8; 11] {
        let mut out = [0u8; 11];
        out[0..2].copy_from_slice(&AES_EXTRA_FIELD_ID.to_le_bytes());
        out[2..4].copy_from_slice(&7u16.to_le_bytes());
        out[4..6].copy_from_slice(&self.vendor_version.to_le_bytes());
        out[6..8].copy_from_slice(b"AE");
        out[8] = self.strength;
        out[9..11].copy_from_slice(&self.method.to_le_bytes());
        out
    }
}

fn hmac_sha1(key: &[u8]) -> Result<HmacSha1> {
    // Qualified: `cipher::KeyInit` is also in scope for the block ciphers.
    <HmacSha1 as Mac>::new_from_slice(key)
        .map_err(|_| ZipSealError::codec("invalid HMAC key length"))
}

/// PBKDF2 with HMAC-SHA1 as the PRF (RFC 2898).
fn pbkdf2_hmac_sha1(password: &[u8], salt: &[u8], iterations: u32, out: &mut [u8]) -> Result<()> {
    let mut block_index: u32 = 1;
    for chunk in out.chunks_mut(20) {
        let mut mac = hmac_sha1(password)?;
        mac.update(salt);
        mac.update(&block_index.to_be_bytes());
        let mut u = mac.finalize().into_bytes();

        let mut acc = [0u8; 20];
        acc.copy_from_slice(&u);
        for _ in 1..iterations {
            let mut mac = hmac_sha1(password)?;
            mac.update(&u);
            u = mac.finalize().into_bytes();
            for (a, b) in acc.iter_mut().zip(u.iter()) {
                *a ^= b;
            }
        }

        chunk.copy_from_slice(&acc[..chunk.len()]);
        block_index += 1;
    }
    Ok(())
}

/// Key material derived from a password and salt.
struct DerivedKeys {
    enc_key: Zeroizing<Vec<u8>>,
    mac_key: Zeroizing<Vec<u8>>,
    verifier: [u8; VERIFIER_SIZE],
}

fn derive_keys(password: &[u8], salt: &[u8], strength: AesStrength) -> Result<DerivedKeys> {
    let key_len = strength.key_len();
    let mut derived = Zeroizing::new(vec![0u8; 2 * key_len + VERIFIER_SIZE]);
    pbkdf2_hmac_sha1(password, salt, PBKDF2_ITERATIONS, &mut derived)?;

    let enc_key = Zeroizing::new(derived[..key_len].to_vec());
    let mac_key = Zeroizing::new(derived[key_len..2 * key_len].to_vec());
    let verifier = [derived[2 * key_len], derived[2 * key_len + 1]];
    Ok(DerivedKeys {
        enc_key,
        mac_key,
        verifier,
    })
}

enum BlockCipher {
    Aes128(Aes128),
    Aes256(Aes256),
}

/// AES-CTR with a little-endian 128-bit counter starting at 1.
struct AesCtr {
    cipher: BlockCipher,
    counter: u128,
    block: [u8; 16],
    used: usize,
}

impl AesCtr {
    fn new(key: &[u8], strength: AesStrength) -> Result<Self> {
        let cipher = match strength {
            AesStrength::Aes128 => Aes128::new_from_slice(key)
                .map(BlockCipher::Aes128)
                .map_err(|_| ZipSealError::codec("invalid AES-128 key length"))?,
            AesStrength::Aes256 => Aes256::new_from_slice(key)
                .map(BlockCipher::Aes256)
                .map_err(|_| ZipSealError::codec("invalid AES-256 key length"))?,
        };
        Ok(Self {
            cipher,
            counter: 1,
            block: [0u8; 16],
            used: 16,
        })
    }

    fn refill(&mut self) {
        self.block = self.counter.to_le_bytes();
        let block = GenericArray::from_mut_slice(&mut self.block);
        match &self.cipher {
            BlockCipher::Aes128(c) => c.encrypt_block(block),
            BlockCipher::Aes256(c) => c.encrypt_block(block),
        }
        self.counter = self.counter.wrapping_add(1);
        self.used = 0;
    }

    /// XOR the keystream into `data`. CTR mode, so this is both directions.
    fn apply_keystream(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            if self.used == 16 {
                self.refill();
            }
            *byte ^= self.block[self.used];
            self.used += 1;
        }
    }
}

fn auth_tag(mac_key: &[u8], ciphertext: &[u8]) -> Result<[u8; AUTH_TAG_SIZE]> {
    let mut mac = hmac_sha1(mac_key)?;
    mac.update(ciphertext);
    let full = mac.finalize().into_bytes();
    let mut tag = [0u8; AUTH_TAG_SIZE];
    tag.copy_from_slice(&full[..AUTH_TAG_SIZE]);
    Ok(tag)
}

/// Encrypt entry data under a fresh random salt.
///
/// Returns the complete payload as stored in the archive:
/// `salt ‖ verifier ‖ ciphertext ‖ tag`.
pub fn encrypt_payload(data: &[u8], password: &[u8], strength: AesStrength) -> Result<Vec<u8>> {
    let mut salt = vec![0u8; strength.salt_len()];
    rand::rng().fill_bytes(&mut salt);

    let keys = derive_keys(password, &salt, strength)?;
    let mut ciphertext = data.to_vec();
    AesCtr::new(&keys.enc_key, strength)?.apply_keystream(&mut ciphertext);
    let tag = auth_tag(&keys.mac_key, &ciphertext)?;

    let mut payload =
        Vec::with_capacity(salt.len() + VERIFIER_SIZE + ciphertext.len() + AUTH_TAG_SIZE);
    payload.extend_from_slice(&salt);
    payload.extend_from_slice(&keys.verifier);
    payload.extend_from_slice(&ciphertext);
    payload.extend_from_slice(&tag);
    Ok(payload)
}

/// Decrypt and authenticate an entry payload.
///
/// `entry` names the entry in error values. Verifier mismatch yields
/// `InvalidCredential`; tag mismatch yields `IntegrityCheckFailed`.
pub fn decrypt_payload(
    payload: &[u8],
    password: &[u8],
    strength: AesStrength,
    entry: &str,
) -> Result<Vec<u8>> {
    let salt_len = strength.salt_len();
    let overhead = salt_len + VERIFIER_SIZE + AUTH_TAG_SIZE;
    if payload.len() < overhead {
        return Err(ZipSealError::invalid_header(format!(
            "AES payload too short for entry {entry}"
        )));
    }

    let (salt, rest) = payload.split_at(salt_len);
    let (verifier, rest) = rest.split_at(VERIFIER_SIZE);
    let (ciphertext, tag) = rest.split_at(rest.len() - AUTH_TAG_SIZE);

    let keys = derive_keys(password, salt, strength)?;
    if !bool::from(keys.verifier.ct_eq(verifier)) {
        return Err(ZipSealError::invalid_credential(entry));
    }

    let expected = auth_tag(&keys.mac_key, ciphertext)?;
    if !bool::from(expected.ct_eq(tag)) {
        return Err(ZipSealError::integrity_check_failed(entry));
    }

    let mut plaintext = ciphertext.to_vec();
    AesCtr::new(&keys.enc_key, strength)?.apply_keystream(&mut plaintext);
    Ok(plaintext)
}

/// Cheap password test against the salt and verifier word only.
///
/// `prefix` must contain at least the salt and verifier from the front of
/// the payload. No decryption or authentication is performed.
pub fn check_password(prefix: &[u8], password: &[u8], strength: AesStrength) -> Result<bool> {
    let salt_len = strength.salt_len();
    if prefix.len() < salt_len + VERIFIER_SIZE {
        return Err(ZipSealError::invalid_header(
            "AES payload too short for a verifier check",
        ));
    }
    let keys = derive_keys(password, &prefix[..salt_len], strength)?;
    let verifier = &prefix[salt_len..salt_len + VERIFIER_SIZE];
    Ok(bool::from(keys.verifier.ct_eq(verifier)))
}
