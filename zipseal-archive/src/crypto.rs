//! PKWARE weak encryption (ZipCrypto).
//!
//! The original stream cipher from the ZIP format specification
//! (APPNOTE.TXT). Three 32-bit keys are mixed from the password; each data
//! byte is XORed with a keystream byte derived from the key state, and the
//! state is updated with the *plaintext* byte. Getting the update order
//! wrong desynchronizes the cipher after the first byte.
//!
//! **Security warning**: this cipher is weak and vulnerable to
//! known-plaintext attacks. It exists here for compatibility with the large
//! body of archives that still use it; new archives should prefer WinZip
//! AES.
//!
//! Every encrypted payload starts with a 12-byte encryption header: 10
//! random bytes followed by a 2-byte check value, all encrypted. Decrypting
//! the header with a candidate password and comparing the check value is
//! the cheap password test — a wrong password slips through with
//! probability 1/65536.

use crate::entry::FLAG_DATA_DESCRIPTOR;
use rand::RngCore;
use zipseal_core::crc32_update;

/// Initial key values.
const INITIAL_KEY0: u32 = 0x12345678;
const INITIAL_KEY1: u32 = 0x23456789;
const INITIAL_KEY2: u32 = 0x34567890;

/// Size of the encryption header in bytes.
pub const ENCRYPTION_HEADER_SIZE: usize = 12;

/// PKWARE weak cipher state.
#[derive(Debug, Clone)]
pub struct ZipCrypto {
    /// First key, updated with the CRC-32 step of each byte.
    key0: u32,
    /// Second key, a linear congruential mix of key0's low byte.
    key1: u32,
    /// Third key, updated with the CRC-32 step of key1's high byte.
    key2: u32,
}

impl ZipCrypto {
    /// Create a cipher initialized with the given password bytes.
    #[must_use]
    pub fn new(password: &[u8]) -> Self {
        let mut cipher = Self {
            key0: INITIAL_KEY0,
            key1: INITIAL_KEY1,
            key2: INITIAL_KEY2,
        };
        for &byte in password {
            cipher.update_keys(byte);
        }
        cipher
    }

    #[inline]
    fn update_keys(&mut self, byte: u8) {
        self.key0 = crc32_update(self.key0, byte);
        self.key1 = self
            .key1
            .wrapping_add(self.key0 & 0xFF)
            .wrapping_mul(134775813)
            .wrapping_add(1);
        self.key2 = crc32_update(self.key2, (self.key1 >> 24) as u8);
    }

    /// Keystream byte for the current state: `((key2|2) * ((key2|2)^1)) >> 8`.
    #[inline]
    fn stream_byte(&self) -> u8 {
        let temp = (self.key2 | 2) as u16;
        (temp.wrapping_mul(temp ^ 1) >> 8) as u8
    }

    /// Encrypt a single byte. Keys are updated with the plaintext byte.
    #[inline]
    pub fn encrypt_byte(&mut self, byte: u8) -> u8 {
        let cipher_byte = byte ^ self.stream_byte();
        self.update_keys(byte);
        cipher_byte
    }

    /// Decrypt a single byte. Keys are updated with the recovered plaintext.
    #[inline]
    pub fn decrypt_byte(&mut self, byte: u8) -> u8 {
        let plain_byte = byte ^ self.stream_byte();
        self.update_keys(plain_byte);
        plain_byte
    }

    /// Encrypt a buffer in place.
    pub fn encrypt_buffer(&mut self, buffer: &mut [u8]) {
        for byte in buffer.iter_mut() {
            *byte = self.encrypt_byte(*byte);
        }
    }

    /// Decrypt a buffer in place.
    pub fn decrypt_buffer(&mut self, buffer: &mut [u8]) {
        for byte in buffer.iter_mut() {
            *byte = self.decrypt_byte(*byte);
        }
    }

    /// Generate the 12-byte encryption header for a new entry.
    ///
    /// The header is 10 random bytes plus the little-endian check value,
    /// encrypted in order. The cipher state afterwards is ready to encrypt
    /// the entry data.
    pub fn generate_header(&mut self, check: u16) -> [u8; ENCRYPTION_HEADER_SIZE] {
        let mut header = [0u8; ENCRYPTION_HEADER_SIZE];
        rand::rng().fill_bytes(&mut header[..10]);
        header[10] = check as u8;
        header[11] = (check >> 8) as u8;
        for byte in header.iter_mut() {
            *byte = self.encrypt_byte(*byte);
        }
        header
    }

    /// Decrypt the 12-byte encryption header and test the check value.
    ///
    /// Returns `true` when the password appears correct. The cipher state
    /// afterwards is ready to decrypt the entry data, so a `true` result
    /// must be followed by decrypting the remaining payload with this same
    /// cipher.
    pub fn verify_header(&mut self, header: &[u8; ENCRYPTION_HEADER_SIZE], check: u16) -> bool {
        let mut decrypted = *header;
        for byte in decrypted.iter_mut() {
            *byte = self.decrypt_byte(*byte);
        }
        decrypted[10] == check as u8 && decrypted[11] == (check >> 8) as u8
    }

    /// Current key state, for tests.
    #[cfg(test)]
    fn keys(&self) -> (u32, u32, u32) {
        (self.key0, self.key1, self.key2)
    }
}

/// The check value the encryption header carries for an entry.
///
/// When the entry was written with a data descriptor (flag bit 3) the CRC
/// was not known at encryption time, so the DOS modification time stands in
/// for it. Otherwise it is the high 16 bits of the CRC-32.
pub fn header_check_value(crc32: u32, flags: u16, mtime: u16) -> u16 {
    if flags & FLAG_DATA_DESCRIPTOR != 0 {
        mtime
    } else {
        (crc32 >> 16) as u16
    }
}
