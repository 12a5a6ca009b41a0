//! # ZipSeal Core
//!
//! Core components for the ZipSeal password-management library.
//!
//! This crate provides the fundamental building blocks shared by the archive
//! layer and the CLI:
//!
//! - [`crc`]: CRC-32 checksums (ISO 3309, as used by ZIP)
//! - [`dostime`]: MS-DOS date/time packing for ZIP headers
//! - [`error`]: Error types
//!
//! ## Example
//!
//! ```rust
//! use zipseal_core::crc::Crc32;
//!
//! let crc = Crc32::compute(b"Hello, World!");
//! assert_eq!(crc, 0xEC4AC3D0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod crc;
pub mod dostime;
pub mod error;

// Re-exports for convenience
pub use crc::{crc32_update, Crc32};
pub use dostime::{dos_to_system_time, system_time_to_dos};
pub use error::{Result, ZipSealError};
