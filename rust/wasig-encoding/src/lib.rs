#![warn(missing_docs)]

//! Ledger-native encodings for WebAuthn-backed keys and signatures.
//!
//! This crate is the byte-level foundation the credential transcoding core
//! is built on:
//!
//! - [`SerialBuffer`] and [`SerialReader`] write and read the ledger's wire
//!   convention (single bytes, little-endian fixed-width integers,
//!   varuint32-prefixed byte arrays and strings).
//! - [`encode_tagged`] and [`decode_tagged`] produce and verify the
//!   checksummed, key-type-tagged textual form used for both public keys
//!   (`PUB_WA_...`) and signatures (`SIG_WA_...`).
//!
//! # Example
//!
//! ```rust
//! use wasig_encoding::{Kind, KeyType, SerialBuffer, decode_tagged, encode_tagged};
//!
//! let mut buffer = SerialBuffer::new();
//! buffer.push_byte(2);
//! buffer.push_string("localhost").unwrap();
//!
//! let text = encode_tagged(Kind::PublicKey, KeyType::Wa, buffer.as_bytes());
//! let (key_type, data) = decode_tagged(Kind::PublicKey, &text).unwrap();
//!
//! assert_eq!(key_type, KeyType::Wa);
//! assert_eq!(data, buffer.as_bytes());
//! ```

mod buffer;
pub use buffer::*;

mod checksum;
pub use checksum::*;

mod error;
pub use error::*;
