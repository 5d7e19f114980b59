//! Append-only writer and cursor-based reader for ledger-native encodings.
//!
//! The ledger's wire convention is small and fixed:
//!
//! ```text
//! byte            raw u8
//! u16 / u32 / u64 fixed width, least-significant byte first
//! varuint32       unsigned LEB128, at most 32 significant bits
//! bytes           varuint32(len) | raw bytes
//! string          varuint32(len) | UTF-8 bytes
//! ```
//!
//! [`SerialBuffer`] writes these shapes and [`SerialReader`] reads them back
//! with a cursor, failing with [`EncodingError::BufferUnderrun`] rather than
//! ever reading past the end.

use crate::EncodingError;

/// A growable byte buffer that values are appended to in wire order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerialBuffer {
    bytes: Vec<u8>,
}

impl SerialBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty buffer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    /// Appends a single byte.
    pub fn push_byte(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    /// Appends raw bytes with no length prefix.
    pub fn push_bytes(&mut self, raw: &[u8]) {
        self.bytes.extend_from_slice(raw);
    }

    /// Appends a little-endian `u16`.
    pub fn push_u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    /// Appends a little-endian `u32`.
    pub fn push_u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    /// Appends a little-endian `u64`.
    pub fn push_u64(&mut self, value: u64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    /// Appends `value` as an unsigned LEB128 varint.
    pub fn push_varuint32(&mut self, value: u32) -> Result<(), EncodingError> {
        leb128::write::unsigned(&mut self.bytes, u64::from(value))?;
        Ok(())
    }

    /// Appends a varuint32 length followed by `raw`.
    pub fn push_length_prefixed_bytes(&mut self, raw: &[u8]) -> Result<(), EncodingError> {
        let length =
            u32::try_from(raw.len()).map_err(|_| EncodingError::LengthOverflow(raw.len()))?;
        self.push_varuint32(length)?;
        self.push_bytes(raw);
        Ok(())
    }

    /// Appends a UTF-8 string as length-prefixed bytes.
    pub fn push_string(&mut self, value: &str) -> Result<(), EncodingError> {
        self.push_length_prefixed_bytes(value.as_bytes())
    }

    /// The bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the buffer, returning the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Number of bytes written.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns a reader positioned at the start of the written bytes.
    pub fn reader(&self) -> SerialReader<'_> {
        SerialReader::new(&self.bytes)
    }
}

impl AsRef<[u8]> for SerialBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl From<Vec<u8>> for SerialBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

/// A cursor over borrowed bytes. Every read either consumes exactly what it
/// asked for or fails without moving the cursor.
#[derive(Debug, Clone)]
pub struct SerialReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> SerialReader<'a> {
    /// Creates a reader positioned at the start of `bytes`.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    /// Offset of the cursor from the start of the bytes.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    /// Whether every byte has been read.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Reads one byte.
    pub fn get_byte(&mut self) -> Result<u8, EncodingError> {
        Ok(self.get_bytes_exact(1)?[0])
    }

    /// Reads exactly `count` bytes.
    pub fn get_bytes_exact(&mut self, count: usize) -> Result<&'a [u8], EncodingError> {
        let remaining = self.remaining();
        if count > remaining {
            return Err(EncodingError::BufferUnderrun {
                needed: count,
                remaining,
            });
        }
        let bytes: &'a [u8] = self.bytes;
        let start = self.position;
        self.position += count;
        Ok(&bytes[start..self.position])
    }

    /// Reads exactly `N` bytes into an array.
    pub fn get_array<const N: usize>(&mut self) -> Result<[u8; N], EncodingError> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.get_bytes_exact(N)?);
        Ok(array)
    }

    /// Reads a little-endian `u16`.
    pub fn get_u16(&mut self) -> Result<u16, EncodingError> {
        Ok(u16::from_le_bytes(self.get_array()?))
    }

    /// Reads a little-endian `u32`.
    pub fn get_u32(&mut self) -> Result<u32, EncodingError> {
        Ok(u32::from_le_bytes(self.get_array()?))
    }

    /// Reads a little-endian `u64`.
    pub fn get_u64(&mut self) -> Result<u64, EncodingError> {
        Ok(u64::from_le_bytes(self.get_array()?))
    }

    /// Reads an unsigned LEB128 varint that must fit in 32 bits.
    pub fn get_varuint32(&mut self) -> Result<u32, EncodingError> {
        let bytes: &'a [u8] = self.bytes;
        let mut unread = &bytes[self.position..];
        let before = unread.len();
        let value = leb128::read::unsigned(&mut unread).map_err(|error| match error {
            leb128::read::Error::IoError(_) => EncodingError::BufferUnderrun {
                needed: before + 1,
                remaining: before,
            },
            other => EncodingError::IntegerDecode(other),
        })?;
        let value = u32::try_from(value)
            .map_err(|_| EncodingError::IntegerDecode(leb128::read::Error::Overflow))?;
        self.position += before - unread.len();
        Ok(value)
    }

    /// Reads a varuint32 length and then that many bytes.
    pub fn get_length_prefixed_bytes(&mut self) -> Result<&'a [u8], EncodingError> {
        let start = self.position;
        let length = self.get_varuint32()? as usize;
        self.get_bytes_exact(length).inspect_err(|_| {
            self.position = start;
        })
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn get_string(&mut self) -> Result<&'a str, EncodingError> {
        let start = self.position;
        let raw = self.get_length_prefixed_bytes()?;
        std::str::from_utf8(raw).map_err(|_| {
            self.position = start;
            EncodingError::InvalidUtf8
        })
    }

    /// Consumes and returns every unread byte.
    pub fn rest(&mut self) -> &'a [u8] {
        let bytes: &'a [u8] = self.bytes;
        let start = self.position;
        self.position = bytes.len();
        &bytes[start..]
    }
}
