use thiserror::Error;

/// Errors that can occur while writing or reading ledger-native encodings.
///
/// Every variant is terminal for the value being decoded: the caller gets no
/// partially decoded result back.
#[derive(Error, Debug)]
pub enum EncodingError {
    /// A read asked for more bytes than the buffer still holds.
    #[error("buffer underrun: needed {needed} bytes but only {remaining} remain")]
    BufferUnderrun {
        /// Number of bytes the read required.
        needed: usize,
        /// Number of bytes left after the cursor.
        remaining: usize,
    },

    /// A varuint32 in the buffer was malformed or did not fit in 32 bits.
    #[error("Failed to decode an integer: {0}")]
    IntegerDecode(leb128::read::Error),

    /// A length-prefixed value is longer than a varuint32 can describe.
    #[error("length {0} does not fit in a varuint32 prefix")]
    LengthOverflow(usize),

    /// Writing a varint into the buffer failed.
    #[error("Failed to write to a buffer: {0}")]
    BufferWrite(std::io::Error),

    /// A length-prefixed string was not valid UTF-8.
    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    /// The textual form was not valid base58.
    #[error("invalid base58 payload")]
    InvalidBase58,

    /// The checksum appended to a textual form does not match its payload.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// The key type tag is not one this system understands.
    #[error("unknown key type: {0}")]
    UnknownKeyType(String),
}

impl From<std::io::Error> for EncodingError {
    fn from(value: std::io::Error) -> Self {
        EncodingError::BufferWrite(value)
    }
}
