//! Checksummed, key-type-tagged textual forms.
//!
//! Keys and signatures leave this system as strings such as
//! `PUB_WA_<base58>` and `SIG_WA_<base58>`. The base58 payload is the binary
//! encoding followed by a four byte checksum:
//!
//! ```text
//! base58( data | RIPEMD-160(data | key_type_suffix)[0..4] )
//! ```
//!
//! Binding the key type suffix into the checksum means a payload cannot be
//! relabelled as another key type without the checksum failing.

use crate::EncodingError;
use ripemd::{Digest, Ripemd160};

/// Number of checksum bytes appended to every textual payload.
pub const CHECKSUM_LENGTH: usize = 4;

/// The ledger's key types, in ABI index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    /// secp256k1
    K1,
    /// secp256r1
    R1,
    /// secp256r1 held by a WebAuthn authenticator
    Wa,
}

impl KeyType {
    /// Index of the key type in the ledger's ABI variant.
    pub const fn abi_index(self) -> u32 {
        match self {
            KeyType::K1 => 0,
            KeyType::R1 => 1,
            KeyType::Wa => 2,
        }
    }

    /// Resolves an ABI variant index.
    pub fn from_abi_index(index: u32) -> Result<Self, EncodingError> {
        match index {
            0 => Ok(KeyType::K1),
            1 => Ok(KeyType::R1),
            2 => Ok(KeyType::Wa),
            other => Err(EncodingError::UnknownKeyType(format!("abi index {other}"))),
        }
    }

    /// The suffix used both in the textual prefix and in the checksum.
    pub const fn suffix(self) -> &'static str {
        match self {
            KeyType::K1 => "K1",
            KeyType::R1 => "R1",
            KeyType::Wa => "WA",
        }
    }

    /// Resolves a textual suffix such as `"WA"`.
    pub fn from_suffix(suffix: &str) -> Result<Self, EncodingError> {
        match suffix {
            "K1" => Ok(KeyType::K1),
            "R1" => Ok(KeyType::R1),
            "WA" => Ok(KeyType::Wa),
            other => Err(EncodingError::UnknownKeyType(other.to_owned())),
        }
    }
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.suffix())
    }
}

/// What a textual payload represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// A public key, `PUB_`
    PublicKey,
    /// A signature, `SIG_`
    Signature,
}

impl Kind {
    /// The leading tag, e.g. `PUB_`.
    pub const fn prefix(self) -> &'static str {
        match self {
            Kind::PublicKey => "PUB_",
            Kind::Signature => "SIG_",
        }
    }
}

/// Computes the four byte checksum of `data` bound to `key_type`.
pub fn checksum(data: &[u8], key_type: KeyType) -> [u8; CHECKSUM_LENGTH] {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    hasher.update(key_type.suffix().as_bytes());
    let digest = hasher.finalize();

    let mut checksum = [0u8; CHECKSUM_LENGTH];
    checksum.copy_from_slice(&digest[..CHECKSUM_LENGTH]);
    checksum
}

/// Produces `<kind prefix><key type>_<base58(data | checksum)>`.
pub fn encode_tagged(kind: Kind, key_type: KeyType, data: &[u8]) -> String {
    let mut payload = Vec::with_capacity(data.len() + CHECKSUM_LENGTH);
    payload.extend_from_slice(data);
    payload.extend_from_slice(&checksum(data, key_type));

    format!(
        "{}{}_{}",
        kind.prefix(),
        key_type.suffix(),
        bs58::encode(&payload).into_string()
    )
}

/// Splits a textual payload into its key type and base58 material without
/// decoding the material.
pub fn split_tagged(kind: Kind, text: &str) -> Result<(KeyType, &str), EncodingError> {
    let tagged = text
        .strip_prefix(kind.prefix())
        .ok_or_else(|| EncodingError::UnknownKeyType(leading_tag(text).to_owned()))?;
    let (suffix, material) = tagged
        .split_once('_')
        .ok_or_else(|| EncodingError::UnknownKeyType(leading_tag(text).to_owned()))?;

    Ok((KeyType::from_suffix(suffix)?, material))
}

/// Reverses [`encode_tagged`], verifying the checksum.
pub fn decode_tagged(kind: Kind, text: &str) -> Result<(KeyType, Vec<u8>), EncodingError> {
    let (key_type, material) = split_tagged(kind, text)?;
    let payload = bs58::decode(material)
        .into_vec()
        .map_err(|_| EncodingError::InvalidBase58)?;

    if payload.len() < CHECKSUM_LENGTH {
        return Err(EncodingError::ChecksumMismatch);
    }

    let (data, expected) = payload.split_at(payload.len() - CHECKSUM_LENGTH);
    if checksum(data, key_type) != expected {
        return Err(EncodingError::ChecksumMismatch);
    }

    Ok((key_type, data.to_vec()))
}

fn leading_tag(text: &str) -> &str {
    let end = text
        .match_indices('_')
        .nth(1)
        .map(|(index, _)| index)
        .or_else(|| text.char_indices().nth(8).map(|(index, _)| index))
        .unwrap_or(text.len());
    &text[..end]
}
