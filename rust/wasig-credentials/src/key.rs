//! WebAuthn public keys in the ledger's compact encoding.
//!
//! A WebAuthn-backed key is more than a P-256 point: the ledger also binds the
//! user presence the authenticator asserted at enrollment and the relying
//! party the credential belongs to, so the key cannot be replayed under a
//! different party.
//!
//! ```text
//! compact = point_prefix (1) | x (32) | presence (1) | varuint32(len) | rp_id
//! text    = "PUB_WA_" base58( compact | checksum )
//! abi     = varuint32(2) | compact
//! ```
//!
//! `point_prefix` is `2` when `y` is even and `3` when it is odd, exactly as in
//! a compressed SEC1 point, so `point_prefix | x` is itself a valid SEC1
//! encoding.

use crate::{AttestationFlags, CredentialError};
use p256::ecdsa::VerifyingKey;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use wasig_encoding::{
    EncodingError, KeyType, Kind, SerialBuffer, SerialReader, decode_tagged, encode_tagged,
};

/// Length of a P-256 coordinate.
pub const COORDINATE_LENGTH: usize = 32;

/// Compressed point prefix for an even `y`.
const EVEN_Y_PREFIX: u8 = 0x02;
/// Compressed point prefix for an odd `y`.
const ODD_Y_PREFIX: u8 = 0x03;

/// The user presence an authenticator asserted when the credential was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    /// Neither presence nor verification was asserted.
    None,
    /// The user was present (touched the authenticator).
    Present,
    /// The user was verified (PIN, biometric).
    Verified,
}

impl Presence {
    /// Derives presence from attestation flags. Verification takes precedence
    /// over presence.
    pub fn from_flags(flags: AttestationFlags) -> Self {
        if flags.user_verified() {
            Presence::Verified
        } else if flags.user_present() {
            Presence::Present
        } else {
            Presence::None
        }
    }

    /// The byte stored in the compact encoding.
    pub const fn as_byte(self) -> u8 {
        match self {
            Presence::None => 0,
            Presence::Present => 1,
            Presence::Verified => 2,
        }
    }

    /// Parses the byte stored in the compact encoding.
    pub fn from_byte(byte: u8) -> Result<Self, CredentialError> {
        match byte {
            0 => Ok(Presence::None),
            1 => Ok(Presence::Present),
            2 => Ok(Presence::Verified),
            other => Err(CredentialError::MalformedKey(format!(
                "unknown presence byte {other}"
            ))),
        }
    }
}

/// A WebAuthn P-256 public key bound to its presence and relying party.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WebAuthnPublicKey {
    point_prefix: u8,
    x: [u8; COORDINATE_LENGTH],
    presence: Presence,
    relying_party_id: String,
}

impl WebAuthnPublicKey {
    /// Builds a key from the affine point coordinates.
    pub fn from_coordinates(
        x: [u8; COORDINATE_LENGTH],
        y: &[u8; COORDINATE_LENGTH],
        presence: Presence,
        relying_party_id: impl Into<String>,
    ) -> Self {
        let point_prefix = if y[COORDINATE_LENGTH - 1] & 1 == 1 {
            ODD_Y_PREFIX
        } else {
            EVEN_Y_PREFIX
        };

        Self {
            point_prefix,
            x,
            presence,
            relying_party_id: relying_party_id.into(),
        }
    }

    /// `2` for an even `y`, `3` for an odd one.
    pub fn point_prefix(&self) -> u8 {
        self.point_prefix
    }

    /// The X coordinate.
    pub fn x(&self) -> &[u8; COORDINATE_LENGTH] {
        &self.x
    }

    /// The presence asserted at enrollment.
    pub fn presence(&self) -> Presence {
        self.presence
    }

    /// The relying party the credential belongs to.
    pub fn relying_party_id(&self) -> &str {
        &self.relying_party_id
    }

    /// The compressed SEC1 point (33 bytes).
    pub fn to_sec1_bytes(&self) -> [u8; COORDINATE_LENGTH + 1] {
        let mut sec1 = [0u8; COORDINATE_LENGTH + 1];
        sec1[0] = self.point_prefix;
        sec1[1..].copy_from_slice(&self.x);
        sec1
    }

    /// Decompresses the point into a P-256 verifying key.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::MalformedKey`] if `x` is not on the curve.
    pub fn verifying_key(&self) -> Result<VerifyingKey, CredentialError> {
        VerifyingKey::from_sec1_bytes(&self.to_sec1_bytes())
            .map_err(|_| CredentialError::MalformedKey("point is not on the P-256 curve".into()))
    }

    /// The compact encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodingError> {
        let mut buffer =
            SerialBuffer::with_capacity(COORDINATE_LENGTH + 3 + self.relying_party_id.len());
        self.write(&mut buffer)?;
        Ok(buffer.into_bytes())
    }

    /// Parses a compact encoding, which must be consumed exactly.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CredentialError> {
        let mut reader = SerialReader::new(bytes);
        let key = Self::read(&mut reader)?;
        if !reader.is_empty() {
            return Err(CredentialError::MalformedKey(format!(
                "{} trailing bytes after relying party id",
                reader.remaining()
            )));
        }
        Ok(key)
    }

    /// The ledger ABI form: key type index followed by the compact encoding.
    pub fn to_abi_bytes(&self) -> Result<Vec<u8>, EncodingError> {
        let mut buffer = SerialBuffer::new();
        buffer.push_varuint32(KeyType::Wa.abi_index())?;
        self.write(&mut buffer)?;
        Ok(buffer.into_bytes())
    }

    /// Parses the ledger ABI form. Only WebAuthn keys are accepted.
    pub fn from_abi_bytes(bytes: &[u8]) -> Result<Self, CredentialError> {
        let mut reader = SerialReader::new(bytes);
        let key_type = KeyType::from_abi_index(reader.get_varuint32()?)?;
        if key_type != KeyType::Wa {
            return Err(EncodingError::UnknownKeyType(key_type.to_string()).into());
        }
        Self::from_bytes(reader.rest())
    }

    fn write(&self, buffer: &mut SerialBuffer) -> Result<(), EncodingError> {
        buffer.push_byte(self.point_prefix);
        buffer.push_bytes(&self.x);
        buffer.push_byte(self.presence.as_byte());
        buffer.push_string(&self.relying_party_id)
    }

    fn read(reader: &mut SerialReader<'_>) -> Result<Self, CredentialError> {
        let point_prefix = reader.get_byte()?;
        if point_prefix != EVEN_Y_PREFIX && point_prefix != ODD_Y_PREFIX {
            return Err(CredentialError::MalformedKey(format!(
                "invalid point prefix {point_prefix:#04x}"
            )));
        }
        let x = reader.get_array::<COORDINATE_LENGTH>()?;
        let presence = Presence::from_byte(reader.get_byte()?)?;
        let relying_party_id = reader.get_string()?.to_owned();

        Ok(Self {
            point_prefix,
            x,
            presence,
            relying_party_id,
        })
    }
}

impl std::fmt::Display for WebAuthnPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let compact = self.to_bytes().map_err(|_| std::fmt::Error)?;
        f.write_str(&encode_tagged(Kind::PublicKey, KeyType::Wa, &compact))
    }
}

impl FromStr for WebAuthnPublicKey {
    type Err = CredentialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key_type, compact) = decode_tagged(Kind::PublicKey, s)?;
        if key_type != KeyType::Wa {
            return Err(EncodingError::UnknownKeyType(key_type.to_string()).into());
        }
        Self::from_bytes(&compact)
    }
}

impl Serialize for WebAuthnPublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WebAuthnPublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Everything learned about a credential at enrollment. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialKey {
    /// Authenticator-assigned credential id.
    pub credential_id: Vec<u8>,
    /// Authenticator model identifier (diagnostic only).
    pub aaguid: [u8; 16],
    /// Signature counter reported at enrollment. Not enforced monotonic.
    pub sign_count: u32,
    /// Raw attestation flags.
    pub flags: AttestationFlags,
    /// The relying party the credential was created for.
    pub relying_party_id: String,
    /// X coordinate of the P-256 public point.
    pub x: [u8; COORDINATE_LENGTH],
    /// Y coordinate of the P-256 public point.
    pub y: [u8; COORDINATE_LENGTH],
}

impl CredentialKey {
    /// Presence derived from the attestation flags.
    pub fn presence(&self) -> Presence {
        Presence::from_flags(self.flags)
    }

    /// The ledger-facing public key.
    pub fn public_key(&self) -> WebAuthnPublicKey {
        WebAuthnPublicKey::from_coordinates(
            self.x,
            &self.y,
            self.presence(),
            self.relying_party_id.clone(),
        )
    }

    /// The compact encoding of [`Self::public_key`].
    pub fn compact_encoding(&self) -> Result<Vec<u8>, CredentialError> {
        Ok(self.public_key().to_bytes()?)
    }

    /// The `PUB_WA_` string form of [`Self::public_key`].
    pub fn string_encoding(&self) -> Result<String, CredentialError> {
        Ok(encode_tagged(
            Kind::PublicKey,
            KeyType::Wa,
            &self.compact_encoding()?,
        ))
    }

    /// A serializable description of the credential for diagnostics.
    pub fn summary(&self) -> Result<EnrollmentSummary, CredentialError> {
        let compact = self.compact_encoding()?;
        Ok(EnrollmentSummary {
            flags: format!("{:02x}", self.flags.bits()),
            sign_count: self.sign_count,
            aaguid: hex::encode(self.aaguid),
            credential_id_length: self.credential_id.len(),
            credential_id: hex::encode(&self.credential_id),
            relying_party_id: self.relying_party_id.clone(),
            presence: self.presence(),
            x: hex::encode(self.x),
            y: hex::encode(self.y),
            key: encode_tagged(Kind::PublicKey, KeyType::Wa, &compact),
            compact: hex::encode(compact),
        })
    }
}

/// Diagnostic view of an enrolled credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentSummary {
    /// Flags byte as two hex digits.
    pub flags: String,
    /// Signature counter at enrollment.
    pub sign_count: u32,
    /// AAGUID as hex.
    pub aaguid: String,
    /// Length of the credential id in bytes.
    pub credential_id_length: usize,
    /// Credential id as hex.
    pub credential_id: String,
    /// Relying party id.
    #[serde(rename = "rpid")]
    pub relying_party_id: String,
    /// Presence derived from the flags.
    pub presence: Presence,
    /// X coordinate as hex.
    pub x: String,
    /// Y coordinate as hex.
    pub y: String,
    /// Compact encoding as hex.
    pub compact: String,
    /// `PUB_WA_` string form.
    pub key: String,
}
