use crate::{CredentialError, WebAuthnPublicKey};
use wasig_encoding::{KeyType, Kind, checksum, split_tagged};

/// Every representation of a key the ledger might see, for diagnosing
/// mismatches between what was enrolled and what a chain account declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyReport {
    /// The key as given.
    pub key: String,
    /// The base58 material after the `PUB_WA_` tag.
    pub material: String,
    /// The material decoded: compact encoding followed by its checksum, hex.
    pub decoded_material: String,
    /// The ABI encoding, hex.
    pub abi_encoded: String,
    /// The key string rebuilt from the ABI encoding.
    pub abi_decoded: String,
}

impl KeyReport {
    /// Inspects a `PUB_WA_` key string.
    pub fn inspect(key: &str) -> Result<Self, CredentialError> {
        let (_, material) = split_tagged(Kind::PublicKey, key)?;
        let parsed: WebAuthnPublicKey = key.parse()?;

        let compact = parsed.to_bytes()?;
        let mut decoded = compact.clone();
        decoded.extend_from_slice(&checksum(&compact, KeyType::Wa));

        let abi = parsed.to_abi_bytes()?;
        let abi_decoded = WebAuthnPublicKey::from_abi_bytes(&abi)?;

        Ok(Self {
            key: key.to_owned(),
            material: material.to_owned(),
            decoded_material: hex::encode(decoded),
            abi_encoded: hex::encode(abi),
            abi_decoded: abi_decoded.to_string(),
        })
    }
}

impl std::fmt::Display for KeyReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Public Key: {}", self.key)?;
        writeln!(f, "Public Key Material: {}", self.material)?;
        writeln!(f, "Decoded Key Material: {}", self.decoded_material)?;
        writeln!(f, "ABI Encoded HEX: {}", self.abi_encoded)?;
        write!(f, "ABI Decoded Key: {}", self.abi_decoded)
    }
}
