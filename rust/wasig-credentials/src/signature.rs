//! WebAuthn assertions and the ledger-native signatures built from them.
//!
//! ```text
//! payload = recovery_byte (1) | r (32) | s (32)
//!         | varuint32(len) authenticator_data
//!         | varuint32(len) client_data_json
//! text    = "SIG_WA_" base58( payload | checksum )
//! ```
//!
//! The authenticator does not sign the transaction digest directly. It signs
//! `authenticator_data | SHA-256(client_data_json)`, and the digest only
//! appears as the challenge inside `client_data_json`. The whole of both is
//! therefore carried in the signature so a verifier can reproduce the hash.

use crate::{CredentialError, SCALAR_LENGTH, recover};
use p256::ecdsa::VerifyingKey;
use sha2::{Digest, Sha256};
use std::str::FromStr;
use wasig_encoding::{
    EncodingError, KeyType, Kind, SerialBuffer, SerialReader, decode_tagged, encode_tagged,
};

/// Offset added to the recovery id in the first payload byte: 27 for a
/// compressed point plus 4 for the WebAuthn signature class.
pub const RECOVERY_BYTE_OFFSET: u8 = 27 + 4;

/// An authenticator's response to a signing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    /// ASN.1 DER ECDSA signature.
    pub signature: Vec<u8>,
    /// Authenticator data (rp id hash, flags, counter).
    pub authenticator_data: Vec<u8>,
    /// Browser-constructed client data embedding the challenge.
    pub client_data_json: Vec<u8>,
}

impl Assertion {
    /// The hash the authenticator actually signed.
    pub fn signed_hash(&self) -> [u8; 32] {
        signed_hash(&self.authenticator_data, &self.client_data_json)
    }
}

fn signed_hash(authenticator_data: &[u8], client_data_json: &[u8]) -> [u8; 32] {
    let client_data_hash = Sha256::digest(client_data_json);
    let mut hasher = Sha256::new();
    hasher.update(authenticator_data);
    hasher.update(client_data_hash);
    hasher.finalize().into()
}

/// A ledger-native, publicly recoverable WebAuthn signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebAuthnSignature {
    /// Recovery id in `0..4`.
    pub recovery_id: u8,
    /// Normalized `r`.
    pub r: [u8; SCALAR_LENGTH],
    /// Normalized `s`.
    pub s: [u8; SCALAR_LENGTH],
    /// Authenticator data from the assertion.
    pub authenticator_data: Vec<u8>,
    /// Client data from the assertion.
    pub client_data_json: Vec<u8>,
}

impl WebAuthnSignature {
    /// The first payload byte.
    pub fn recovery_byte(&self) -> u8 {
        self.recovery_id + RECOVERY_BYTE_OFFSET
    }

    /// The binary payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodingError> {
        let mut buffer = SerialBuffer::with_capacity(
            1 + 2 * SCALAR_LENGTH + self.authenticator_data.len() + self.client_data_json.len() + 4,
        );
        buffer.push_byte(self.recovery_byte());
        buffer.push_bytes(&self.r);
        buffer.push_bytes(&self.s);
        buffer.push_length_prefixed_bytes(&self.authenticator_data)?;
        buffer.push_length_prefixed_bytes(&self.client_data_json)?;
        Ok(buffer.into_bytes())
    }

    /// Parses a binary payload, which must be consumed exactly.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CredentialError> {
        let mut reader = SerialReader::new(bytes);
        let recovery_byte = reader.get_byte()?;
        let recovery_id = recovery_byte
            .checked_sub(RECOVERY_BYTE_OFFSET)
            .filter(|id| *id < 4)
            .ok_or_else(|| {
                CredentialError::SignatureMalformed(format!(
                    "recovery byte {recovery_byte} is out of range"
                ))
            })?;
        let r = reader.get_array()?;
        let s = reader.get_array()?;
        let authenticator_data = reader.get_length_prefixed_bytes()?.to_vec();
        let client_data_json = reader.get_length_prefixed_bytes()?.to_vec();

        if !reader.is_empty() {
            return Err(CredentialError::SignatureMalformed(format!(
                "{} trailing bytes after client data",
                reader.remaining()
            )));
        }

        Ok(Self {
            recovery_id,
            r,
            s,
            authenticator_data,
            client_data_json,
        })
    }

    /// The `SIG_WA_` string form.
    pub fn string_encoding(&self) -> Result<String, CredentialError> {
        Ok(encode_tagged(Kind::Signature, KeyType::Wa, &self.to_bytes()?))
    }

    /// The hash the authenticator signed.
    pub fn signed_hash(&self) -> [u8; 32] {
        signed_hash(&self.authenticator_data, &self.client_data_json)
    }

    /// Recovers the signer's public point, as a ledger would.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::RecoveryFailed`] if the signature does not
    /// recover a valid key under its recovery id.
    pub fn recover_public_key(&self) -> Result<VerifyingKey, CredentialError> {
        recover(&self.signed_hash(), &self.r, &self.s, self.recovery_id)
            .ok_or(CredentialError::RecoveryFailed)
    }
}

impl std::fmt::Display for WebAuthnSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.string_encoding().map_err(|_| std::fmt::Error)?)
    }
}

impl FromStr for WebAuthnSignature {
    type Err = CredentialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key_type, payload) = decode_tagged(Kind::Signature, s)?;
        if key_type != KeyType::Wa {
            return Err(EncodingError::UnknownKeyType(key_type.to_string()).into());
        }
        Self::from_bytes(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn signature() -> WebAuthnSignature {
        WebAuthnSignature {
            recovery_id: 1,
            r: [0x11; 32],
            s: [0x22; 32],
            authenticator_data: vec![0xaa; 37],
            client_data_json: br#"{"type":"webauthn.get"}"#.to_vec(),
        }
    }

    #[test]
    fn it_lays_out_the_payload() {
        let bytes = signature().to_bytes().unwrap();

        assert_eq!(bytes[0], 32);
        assert_eq!(&bytes[1..33], &[0x11; 32]);
        assert_eq!(&bytes[33..65], &[0x22; 32]);
        assert_eq!(bytes[65], 37);
        assert_eq!(&bytes[66..103], &[0xaa; 37]);
        assert_eq!(usize::from(bytes[103]), signature().client_data_json.len());
        assert_eq!(&bytes[104..], signature().client_data_json.as_slice());
    }

    #[test]
    fn it_parses_its_own_string_form() {
        let text = signature().to_string();
        assert!(text.starts_with("SIG_WA_"));
        assert_eq!(text.parse::<WebAuthnSignature>().unwrap(), signature());
    }

    #[test]
    fn it_parses_a_signature_carrying_realistic_client_data() {
        let client_data_json = serde_json::json!({
            "type": "webauthn.get",
            "challenge": "9aX9QtFqIDAnmO9u0wmXm0MAPSMg2fDo6pgxqSdZ-0s",
            "origin": "https://wallet.example.com:8443",
            "crossOrigin": false,
            "other_keys_can_be_added_here": "do not compare clientDataJSON against a template"
        })
        .to_string()
        .into_bytes();
        assert!(client_data_json.len() > 200);

        let signature = WebAuthnSignature {
            client_data_json,
            ..signature()
        };
        let text = signature.to_string();

        assert_eq!(text.parse::<WebAuthnSignature>().unwrap(), signature);
    }

    #[test]
    fn it_rejects_recovery_bytes_out_of_range() {
        for byte in [0u8, 30, 35, 255] {
            let mut bytes = signature().to_bytes().unwrap();
            bytes[0] = byte;
            assert!(matches!(
                WebAuthnSignature::from_bytes(&bytes),
                Err(CredentialError::SignatureMalformed(_))
            ));
        }
    }

    #[test]
    fn it_rejects_trailing_bytes() {
        let mut bytes = signature().to_bytes().unwrap();
        bytes.push(0);
        assert!(matches!(
            WebAuthnSignature::from_bytes(&bytes),
            Err(CredentialError::SignatureMalformed(_))
        ));
    }

    #[test]
    fn it_hashes_authenticator_data_with_the_client_data_hash() {
        let assertion = Assertion {
            signature: vec![],
            authenticator_data: vec![1, 2, 3],
            client_data_json: b"{}".to_vec(),
        };

        let mut message = vec![1, 2, 3];
        message.extend_from_slice(&Sha256::digest(b"{}"));
        let expected: [u8; 32] = Sha256::digest(&message).into();

        assert_eq!(assertion.signed_hash(), expected);
        assert_eq!(signature_for(&assertion).signed_hash(), expected);
    }

    fn signature_for(assertion: &Assertion) -> WebAuthnSignature {
        WebAuthnSignature {
            recovery_id: 0,
            r: [1; 32],
            s: [1; 32],
            authenticator_data: assertion.authenticator_data.clone(),
            client_data_json: assertion.client_data_json.clone(),
        }
    }
}
