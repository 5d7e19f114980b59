//! Attestation object decoding.
//!
//! At registration the authenticator returns a CBOR attestation object whose
//! `authData` byte string carries the new credential:
//!
//! ```text
//! rp_id_hash (32) | flags (1) | sign_count (4, BE)
//!   | aaguid (16) | credential_id_length (2, BE) | credential_id
//!   | COSE_Key (CBOR map) | extensions (optional)
//! ```
//!
//! Decoding is pure: the caller supplies the credential id the browser
//! reported and the relying party id, and gets back a validated
//! [`CredentialKey`].

use crate::{COORDINATE_LENGTH, CredentialError, CredentialKey};
use ciborium::Value;
use wasig_encoding::{EncodingError, SerialReader};

const RP_ID_HASH_LENGTH: usize = 32;
const AAGUID_LENGTH: usize = 16;

/// COSE key labels and the only values accepted for them.
mod cose {
    pub const KEY_TYPE: i128 = 1;
    pub const ALGORITHM: i128 = 3;
    pub const CURVE: i128 = -1;
    pub const X: i128 = -2;
    pub const Y: i128 = -3;

    pub const KEY_TYPE_EC2: i128 = 2;
    pub const ALGORITHM_ES256: i128 = -7;
    pub const CURVE_P256: i128 = 1;
}

/// The authenticator data flags byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AttestationFlags(u8);

impl AttestationFlags {
    /// User present.
    pub const USER_PRESENT: u8 = 0x01;
    /// User verified.
    pub const USER_VERIFIED: u8 = 0x04;
    /// Attested credential data included.
    pub const ATTESTED_CREDENTIAL_PRESENT: u8 = 0x40;
    /// Extension data included.
    pub const EXTENSION_DATA_PRESENT: u8 = 0x80;

    /// Wraps a raw flags byte.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// The raw flags byte.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether the user-present bit is set.
    pub const fn user_present(self) -> bool {
        self.0 & Self::USER_PRESENT != 0
    }

    /// Whether the user-verified bit is set.
    pub const fn user_verified(self) -> bool {
        self.0 & Self::USER_VERIFIED != 0
    }

    /// Whether attested credential data follows the counter.
    pub const fn attested_credential_present(self) -> bool {
        self.0 & Self::ATTESTED_CREDENTIAL_PRESENT != 0
    }

    /// Whether extension data follows the credential public key.
    pub const fn extension_data_present(self) -> bool {
        self.0 & Self::EXTENSION_DATA_PRESENT != 0
    }
}

/// Decodes an attestation object into a validated [`CredentialKey`].
///
/// # Errors
///
/// - [`CredentialError::AttestationMalformed`] if the CBOR or the
///   authenticator data cannot be decoded, or attested credential data is
///   absent.
/// - [`CredentialError::UnsupportedKeyAlgorithm`] unless the key is
///   EC2 / ES256 / P-256.
/// - [`CredentialError::InvalidKeySize`] unless X and Y are 32 bytes each.
/// - [`CredentialError::CredentialIdMismatch`] if the credential id differs
///   from `raw_id`.
pub fn decode_attestation(
    attestation_object: &[u8],
    raw_id: &[u8],
    relying_party_id: &str,
) -> Result<CredentialKey, CredentialError> {
    let attestation: Value = ciborium::from_reader(attestation_object)
        .map_err(|error| CredentialError::AttestationMalformed(error.to_string()))?;
    let auth_data = attestation
        .as_map()
        .and_then(|entries| text_entry(entries, "authData"))
        .and_then(Value::as_bytes)
        .ok_or_else(|| CredentialError::AttestationMalformed("missing authData".into()))?;

    let mut reader = SerialReader::new(auth_data);
    reader.get_bytes_exact(RP_ID_HASH_LENGTH).map_err(truncated)?;
    let flags = AttestationFlags::from_bits(reader.get_byte().map_err(truncated)?);
    let sign_count = u32::from_be_bytes(reader.get_array().map_err(truncated)?);

    if !flags.attested_credential_present() {
        return Err(CredentialError::AttestationMalformed(
            "attestedCredentialPresent flag not set".into(),
        ));
    }

    let aaguid = reader.get_array::<AAGUID_LENGTH>().map_err(truncated)?;
    let credential_id_length = u16::from_be_bytes(reader.get_array().map_err(truncated)?);
    let credential_id = reader
        .get_bytes_exact(usize::from(credential_id_length))
        .map_err(truncated)?;

    let public_key: Value = ciborium::from_reader(reader.rest())
        .map_err(|error| CredentialError::AttestationMalformed(error.to_string()))?;
    let cose_key = public_key.as_map().ok_or_else(|| {
        CredentialError::AttestationMalformed("credential public key is not a map".into())
    })?;

    require(cose_key, cose::KEY_TYPE, cose::KEY_TYPE_EC2, "Public key is not EC2")?;
    require(cose_key, cose::ALGORITHM, cose::ALGORITHM_ES256, "Public key is not ES256")?;
    require(cose_key, cose::CURVE, cose::CURVE_P256, "Public key has unsupported curve")?;

    let x = coordinate(cose_key, cose::X);
    let y = coordinate(cose_key, cose::Y);
    let (x, y) = match (
        <[u8; COORDINATE_LENGTH]>::try_from(x),
        <[u8; COORDINATE_LENGTH]>::try_from(y),
    ) {
        (Ok(x), Ok(y)) => (x, y),
        _ => {
            return Err(CredentialError::InvalidKeySize {
                x: x.len(),
                y: y.len(),
            });
        }
    };

    if credential_id != raw_id {
        return Err(CredentialError::CredentialIdMismatch);
    }

    Ok(CredentialKey {
        credential_id: credential_id.to_vec(),
        aaguid,
        sign_count,
        flags,
        relying_party_id: relying_party_id.to_owned(),
        x,
        y,
    })
}

fn truncated(error: EncodingError) -> CredentialError {
    CredentialError::AttestationMalformed(format!("authenticator data is truncated: {error}"))
}

fn text_entry<'a>(entries: &'a [(Value, Value)], key: &str) -> Option<&'a Value> {
    entries
        .iter()
        .find(|(label, _)| label.as_text() == Some(key))
        .map(|(_, value)| value)
}

fn label_entry(entries: &[(Value, Value)], label: i128) -> Option<&Value> {
    entries
        .iter()
        .find(|(key, _)| key.as_integer().map(i128::from) == Some(label))
        .map(|(_, value)| value)
}

fn require(
    entries: &[(Value, Value)],
    label: i128,
    expected: i128,
    message: &str,
) -> Result<(), CredentialError> {
    match label_entry(entries, label)
        .and_then(Value::as_integer)
        .map(i128::from)
    {
        Some(value) if value == expected => Ok(()),
        Some(value) => Err(CredentialError::UnsupportedKeyAlgorithm(format!(
            "{message} (label {label} is {value})"
        ))),
        None => Err(CredentialError::UnsupportedKeyAlgorithm(format!(
            "{message} (label {label} is missing)"
        ))),
    }
}

/// A coordinate that is absent or not a byte string reads as empty, so it is
/// reported with length 0.
fn coordinate(entries: &[(Value, Value)], label: i128) -> &[u8] {
    label_entry(entries, label)
        .and_then(Value::as_bytes)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Presence, helpers::SoftwareAuthenticator};
    use ciborium::value::Integer;

    const RP_ID: &str = "localhost";

    fn authenticator() -> SoftwareAuthenticator {
        SoftwareAuthenticator::from_seed([7u8; 32], vec![0xc0, 0xff, 0xee])
    }

    fn int(value: i64) -> Value {
        Value::Integer(Integer::from(value))
    }

    fn wrap(auth_data: Vec<u8>) -> Vec<u8> {
        let mut bytes = Vec::new();
        ciborium::into_writer(
            &Value::Map(vec![
                (Value::Text("fmt".into()), Value::Text("none".into())),
                (Value::Text("attStmt".into()), Value::Map(vec![])),
                (Value::Text("authData".into()), Value::Bytes(auth_data)),
            ]),
            &mut bytes,
        )
        .unwrap();
        bytes
    }

    fn auth_data_with_key(flags: u8, cose_key: Vec<(Value, Value)>) -> Vec<u8> {
        let mut auth_data = vec![0xab; 32];
        auth_data.push(flags);
        auth_data.extend_from_slice(&5u32.to_be_bytes());
        auth_data.extend_from_slice(&[0x01; 16]);
        auth_data.extend_from_slice(&3u16.to_be_bytes());
        auth_data.extend_from_slice(&[0xc0, 0xff, 0xee]);
        ciborium::into_writer(&Value::Map(cose_key), &mut auth_data).unwrap();
        auth_data
    }

    fn cose_key(alg: i64, crv: i64, x: Vec<u8>, y: Vec<u8>) -> Vec<(Value, Value)> {
        vec![
            (int(1), int(2)),
            (int(3), int(alg)),
            (int(-1), int(crv)),
            (int(-2), Value::Bytes(x)),
            (int(-3), Value::Bytes(y)),
        ]
    }

    #[test]
    fn it_decodes_an_attestation_from_a_software_authenticator() {
        let authenticator = authenticator();
        let object = authenticator.attestation_object(RP_ID, 0x45);

        let key = decode_attestation(&object, authenticator.credential_id(), RP_ID).unwrap();
        let (x, y) = authenticator.coordinates();

        assert_eq!(key.x, x);
        assert_eq!(key.y, y);
        assert_eq!(key.credential_id, authenticator.credential_id());
        assert_eq!(key.relying_party_id, RP_ID);
        assert_eq!(key.flags.bits(), 0x45);
        assert_eq!(key.presence(), Presence::Verified);
        assert_eq!(key.sign_count, authenticator.sign_count());
    }

    #[test]
    fn it_reads_the_counter_big_endian() {
        let object = wrap(auth_data_with_key(
            0x41,
            cose_key(-7, 1, vec![1; 32], vec![2; 32]),
        ));
        let key = decode_attestation(&object, &[0xc0, 0xff, 0xee], RP_ID).unwrap();
        assert_eq!(key.sign_count, 5);
        assert_eq!(key.aaguid, [0x01; 16]);
        assert_eq!(key.presence(), Presence::Present);
    }

    #[test]
    fn it_ignores_extension_data_after_the_key() {
        let mut auth_data = auth_data_with_key(0xc1, cose_key(-7, 1, vec![1; 32], vec![2; 32]));
        ciborium::into_writer(
            &Value::Map(vec![(Value::Text("credProtect".into()), int(1))]),
            &mut auth_data,
        )
        .unwrap();

        let key = decode_attestation(&wrap(auth_data), &[0xc0, 0xff, 0xee], RP_ID).unwrap();
        assert!(key.flags.extension_data_present());
        assert_eq!(key.x, [1; 32]);
    }

    #[test]
    fn it_requires_attested_credential_data() {
        let object = wrap(auth_data_with_key(
            0x05,
            cose_key(-7, 1, vec![1; 32], vec![2; 32]),
        ));
        assert!(matches!(
            decode_attestation(&object, &[0xc0, 0xff, 0xee], RP_ID),
            Err(CredentialError::AttestationMalformed(_))
        ));
    }

    #[test]
    fn it_rejects_truncated_authenticator_data() {
        let object = wrap(vec![0xab; 34]);
        assert!(matches!(
            decode_attestation(&object, &[], RP_ID),
            Err(CredentialError::AttestationMalformed(_))
        ));

        let mut auth_data = auth_data_with_key(0x41, cose_key(-7, 1, vec![1; 32], vec![2; 32]));
        auth_data.truncate(32 + 1 + 4 + 16 + 2 + 1);
        assert!(matches!(
            decode_attestation(&wrap(auth_data), &[0xc0, 0xff, 0xee], RP_ID),
            Err(CredentialError::AttestationMalformed(_))
        ));
    }

    #[test]
    fn it_rejects_objects_that_are_not_cbor_maps() {
        assert!(matches!(
            decode_attestation(&[0xff, 0x00], &[], RP_ID),
            Err(CredentialError::AttestationMalformed(_))
        ));

        let mut object = Vec::new();
        ciborium::into_writer(&Value::Text("authData".into()), &mut object).unwrap();
        assert!(matches!(
            decode_attestation(&object, &[], RP_ID),
            Err(CredentialError::AttestationMalformed(_))
        ));
    }

    #[test]
    fn it_rejects_other_algorithms_and_curves() {
        for (alg, crv) in [(-257, 1), (-8, 1), (-7, 2), (-35, 2)] {
            let object = wrap(auth_data_with_key(
                0x41,
                cose_key(alg, crv, vec![1; 32], vec![2; 32]),
            ));
            assert!(
                matches!(
                    decode_attestation(&object, &[0xc0, 0xff, 0xee], RP_ID),
                    Err(CredentialError::UnsupportedKeyAlgorithm(_))
                ),
                "alg {alg} crv {crv} should be rejected"
            );
        }
    }

    #[test]
    fn it_rejects_non_ec2_keys() {
        let mut key = cose_key(-7, 1, vec![1; 32], vec![2; 32]);
        key[0] = (int(1), int(3));
        let object = wrap(auth_data_with_key(0x41, key));
        assert!(matches!(
            decode_attestation(&object, &[0xc0, 0xff, 0xee], RP_ID),
            Err(CredentialError::UnsupportedKeyAlgorithm(_))
        ));
    }

    #[test]
    fn it_rejects_coordinates_of_the_wrong_size() {
        let object = wrap(auth_data_with_key(
            0x41,
            cose_key(-7, 1, vec![1; 31], vec![2; 32]),
        ));
        assert!(matches!(
            decode_attestation(&object, &[0xc0, 0xff, 0xee], RP_ID),
            Err(CredentialError::InvalidKeySize { x: 31, y: 32 })
        ));

        let object = wrap(auth_data_with_key(
            0x41,
            cose_key(-7, 1, vec![1; 32], vec![2; 33]),
        ));
        assert!(matches!(
            decode_attestation(&object, &[0xc0, 0xff, 0xee], RP_ID),
            Err(CredentialError::InvalidKeySize { x: 32, y: 33 })
        ));
    }

    #[test]
    fn it_reports_a_missing_coordinate_as_empty() {
        let mut key = cose_key(-7, 1, vec![1; 32], vec![2; 32]);
        key.retain(|(label, _)| *label != int(-3));
        assert!(matches!(
            decode_attestation(&wrap(auth_data_with_key(0x41, key)), &[0xc0, 0xff, 0xee], RP_ID),
            Err(CredentialError::InvalidKeySize { x: 32, y: 0 })
        ));

        let mut key = cose_key(-7, 1, vec![1; 32], vec![2; 32]);
        key[3].1 = Value::Text("not bytes".into());
        assert!(matches!(
            decode_attestation(&wrap(auth_data_with_key(0x41, key)), &[0xc0, 0xff, 0xee], RP_ID),
            Err(CredentialError::InvalidKeySize { x: 0, y: 32 })
        ));
    }

    #[test]
    fn it_rejects_a_mismatched_credential_id() {
        let authenticator = authenticator();
        let object = authenticator.attestation_object(RP_ID, 0x45);
        assert!(matches!(
            decode_attestation(&object, &[0xde, 0xad], RP_ID),
            Err(CredentialError::CredentialIdMismatch)
        ));
    }
}
