//! Payloads the browser pages post back to the bridge.
//!
//! Binary fields travel as hex strings. Browsers emit upper-case hex; both
//! cases are accepted.

use crate::{Assertion, CredentialError, WebAuthnPublicKey};
use serde::{Deserialize, Serialize};

/// A freshly created credential, posted by the generate page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationSubmission {
    /// The relying party the credential was created for.
    #[serde(alias = "relayPartyId")]
    pub relying_party_id: String,
    /// Credential id as reported by the browser, hex.
    pub raw_id: String,
    /// CBOR attestation object, hex.
    pub attestation_object: String,
    /// Client data from the registration ceremony, hex.
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
}

impl AttestationSubmission {
    /// The credential id bytes.
    pub fn raw_id(&self) -> Result<Vec<u8>, CredentialError> {
        hex::decode(&self.raw_id).map_err(CredentialError::invalid_hex("rawId"))
    }

    /// The attestation object bytes.
    pub fn attestation_object(&self) -> Result<Vec<u8>, CredentialError> {
        hex::decode(&self.attestation_object)
            .map_err(CredentialError::invalid_hex("attestationObject"))
    }

    /// The client data bytes.
    pub fn client_data_json(&self) -> Result<Vec<u8>, CredentialError> {
        hex::decode(&self.client_data_json).map_err(CredentialError::invalid_hex("clientDataJSON"))
    }
}

/// The hex-encoded assertion fields, as the transfer page posts them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionFields {
    /// DER signature, hex.
    pub signature_hex: String,
    /// Authenticator data, hex.
    pub authenticator_data_hex: String,
    /// Client data, hex.
    pub client_data_json_hex: String,
}

impl AssertionFields {
    /// Hex-decodes every field.
    pub fn decode(&self) -> Result<Assertion, CredentialError> {
        Ok(Assertion {
            signature: hex::decode(&self.signature_hex)
                .map_err(CredentialError::invalid_hex("signatureHex"))?,
            authenticator_data: hex::decode(&self.authenticator_data_hex)
                .map_err(CredentialError::invalid_hex("authenticatorDataHex"))?,
            client_data_json: hex::decode(&self.client_data_json_hex)
                .map_err(CredentialError::invalid_hex("clientDataJsonHex"))?,
        })
    }
}

impl From<&Assertion> for AssertionFields {
    fn from(assertion: &Assertion) -> Self {
        Self {
            signature_hex: hex::encode(&assertion.signature),
            authenticator_data_hex: hex::encode(&assertion.authenticator_data),
            client_data_json_hex: hex::encode(&assertion.client_data_json),
        }
    }
}

/// An assertion for one key, posted by the transfer page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionSubmission {
    /// The key the assertion was requested for.
    pub public_key: WebAuthnPublicKey,
    /// The authenticator's response.
    pub assertion: AssertionFields,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Presence;

    #[test]
    fn it_accepts_both_spellings_of_the_relying_party_field() {
        let fields = r#""rawId":"C0FFEE","attestationObject":"A0","clientDataJSON":"7B7D""#;
        let current: AttestationSubmission =
            serde_json::from_str(&format!(r#"{{"relyingPartyId":"localhost",{fields}}}"#)).unwrap();
        let historical: AttestationSubmission =
            serde_json::from_str(&format!(r#"{{"relayPartyId":"localhost",{fields}}}"#)).unwrap();

        assert_eq!(current, historical);
        assert_eq!(current.raw_id().unwrap(), vec![0xc0, 0xff, 0xee]);
        assert_eq!(current.client_data_json().unwrap(), b"{}".to_vec());
    }

    #[test]
    fn it_names_the_field_with_bad_hex() {
        let submission = AttestationSubmission {
            relying_party_id: "localhost".into(),
            raw_id: "c0ffee".into(),
            attestation_object: "not hex".into(),
            client_data_json: "".into(),
        };

        assert!(matches!(
            submission.attestation_object(),
            Err(CredentialError::InvalidHex { field: "attestationObject", .. })
        ));
    }

    #[test]
    fn it_reads_an_assertion_submission() {
        let key =
            WebAuthnPublicKey::from_coordinates([5; 32], &[6; 32], Presence::Present, "localhost");
        let json = serde_json::json!({
            "publicKey": key.to_string(),
            "assertion": {
                "signatureHex": "3006020101020101",
                "authenticatorDataHex": "AABB",
                "clientDataJsonHex": "7b7d",
            }
        });

        let submission: AssertionSubmission = serde_json::from_value(json).unwrap();
        assert_eq!(submission.public_key, key);

        let assertion = submission.assertion.decode().unwrap();
        assert_eq!(assertion.signature, vec![0x30, 6, 2, 1, 1, 2, 1, 1]);
        assert_eq!(assertion.authenticator_data, vec![0xaa, 0xbb]);
        assert_eq!(assertion.client_data_json, b"{}".to_vec());
        assert_eq!(AssertionFields::from(&assertion).authenticator_data_hex, "aabb");
    }
}
