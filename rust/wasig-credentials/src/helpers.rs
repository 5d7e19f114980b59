//! A software authenticator standing in for the browser and its hardware
//! key, so enrollment and signing can be driven end to end in tests.

use crate::{
    Assertion, AssertionFields, AssertionSubmission, AttestationFlags, AttestationSubmission,
    CredentialError, Presence, TransactionDigest, WebAuthnPublicKey,
};
use base64::Engine;
use ciborium::{Value, value::Integer};
use p256::ecdsa::{DerSignature, SigningKey, VerifyingKey, signature::Signer as _};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU32, Ordering};
use url::Url;

/// AAGUID reported by [`SoftwareAuthenticator`].
pub const SOFTWARE_AAGUID: [u8; 16] = *b"wasig-software-1";

/// A P-256 authenticator holding one credential.
#[derive(Debug)]
pub struct SoftwareAuthenticator {
    signing_key: SigningKey,
    credential_id: Vec<u8>,
    sign_count: AtomicU32,
}

impl SoftwareAuthenticator {
    /// An authenticator whose private key is `seed`.
    ///
    /// # Panics
    ///
    /// If `seed` is zero or not below the curve order.
    pub fn from_seed(seed: [u8; 32], credential_id: Vec<u8>) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed.into())
                .expect("seed is a valid P-256 scalar"),
            credential_id,
            sign_count: AtomicU32::new(1),
        }
    }

    /// The credential id.
    pub fn credential_id(&self) -> &[u8] {
        &self.credential_id
    }

    /// The current signature counter.
    pub fn sign_count(&self) -> u32 {
        self.sign_count.load(Ordering::SeqCst)
    }

    /// The credential's public key.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key().clone()
    }

    /// The affine `(x, y)` coordinates of the public key.
    pub fn coordinates(&self) -> ([u8; 32], [u8; 32]) {
        // 0x04 | x | y
        let point = self.signing_key.verifying_key().to_encoded_point(false);
        let bytes = point.as_bytes();
        let mut x = [0u8; 32];
        let mut y = [0u8; 32];
        x.copy_from_slice(&bytes[1..33]);
        y.copy_from_slice(&bytes[33..65]);
        (x, y)
    }

    /// The ledger-facing key this credential enrolls as with `flags`.
    pub fn public_key(&self, relying_party_id: &str, flags: u8) -> WebAuthnPublicKey {
        let (x, y) = self.coordinates();
        WebAuthnPublicKey::from_coordinates(
            x,
            &y,
            Presence::from_flags(AttestationFlags::from_bits(flags)),
            relying_party_id,
        )
    }

    /// A `none`-format attestation object for this credential.
    pub fn attestation_object(&self, relying_party_id: &str, flags: u8) -> Vec<u8> {
        let (x, y) = self.coordinates();
        let cose_key = Value::Map(vec![
            (int(1), int(2)),
            (int(3), int(-7)),
            (int(-1), int(1)),
            (int(-2), Value::Bytes(x.to_vec())),
            (int(-3), Value::Bytes(y.to_vec())),
        ]);

        let mut auth_data = self.authenticator_data(relying_party_id, flags);
        auth_data.extend_from_slice(&SOFTWARE_AAGUID);
        auth_data.extend_from_slice(&(self.credential_id.len() as u16).to_be_bytes());
        auth_data.extend_from_slice(&self.credential_id);
        cbor(&cose_key, &mut auth_data);

        let mut object = Vec::new();
        cbor(
            &Value::Map(vec![
                (Value::Text("fmt".into()), Value::Text("none".into())),
                (Value::Text("attStmt".into()), Value::Map(vec![])),
                (Value::Text("authData".into()), Value::Bytes(auth_data)),
            ]),
            &mut object,
        );
        object
    }

    /// What the generate page posts after creating this credential. Hex is
    /// upper-case, as browsers produce it.
    pub fn attestation_submission(
        &self,
        relying_party_id: &str,
        flags: u8,
    ) -> AttestationSubmission {
        let client_data_json =
            client_data_json("webauthn.create", b"registration", relying_party_id);
        AttestationSubmission {
            relying_party_id: relying_party_id.to_owned(),
            raw_id: hex::encode_upper(&self.credential_id),
            attestation_object: hex::encode_upper(self.attestation_object(relying_party_id, flags)),
            client_data_json: hex::encode_upper(client_data_json),
        }
    }

    /// Signs `digest` as the WebAuthn challenge, bumping the counter.
    pub fn assert(&self, digest: &TransactionDigest, relying_party_id: &str) -> Assertion {
        self.sign_count.fetch_add(1, Ordering::SeqCst);

        let authenticator_data = self.authenticator_data(
            relying_party_id,
            AttestationFlags::USER_PRESENT | AttestationFlags::USER_VERIFIED,
        );
        let client_data_json =
            client_data_json("webauthn.get", digest.as_bytes(), relying_party_id);

        let mut signed_data = authenticator_data.clone();
        signed_data.extend_from_slice(&Sha256::digest(&client_data_json));
        let signature: DerSignature = self.signing_key.sign(&signed_data);

        Assertion {
            signature: signature.as_bytes().to_vec(),
            authenticator_data,
            client_data_json,
        }
    }

    /// Plays the transfer page: reads the key and digest from `url`, signs,
    /// and returns what the page would post back.
    pub fn answer_transfer(&self, url: &Url) -> Result<AssertionSubmission, CredentialError> {
        let query = |name: &str| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
                .ok_or_else(|| CredentialError::Launch(format!("transfer URL has no {name}")))
        };

        let public_key: WebAuthnPublicKey = query("publicKey")?.parse()?;
        let digest: [u8; 32] = hex::decode(query("digest")?)
            .map_err(CredentialError::invalid_hex("digest"))?
            .try_into()
            .map_err(|_| CredentialError::Launch("digest is not 32 bytes".into()))?;

        let assertion = self.assert(
            &TransactionDigest::from(digest),
            public_key.relying_party_id(),
        );
        Ok(AssertionSubmission {
            public_key,
            assertion: AssertionFields {
                signature_hex: hex::encode_upper(&assertion.signature),
                authenticator_data_hex: hex::encode_upper(&assertion.authenticator_data),
                client_data_json_hex: hex::encode_upper(&assertion.client_data_json),
            },
        })
    }

    fn authenticator_data(&self, relying_party_id: &str, flags: u8) -> Vec<u8> {
        let mut auth_data = Vec::with_capacity(37);
        auth_data.extend_from_slice(&Sha256::digest(relying_party_id.as_bytes()));
        auth_data.push(flags);
        auth_data.extend_from_slice(&self.sign_count().to_be_bytes());
        auth_data
    }
}

fn client_data_json(kind: &str, challenge: &[u8], relying_party_id: &str) -> Vec<u8> {
    let challenge = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(challenge);
    serde_json::json!({
        "type": kind,
        "challenge": challenge,
        "origin": format!("https://{relying_party_id}:8443"),
        "crossOrigin": false
    })
    .to_string()
    .into_bytes()
}

fn int(value: i64) -> Value {
    Value::Integer(Integer::from(value))
}

fn cbor(value: &Value, out: &mut Vec<u8>) {
    ciborium::into_writer(value, out).expect("writing CBOR to a Vec cannot fail");
}
