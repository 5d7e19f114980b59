//! Signing transactions with the enrolled WebAuthn credential.
//!
//! For every required key the signer hands the transaction digest to the
//! browser as a WebAuthn challenge, waits for the assertion, and converts it
//! into a `SIG_WA_` signature the ledger can recover the key from.

use crate::{
    Assertion, BridgeConfig, BrowserLauncher, CredentialError, KeyRing, Rendezvous, StoredKey,
    TransactionDigest, WebAuthnPublicKey, WebAuthnSignature, find_recovery_id,
    parse_der_signature,
};
use serde::{Deserialize, Serialize};

/// A transaction together with its signatures, ready to push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransaction {
    /// One `SIG_WA_` string per required key, in the order requested.
    pub signatures: Vec<String>,
    /// The transaction that was signed.
    #[serde(with = "hex::serde")]
    pub serialized_transaction: Vec<u8>,
}

/// Produces ledger-native signatures by round-tripping through the browser.
pub struct AssertionSigner<L> {
    config: BridgeConfig,
    keys: KeyRing,
    rendezvous: Rendezvous,
    launcher: L,
}

impl<L> AssertionSigner<L>
where
    L: BrowserLauncher,
{
    /// A signer using the keys in `keys`. Assertions are expected to arrive
    /// through `rendezvous`.
    pub fn new(config: BridgeConfig, keys: KeyRing, rendezvous: Rendezvous, launcher: L) -> Self {
        Self {
            config,
            keys,
            rendezvous,
            launcher,
        }
    }

    /// The `PUB_WA_` strings this signer can sign with.
    pub fn available_keys(&self) -> Vec<String> {
        self.keys.available_keys()
    }

    /// Signs `serialized_transaction` for `chain_id` with every key in
    /// `required_keys`.
    ///
    /// Either every key signs or the whole batch fails. Each key suspends
    /// until its assertion arrives from the browser.
    pub async fn sign<Key>(
        &self,
        required_keys: &[Key],
        chain_id: &[u8],
        serialized_transaction: &[u8],
    ) -> Result<SignedTransaction, CredentialError>
    where
        Key: AsRef<str>,
    {
        let required_keys: Vec<&str> = required_keys.iter().map(|key| key.as_ref()).collect();
        tracing::debug!(?required_keys, "Required keys");

        let stored_keys = required_keys
            .iter()
            .map(|key| {
                self.keys
                    .get(key)
                    .ok_or_else(|| CredentialError::UnknownKey((*key).to_owned()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let digest = TransactionDigest::compute(chain_id, serialized_transaction);
        tracing::debug!(%digest, "Digest to sign");

        let mut signatures = Vec::with_capacity(stored_keys.len());
        for stored in &stored_keys {
            let assertion = self.acquire_assertion(stored, &digest).await?;
            let signature = assemble_signature(&stored.key, &assertion)?;
            signatures.push(signature.string_encoding()?);
        }

        Ok(SignedTransaction {
            signatures,
            serialized_transaction: serialized_transaction.to_vec(),
        })
    }

    async fn acquire_assertion(
        &self,
        stored: &StoredKey,
        digest: &TransactionDigest,
    ) -> Result<Assertion, CredentialError> {
        let url = self.config.transfer_url(stored, digest)?;
        let pending = self.rendezvous.request(&stored.key);

        tracing::debug!(%url, "Opening browser");
        if let Err(error) = self.launcher.open(&url) {
            self.rendezvous.abandon(pending);
            return Err(error);
        }

        pending.wait(self.config.waiting_notice_interval).await
    }
}

/// Converts an assertion made by `key` into a ledger-native signature.
///
/// # Errors
///
/// Fails if the DER signature is malformed or no recovery id reproduces
/// `key`.
pub fn assemble_signature(
    key: &WebAuthnPublicKey,
    assertion: &Assertion,
) -> Result<WebAuthnSignature, CredentialError> {
    let expected = key.verifying_key()?;
    let (r, s) = parse_der_signature(&assertion.signature)?;
    let recovery_id = find_recovery_id(&assertion.signed_hash(), &r, &s, &expected)?;

    Ok(WebAuthnSignature {
        recovery_id,
        r,
        s,
        authenticator_data: assertion.authenticator_data.clone(),
        client_data_json: assertion.client_data_json.clone(),
    })
}
