use crate::{
    AttestationSubmission, CredentialError, CredentialKey, KeyRing, KeyStore, StoredKey,
    decode_attestation,
};

/// Enrolls the credential described by `submission` as the only active key.
///
/// The attestation is fully decoded and validated before anything is
/// written, so a rejected submission leaves both `keys` and `store` as they
/// were.
pub async fn enroll(
    submission: &AttestationSubmission,
    keys: &KeyRing,
    store: &KeyStore,
) -> Result<CredentialKey, CredentialError> {
    let raw_id = submission.raw_id()?;
    let attestation_object = submission.attestation_object()?;
    let credential =
        decode_attestation(&attestation_object, &raw_id, &submission.relying_party_id)?;

    let stored = StoredKey::from(&credential);
    store.persist(&stored).await?;
    tracing::info!(key = %stored.key, credential_id = %stored.credential_id, "Enrolled key");
    keys.replace(stored);

    Ok(credential)
}
