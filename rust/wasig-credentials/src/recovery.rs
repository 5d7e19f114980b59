//! Public key recovery for P-256 signatures.
//!
//! A ledger verifies WebAuthn signatures without being handed the public key:
//! it reconstructs the key from the signature and a recovery id, then compares
//! it against the key the account declares. The authenticator does not report
//! the recovery id, so it has to be found by trial.

use crate::{CredentialError, SCALAR_LENGTH};
use ecdsa::RecoveryId;
use p256::{
    FieldBytes,
    ecdsa::{Signature, VerifyingKey},
};

/// Number of candidate recovery ids.
pub const RECOVERY_ID_COUNT: u8 = 4;

/// Recovers the public key that produced `(r, s)` over `hash` under one
/// candidate recovery id, or `None` if the candidate yields no valid key.
pub fn recover(
    hash: &[u8; 32],
    r: &[u8; SCALAR_LENGTH],
    s: &[u8; SCALAR_LENGTH],
    candidate_id: u8,
) -> Option<VerifyingKey> {
    let recovery_id = RecoveryId::from_byte(candidate_id)?;
    let signature = Signature::from_scalars(FieldBytes::from(*r), FieldBytes::from(*s)).ok()?;

    VerifyingKey::recover_from_prehash(hash, &signature, recovery_id).ok()
}

/// Finds the recovery id under which `(r, s)` recovers `expected`. Ids are
/// tried in ascending order.
///
/// # Errors
///
/// Returns [`CredentialError::RecoveryFailed`] if no candidate matches.
pub fn find_recovery_id(
    hash: &[u8; 32],
    r: &[u8; SCALAR_LENGTH],
    s: &[u8; SCALAR_LENGTH],
    expected: &VerifyingKey,
) -> Result<u8, CredentialError> {
    (0..RECOVERY_ID_COUNT)
        .find(|candidate| recover(hash, r, s, *candidate).as_ref() == Some(expected))
        .ok_or(CredentialError::RecoveryFailed)
}
