use sha2::{Digest, Sha256};

/// Length of the context-free-data placeholder appended to every digest.
const CONTEXT_FREE_DATA_LENGTH: usize = 32;

/// The 32-byte hash of a transaction that an authenticator is asked to sign.
///
/// Computed as `SHA-256(chain_id | serialized_transaction | 32 zero bytes)`.
/// The trailing zero block stands in for the hash of context-free data,
/// which this system never attaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionDigest([u8; 32]);

impl TransactionDigest {
    /// Hashes `serialized_transaction` for signing on `chain_id`.
    pub fn compute(chain_id: &[u8], serialized_transaction: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(chain_id);
        hasher.update(serialized_transaction);
        hasher.update([0u8; CONTEXT_FREE_DATA_LENGTH]);
        Self(hasher.finalize().into())
    }

    /// The raw digest, which is also the WebAuthn challenge.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lower-case hex, as embedded in the transfer URL.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; 32]> for TransactionDigest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Display for TransactionDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_hashes_an_empty_transaction_on_a_zero_chain() {
        let digest = TransactionDigest::compute(&[0u8; 32], &[]);
        assert_eq!(
            digest.to_hex(),
            "f5a5fd42d16a20302798ef6ed309979b43003d2320d9f0e8ea9831a92759fb4b"
        );
    }

    #[test]
    fn it_binds_the_chain_id() {
        let transaction = b"transfer 1.0000 SYS";
        assert_ne!(
            TransactionDigest::compute(&[0u8; 32], transaction),
            TransactionDigest::compute(&[1u8; 32], transaction)
        );
    }

    #[test]
    fn it_appends_the_zero_block() {
        let chain_id = [9u8; 32];
        let transaction = b"payload";

        let mut hasher = Sha256::new();
        hasher.update(chain_id);
        hasher.update(transaction);
        let without_block: [u8; 32] = hasher.finalize().into();

        assert_ne!(
            TransactionDigest::compute(&chain_id, transaction).as_bytes(),
            &without_block
        );
    }
}
