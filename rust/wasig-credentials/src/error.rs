//! Error types for credential decoding, signing and the surrounding plumbing.

use thiserror::Error;
use wasig_encoding::EncodingError;

/// Errors from enrolling a WebAuthn credential or signing with one.
///
/// None of these are retried internally. Decoding errors reject the single
/// credential under validation; signing errors abort the whole batch of
/// required keys for a digest.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The attestation object or its authenticator data could not be decoded.
    #[error("malformed attestation: {0}")]
    AttestationMalformed(String),

    /// The credential public key is not EC2 / ES256 / P-256.
    #[error("unsupported key algorithm: {0}")]
    UnsupportedKeyAlgorithm(String),

    /// A public key coordinate is not exactly 32 bytes.
    #[error("public key has invalid X or Y size (x: {x} bytes, y: {y} bytes)")]
    InvalidKeySize {
        /// Length of the X coordinate.
        x: usize,
        /// Length of the Y coordinate.
        y: usize,
    },

    /// The credential id in the attestation is not the one the browser reported.
    #[error("credential ID does not match")]
    CredentialIdMismatch,

    /// The compact key encoding decoded but does not describe a usable key.
    #[error("malformed key: {0}")]
    MalformedKey(String),

    /// A required key has no enrolled credential.
    #[error("failed to find required key {0}")]
    UnknownKey(String),

    /// The DER signature from the authenticator is not a well-formed ECDSA signature.
    #[error("malformed signature: {0}")]
    SignatureMalformed(String),

    /// An `r` or `s` component does not fit in 32 bytes.
    #[error("signature has an r or s that is too big")]
    SignatureOverflow,

    /// No recovery id reproduces the expected public key.
    #[error("no recovery id matches the expected public key")]
    RecoveryFailed,

    /// Binary or textual encoding failed.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// A hex field in a submission is not valid hex.
    #[error("invalid hex in {field}: {source}")]
    InvalidHex {
        /// The submission field that failed to decode.
        field: &'static str,
        /// The underlying decode error.
        source: hex::FromHexError,
    },

    /// The key store could not be read or written.
    #[error("key store error: {0}")]
    Store(String),

    /// The configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The browser flow could not be opened.
    #[error("unable to open browser flow: {0}")]
    Launch(String),

    /// A pending assertion can no longer be delivered.
    #[error("assertion rendezvous closed before an assertion arrived")]
    RendezvousClosed,
}

impl CredentialError {
    pub(crate) fn invalid_hex(field: &'static str) -> impl FnOnce(hex::FromHexError) -> Self {
        move |source| CredentialError::InvalidHex { field, source }
    }
}
