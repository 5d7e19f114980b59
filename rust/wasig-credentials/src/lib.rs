#![warn(missing_docs)]

//! Transcodes WebAuthn credentials into ledger-native keys and signatures.
//!
//! A ledger that understands `WA` keys can treat a WebAuthn authenticator as
//! a signing device. This crate sits between the two:
//!
//! - **Enrollment**: [`decode_attestation`] validates the attestation object
//!   a browser returns when a credential is created, yielding a
//!   [`CredentialKey`] whose [`WebAuthnPublicKey`] encodes as `PUB_WA_...`.
//!   [`enroll`] runs that decoding and records the key in a [`KeyRing`] and
//!   [`KeyStore`].
//! - **Signing**: [`AssertionSigner`] asks the browser for an assertion over a
//!   [`TransactionDigest`], parses its DER signature, finds the recovery id,
//!   and emits a [`WebAuthnSignature`] as `SIG_WA_...`.
//!
//! The browser side is reached through a [`Rendezvous`]: the signer opens a
//! page with a [`BrowserLauncher`] and suspends until whoever serves that page
//! [submits](Rendezvous::submit) the authenticator's response.
//!
//! Only one key is active at a time. The authenticator's signature counter
//! is recorded but not checked for monotonicity.

mod attestation;
pub use attestation::*;

mod config;
pub use config::*;

mod der;
pub use der::*;

mod digest;
pub use digest::*;

mod doctor;
pub use doctor::*;

mod enroll;
pub use enroll::*;

mod error;
pub use error::*;

mod key;
pub use key::*;

mod recovery;
pub use recovery::*;

mod rendezvous;
pub use rendezvous::*;

mod signature;
pub use signature::*;

mod signer;
pub use signer::*;

mod store;
pub use store::*;

mod submission;
pub use submission::*;

#[cfg(any(test, feature = "helpers"))]
pub mod helpers;
