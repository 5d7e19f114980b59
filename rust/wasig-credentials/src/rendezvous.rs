//! Hand-off between the signer and the browser flow.
//!
//! The signer cannot produce an assertion itself: it opens a browser page and
//! waits for that page to post the authenticator's response back. Each
//! request is a single-resolution channel keyed by the public key string,
//! resolved by whoever serves the page.

use crate::{Assertion, AssertionSubmission, CredentialError, WebAuthnPublicKey};
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{
    sync::oneshot,
    time::{Instant, interval_at},
};
use url::Url;

/// Opens the browser flow for a signing request.
pub trait BrowserLauncher {
    /// Directs the user's browser to `url`.
    fn open(&self, url: &Url) -> Result<(), CredentialError>;
}

impl<F> BrowserLauncher for F
where
    F: Fn(&Url) -> Result<(), CredentialError>,
{
    fn open(&self, url: &Url) -> Result<(), CredentialError> {
        self(url)
    }
}

/// Pending assertion requests, keyed by public key string.
#[derive(Debug, Clone, Default)]
pub struct Rendezvous {
    pending: Arc<Mutex<HashMap<String, oneshot::Sender<Assertion>>>>,
}

impl Rendezvous {
    /// A rendezvous with nothing pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a request for an assertion by `key`. An earlier request for
    /// the same key is abandoned.
    pub fn request(&self, key: &WebAuthnPublicKey) -> PendingAssertion {
        let key = key.to_string();
        let (sender, receiver) = oneshot::channel();
        self.pending.lock().insert(key.clone(), sender);
        PendingAssertion { key, receiver }
    }

    /// Withdraws `pending` so a later submission for its key is
    /// [`CredentialError::UnknownKey`]. A newer request for the same key is
    /// left in place.
    pub fn abandon(&self, pending: PendingAssertion) {
        let PendingAssertion { key, receiver } = pending;
        drop(receiver);

        let mut requests = self.pending.lock();
        if requests.get(&key).is_some_and(|sender| sender.is_closed()) {
            requests.remove(&key);
            tracing::debug!(%key, "Abandoned assertion request");
        }
    }

    /// Whether a request for `key` is waiting.
    pub fn is_pending(&self, key: &WebAuthnPublicKey) -> bool {
        self.pending.lock().contains_key(&key.to_string())
    }

    /// Resolves the pending request for the submission's key.
    ///
    /// # Errors
    ///
    /// - [`CredentialError::InvalidHex`] if an assertion field is not hex; the
    ///   request stays pending.
    /// - [`CredentialError::UnknownKey`] if nothing is waiting for that key.
    /// - [`CredentialError::RendezvousClosed`] if the waiter has gone away.
    pub fn submit(&self, submission: AssertionSubmission) -> Result<(), CredentialError> {
        let assertion = submission.assertion.decode()?;
        let key = submission.public_key.to_string();

        let sender = self
            .pending
            .lock()
            .remove(&key)
            .ok_or(CredentialError::UnknownKey(key))?;
        sender
            .send(assertion)
            .map_err(|_| CredentialError::RendezvousClosed)
    }
}

/// A registered request, resolved once by [`Rendezvous::submit`].
#[derive(Debug)]
pub struct PendingAssertion {
    key: String,
    receiver: oneshot::Receiver<Assertion>,
}

impl PendingAssertion {
    /// The key this request is for.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Suspends until the assertion arrives, logging a warning every
    /// `notice_interval` spent waiting. There is no timeout.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::RendezvousClosed`] if the request is
    /// abandoned, either by a newer request for the same key or by the
    /// rendezvous being dropped.
    pub async fn wait(self, notice_interval: Duration) -> Result<Assertion, CredentialError> {
        let Self { key, mut receiver } = self;
        let period = notice_interval.max(Duration::from_millis(1));
        let started = Instant::now();
        let mut notices = interval_at(started + period, period);

        tracing::debug!(%key, "Waiting for assertion to come back from browser");
        loop {
            tokio::select! {
                received = &mut receiver => {
                    let assertion = received.map_err(|_| CredentialError::RendezvousClosed)?;
                    tracing::info!(%key, "Got assertion from browser");
                    return Ok(assertion);
                }
                _ = notices.tick() => {
                    tracing::warn!(
                        %key,
                        waited = ?started.elapsed(),
                        "Still waiting for assertion to come back from browser"
                    );
                }
            }
        }
    }
}
