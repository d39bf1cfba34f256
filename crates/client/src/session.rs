//! Authenticated session state.
//!
//! [`SessionStore`] owns the current [`Credential`] and its persisted copy.
//! It is passed explicitly to the components that need it; there is no
//! process-wide session.
//!
//! # Events
//!
//! Every change is published as a [`SessionEvent`]. The application shell
//! subscribes to learn that the session was torn down after the server
//! rejected the credential and that the user must log in again.

use std::sync::{Arc, PoisonError, RwLock};

use nutriscan_core::Credential;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::storage::{KeyValueStore, StorageError};

/// Storage key of the persisted credential.
pub const TOKEN_KEY: &str = "nutriscan.token";
/// Storage key of the one-shot install prompt flag.
pub const INSTALL_PROMPT_DISMISSED_KEY: &str = "nutriscan.install_prompt_dismissed";

const EVENT_CAPACITY: usize = 16;

/// A change to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A new credential was stored after login or registration.
    SignedIn,
    /// The user logged out.
    SignedOut,
    /// The server rejected the credential; the user must log in again.
    Invalidated,
}

/// Shared handle to the session credential.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    credential: RwLock<Option<Credential>>,
    storage: Arc<dyn KeyValueStore>,
    events: broadcast::Sender<SessionEvent>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("signed_in", &self.is_signed_in())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Restore the session from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the persisted credential cannot be read.
    pub fn open(storage: Arc<dyn KeyValueStore>) -> Result<Self, StorageError> {
        let credential = storage
            .get(TOKEN_KEY)?
            .filter(|token| !token.is_empty())
            .map(Credential::new);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            inner: Arc::new(SessionInner {
                credential: RwLock::new(credential),
                storage,
                events,
            }),
        })
    }

    /// Snapshot of the current credential.
    #[must_use]
    pub fn credential(&self) -> Option<Credential> {
        self.inner
            .credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.inner
            .credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Replace the credential after a successful login or registration.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the credential cannot be persisted. The
    /// in-memory session is left unchanged in that case.
    pub fn sign_in(&self, credential: Credential) -> Result<(), StorageError> {
        self.inner.storage.set(TOKEN_KEY, credential.expose())?;
        *self
            .inner
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(credential);
        info!("Session signed in");
        self.publish(SessionEvent::SignedIn);
        Ok(())
    }

    /// Explicit logout.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the persisted credential cannot be removed.
    /// The in-memory credential is cleared regardless.
    pub fn sign_out(&self) -> Result<(), StorageError> {
        self.clear();
        let result = self.inner.storage.remove(TOKEN_KEY);
        info!("Session signed out");
        self.publish(SessionEvent::SignedOut);
        result
    }

    /// Tear the session down after the server rejected the credential.
    ///
    /// Never fails: memory is cleared first so no later request can carry the
    /// rejected credential, and a storage failure is only logged.
    pub fn invalidate(&self) {
        self.clear();
        if let Err(e) = self.inner.storage.remove(TOKEN_KEY) {
            warn!(error = %e, "Failed to remove persisted credential");
        }
        warn!("Session invalidated by server");
        self.publish(SessionEvent::Invalidated);
    }

    /// Tear the session down only if it still holds `rejected`.
    ///
    /// A rejection of an older credential that arrives after the user signed
    /// in again must not destroy the new one. Returns whether the
    /// session was cleared.
    pub fn invalidate_if(&self, rejected: &Credential) -> bool {
        {
            let mut credential = self
                .inner
                .credential
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if credential.as_ref() != Some(rejected) {
                debug!("Ignoring rejection of a superseded credential");
                return false;
            }
            *credential = None;
            if let Err(e) = self.inner.storage.remove(TOKEN_KEY) {
                warn!(error = %e, "Failed to remove persisted credential");
            }
        }
        warn!("Session invalidated by server");
        self.publish(SessionEvent::Invalidated);
        true
    }

    /// Subscribe to session changes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Whether the one-time install prompt was dismissed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the flag cannot be read.
    pub fn install_prompt_dismissed(&self) -> Result<bool, StorageError> {
        Ok(self
            .inner
            .storage
            .get(INSTALL_PROMPT_DISMISSED_KEY)?
            .is_some_and(|v| v == "true"))
    }

    /// Remember that the install prompt was dismissed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the flag cannot be persisted.
    pub fn dismiss_install_prompt(&self) -> Result<(), StorageError> {
        self.inner.storage.set(INSTALL_PROMPT_DISMISSED_KEY, "true")
    }

    fn clear(&self) {
        *self
            .inner
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }
}
