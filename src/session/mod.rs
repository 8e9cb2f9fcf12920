//! Session lifecycle, token refresh and the session event channel.
//!
//! A [`Session`] owns the token pair for its whole life: created at sign-in,
//! replaced wholesale by the [`SessionRefresher`] on reissue, cleared on
//! sign-out or forced logout. Screens learn about session loss by
//! subscribing to [`SessionEvents`] handed out by the composition root.

pub mod authenticator;
pub mod refresher;

pub use authenticator::{AuthOutcome, TokenAuthenticator};
pub use refresher::SessionRefresher;

use crate::data::TokenPair;
use crate::prefs::PreferenceStore;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The server rejected the session outright; every screen must return to
    /// the sign-in entry point.
    ForcedLogout,
    /// The user signed out.
    SignedOut,
}

/// Broadcast channel for [`SessionEvent`]s. Fire-and-observe: emitting with
/// no subscribers is not an error.
#[derive(Debug, Clone)]
pub struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new(16)
    }
}

impl SessionEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("No subscribers for session event {:?}", event);
        }
    }
}

/// Sign-in state backed by the preference store.
#[derive(Clone)]
pub struct Session {
    prefs: Arc<PreferenceStore>,
    events: SessionEvents,
}

impl Session {
    pub fn new(prefs: Arc<PreferenceStore>, events: SessionEvents) -> Self {
        Self { prefs, events }
    }

    pub fn events(&self) -> &SessionEvents {
        &self.events
    }

    pub fn prefs(&self) -> &Arc<PreferenceStore> {
        &self.prefs
    }

    pub fn is_signed_in(&self) -> bool {
        self.prefs.token_pair().is_some()
    }

    pub fn access_token(&self) -> Option<String> {
        self.prefs.token_pair().map(|pair| pair.access_token)
    }

    pub fn sign_in(&self, tokens: &TokenPair) -> Result<()> {
        self.prefs.save_token_pair(tokens)?;
        tracing::info!("Signed in");
        Ok(())
    }

    pub fn sign_out(&self) -> Result<()> {
        self.prefs.clear_token_pair()?;
        tracing::info!("Signed out");
        self.events.emit(SessionEvent::SignedOut);
        Ok(())
    }

    /// Drop the session because the server no longer accepts it.
    pub fn force_logout(&self) {
        tracing::error!("Session token rejected, forcing logout");
        if let Err(e) = self.prefs.clear_token_pair() {
            tracing::warn!("Failed to clear tokens on forced logout: {}", e);
        }
        self.events.emit(SessionEvent::ForcedLogout);
    }
}
