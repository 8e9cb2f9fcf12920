//! Response-interception hook for authentication failures.
//!
//! Dispatches on the server error code: an expired token is repaired through
//! the [`SessionRefresher`], an invalid token ends the session. Transports
//! with an async hook call [`TokenAuthenticator::authenticate`]; transports
//! whose hook is synchronous use [`TokenAuthenticator::authenticate_blocking`],
//! which drives the same async refresh on a runtime handle and waits for it
//! with a bounded timeout.

use super::{Session, SessionRefresher};
use crate::data::TokenPair;
use crate::integrations::{EXPIRED_TOKEN_CODE, INVALID_TOKEN_CODE};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Retransmit the original request with this token pair.
    Reissued(TokenPair),
    /// Refresh was attempted and failed; the original failure stands.
    Failed,
    /// The session was terminated.
    LoggedOut,
    /// Not an authentication code this hook handles.
    Unhandled,
}

#[derive(Clone)]
pub struct TokenAuthenticator {
    refresher: Arc<SessionRefresher>,
    session: Session,
    wait_timeout: Duration,
}

impl TokenAuthenticator {
    pub fn new(refresher: Arc<SessionRefresher>, session: Session, wait_timeout: Duration) -> Self {
        Self {
            refresher,
            session,
            wait_timeout,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn authenticate(&self, code: &str, stale_access: Option<&str>) -> AuthOutcome {
        match code {
            EXPIRED_TOKEN_CODE => match self.refresher.refresh(stale_access).await {
                Some(tokens) => AuthOutcome::Reissued(tokens),
                None => AuthOutcome::Failed,
            },
            INVALID_TOKEN_CODE => {
                self.session.force_logout();
                AuthOutcome::LoggedOut
            }
            other => {
                tracing::debug!("Unhandled auth error code: {:?}", other);
                AuthOutcome::Unhandled
            }
        }
    }

    /// Blocking bridge for synchronous transport hooks.
    ///
    /// Must be called from a thread that is not driving `handle`'s runtime
    /// (a plain thread or `spawn_blocking`). Waits at most the configured
    /// request timeout; a timeout counts as a failed refresh.
    pub fn authenticate_blocking(
        &self,
        handle: &Handle,
        code: &str,
        stale_access: Option<&str>,
    ) -> AuthOutcome {
        let (tx, rx) = mpsc::channel();
        let this = self.clone();
        let code = code.to_string();
        let stale_access = stale_access.map(str::to_string);

        handle.spawn(async move {
            let outcome = this.authenticate(&code, stale_access.as_deref()).await;
            if tx.send(outcome).is_err() {
                tracing::debug!("Blocking authenticator gave up before refresh finished");
            }
        });

        match rx.recv_timeout(self.wait_timeout) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("Timed out waiting for token refresh: {}", e);
                AuthOutcome::Failed
            }
        }
    }
}
