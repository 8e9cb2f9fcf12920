//! Single-flight access token reissue.
//!
//! Several requests can fail with an expired token at once. The first one to
//! arrive starts the reissue and parks it as a shared future; everyone else
//! awaits a clone of that same future, so N failures cost one network call
//! and all callers observe the same token pair.

use crate::data::TokenPair;
use crate::integrations::{AuthGateway, ReissueRequest};
use crate::prefs::PreferenceStore;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const MOBILE_TYPE: &str = "ANDROID";

type RefreshFlight = Shared<BoxFuture<'static, Option<TokenPair>>>;

pub struct SessionRefresher {
    gateway: Arc<dyn AuthGateway>,
    prefs: Arc<PreferenceStore>,
    in_flight: Mutex<Option<RefreshFlight>>,
}

impl SessionRefresher {
    pub fn new(gateway: Arc<dyn AuthGateway>, prefs: Arc<PreferenceStore>) -> Self {
        Self {
            gateway,
            prefs,
            in_flight: Mutex::new(None),
        }
    }

    /// Obtain a fresh token pair.
    ///
    /// `stale_access` is the access token the failing request was sent with.
    /// If the stored token already differs, another caller refreshed in the
    /// meantime and the stored pair is returned without a network call.
    ///
    /// Returns `None` when there is no stored session or reissue fails; the
    /// original request's failure then stands.
    pub async fn refresh(&self, stale_access: Option<&str>) -> Option<TokenPair> {
        let flight = {
            let mut slot = self.in_flight.lock().await;
            match slot.as_ref() {
                Some(flight) => {
                    tracing::debug!("Joining in-flight token refresh");
                    flight.clone()
                }
                None => {
                    let Some(current) = self.prefs.token_pair() else {
                        tracing::warn!("No stored tokens to refresh");
                        return None;
                    };
                    if let Some(stale) = stale_access {
                        if current.access_token != stale {
                            tracing::debug!("Access token already refreshed, reusing it");
                            return Some(current);
                        }
                    }

                    let flight = reissue(
                        Arc::clone(&self.gateway),
                        Arc::clone(&self.prefs),
                        current,
                    )
                    .boxed()
                    .shared();
                    *slot = Some(flight.clone());
                    flight
                }
            }
        };

        let outcome = flight.clone().await;

        let mut slot = self.in_flight.lock().await;
        if slot.as_ref().is_some_and(|f| f.ptr_eq(&flight)) {
            *slot = None;
        }

        outcome
    }

    /// Whether a reissue is currently running.
    pub async fn is_refreshing(&self) -> bool {
        self.in_flight.lock().await.is_some()
    }
}

async fn reissue(
    gateway: Arc<dyn AuthGateway>,
    prefs: Arc<PreferenceStore>,
    current: TokenPair,
) -> Option<TokenPair> {
    let client_id = match prefs.installation_id() {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!("Failed to read installation id: {}", e);
            String::new()
        }
    };

    let request = ReissueRequest {
        tokens: current,
        client_id,
        mobile_type: MOBILE_TYPE.to_string(),
    };

    match gateway.reissue_token(request).await {
        Ok(tokens) => {
            if let Err(e) = prefs.save_token_pair(&tokens) {
                tracing::warn!("Failed to persist reissued tokens: {}", e);
            }
            tracing::info!("Access token reissued");
            Some(tokens)
        }
        Err(e) => {
            tracing::warn!("Token reissue failed: {}", e);
            None
        }
    }
}
