//! Remote store
//!
//! Optional capability behind the network boundary: delegated sign-in, one
//! progress record per user, and the identity-change watch. The capability
//! is absent entirely when no backend URL is configured; every remote code
//! path is gated on its presence rather than a runtime flag.
//!
//! Transport failures map to `RemoteUnavailable`, which progress callers
//! always treat as a soft failure.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::identity::{Identity, IdentityResolver, SessionMode};
use crate::keys::derive_storage_key;
use crate::record::ProgressRecord;
use crate::types::{LamadError, Result};

/// Contract with the remote backend. Production uses [`HttpRemote`]; tests
/// substitute an in-memory implementation.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Sign in an existing principal. `Auth` when the backend rejects the
    /// credentials, `RemoteUnavailable` on transport failure.
    async fn sign_in(&self, identifier: &str, secret: &str) -> Result<Identity>;

    /// Create and sign in a new principal.
    async fn sign_up(&self, identifier: &str, secret: &str) -> Result<Identity>;

    /// End the backend session.
    async fn sign_out(&self) -> Result<()>;

    /// The backend's current notion of the signed-in principal. Basis of
    /// the identity watch.
    async fn current_principal(&self) -> Result<Option<String>>;

    /// Fetch the progress record for an identifier, `None` when the backend
    /// holds no record.
    async fn fetch_progress(&self, identifier: &str) -> Result<Option<ProgressRecord>>;

    /// Upsert the progress record for an identifier. Field-level merge with
    /// any existing record is the backend's concern.
    async fn store_progress(&self, identifier: &str, record: &ProgressRecord) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct CredentialRequest<'a> {
    identifier: &'a str,
    secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    identifier: String,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    principal: Option<String>,
}

/// HTTP implementation of [`RemoteBackend`].
pub struct HttpRemote {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRemote {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn auth_url(&self, action: &str) -> String {
        format!("{}/auth/{}", self.base_url, action)
    }

    fn progress_url(&self, identifier: &str) -> String {
        format!(
            "{}/progress/{}",
            self.base_url,
            derive_storage_key(Some(identifier))
        )
    }

    async fn credential_call(&self, action: &str, identifier: &str, secret: &str) -> Result<Identity> {
        let response = self
            .client
            .post(self.auth_url(action))
            .json(&CredentialRequest { identifier, secret })
            .send()
            .await
            .map_err(transport)?;

        match response.status() {
            status if status.is_success() => {
                let body: AuthResponse = response.json().await.map_err(transport)?;
                Ok(Identity {
                    identifier: body.identifier,
                    mode: SessionMode::Delegated,
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::CONFLICT => {
                Err(LamadError::Auth(format!("{action} rejected by provider")))
            }
            status => Err(LamadError::RemoteUnavailable(format!(
                "HTTP {status} from {action}"
            ))),
        }
    }
}

#[async_trait]
impl RemoteBackend for HttpRemote {
    async fn sign_in(&self, identifier: &str, secret: &str) -> Result<Identity> {
        self.credential_call("login", identifier, secret).await
    }

    async fn sign_up(&self, identifier: &str, secret: &str) -> Result<Identity> {
        self.credential_call("register", identifier, secret).await
    }

    async fn sign_out(&self) -> Result<()> {
        let response = self
            .client
            .post(self.auth_url("logout"))
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(LamadError::RemoteUnavailable(format!(
                "HTTP {} from logout",
                response.status()
            )));
        }
        Ok(())
    }

    async fn current_principal(&self) -> Result<Option<String>> {
        let response = self
            .client
            .get(self.auth_url("session"))
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(LamadError::RemoteUnavailable(format!(
                "HTTP {} from session",
                response.status()
            )));
        }
        let body: SessionResponse = response.json().await.map_err(transport)?;
        Ok(body.principal)
    }

    async fn fetch_progress(&self, identifier: &str) -> Result<Option<ProgressRecord>> {
        let url = self.progress_url(identifier);
        let response = self.client.get(&url).send().await.map_err(transport)?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let value: serde_json::Value = response.json().await.map_err(transport)?;
                Ok(Some(ProgressRecord::normalize(&value)))
            }
            status => Err(LamadError::RemoteUnavailable(format!(
                "HTTP {status} fetching progress"
            ))),
        }
    }

    async fn store_progress(&self, identifier: &str, record: &ProgressRecord) -> Result<()> {
        let url = self.progress_url(identifier);
        let response = self
            .client
            .patch(&url)
            .json(record)
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(LamadError::RemoteUnavailable(format!(
                "HTTP {} storing progress",
                response.status()
            )));
        }
        debug!(url = %url, "Progress stored remotely");
        Ok(())
    }
}

fn transport(e: reqwest::Error) -> LamadError {
    LamadError::RemoteUnavailable(e.to_string())
}

/// Cancellable handle for the identity watch. Aborts the task on `stop()`
/// or drop.
pub struct IdentityWatch {
    handle: JoinHandle<()>,
}

impl IdentityWatch {
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for IdentityWatch {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Spawn the identity watch: poll the backend's signed-in principal and
/// apply each observed change to the resolver.
///
/// Application is idempotent, so duplicate or re-ordered deliveries across
/// reconnects are harmless. Poll failures are logged and skipped; the next
/// tick retries.
pub fn spawn_identity_watch(
    resolver: Arc<IdentityResolver>,
    remote: Arc<dyn RemoteBackend>,
    poll_interval: Duration,
) -> IdentityWatch {
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        let mut last_seen: Option<Option<String>> = None;

        loop {
            ticker.tick().await;
            match remote.current_principal().await {
                Ok(principal) => {
                    if last_seen.as_ref() == Some(&principal) {
                        continue;
                    }
                    debug!(principal = ?principal, "Remote principal changed");
                    if let Err(e) = resolver.apply_remote_principal(principal.as_deref()) {
                        warn!(error = %e, "Failed to apply remote identity change");
                        continue;
                    }
                    last_seen = Some(principal);
                }
                Err(e) => debug!(error = %e, "Identity poll failed"),
            }
        }
    });

    info!(
        interval_secs = poll_interval.as_secs(),
        "Identity watch started"
    );
    IdentityWatch { handle }
}
