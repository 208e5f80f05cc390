//! Identity resolution
//!
//! Owns the session record and its mode transitions. Demo sessions are
//! established locally from user-supplied text. Delegated sessions are only
//! ever written in response to the remote identity watch, so local belief
//! never runs ahead of remote truth; the same transition logic applies no
//! matter how many times or in what order notifications arrive.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::store::local::LocalStore;
use crate::store::remote::RemoteBackend;
use crate::types::{LamadError, Result};

/// How the current session was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// User-supplied text, no external verification, local browser only.
    Demo,
    /// Confirmed by the external identity provider.
    Delegated,
}

/// The active user identity. At most one per profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub identifier: String,
    pub mode: SessionMode,
}

/// Session state machine over `{signed out, demo, delegated}`.
pub struct IdentityResolver {
    local: Arc<LocalStore>,
    remote: Option<Arc<dyn RemoteBackend>>,
}

impl IdentityResolver {
    pub fn new(local: Arc<LocalStore>, remote: Option<Arc<dyn RemoteBackend>>) -> Self {
        Self { local, remote }
    }

    /// The current identity, read from the persisted session each call so
    /// resolver state is always consistent with the last write.
    pub fn current(&self) -> Result<Option<Identity>> {
        self.local.read_session()
    }

    /// Establish a demo session from user-supplied text.
    pub fn login_demo(&self, identifier: &str) -> Result<Identity> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(LamadError::Validation(
                "Enter an email to continue.".to_string(),
            ));
        }

        let identity = Identity {
            identifier: identifier.to_string(),
            mode: SessionMode::Demo,
        };
        self.local.write_session(&identity)?;
        info!(identifier = %identity.identifier, "Demo session established");
        Ok(identity)
    }

    /// Ask the remote backend to sign in. The delegated session itself is
    /// written only when the identity watch reports the new principal.
    pub async fn sign_in(&self, identifier: &str, secret: &str) -> Result<()> {
        let remote = self.require_remote()?;
        Self::require_credentials(identifier, secret)?;
        remote.sign_in(identifier.trim(), secret).await?;
        debug!(identifier = identifier.trim(), "Remote sign-in accepted");
        Ok(())
    }

    /// Ask the remote backend to create an account and sign in.
    pub async fn sign_up(&self, identifier: &str, secret: &str) -> Result<()> {
        let remote = self.require_remote()?;
        Self::require_credentials(identifier, secret)?;
        remote.sign_up(identifier.trim(), secret).await?;
        debug!(identifier = identifier.trim(), "Remote sign-up accepted");
        Ok(())
    }

    /// Apply the backend's current notion of the signed-in principal.
    ///
    /// Idempotent: re-delivery or reordering across reconnects is safe.
    /// A reported principal overwrites whatever session is present; a
    /// reported sign-out clears only delegated sessions, so demo sessions
    /// are never affected by remote notifications.
    pub fn apply_remote_principal(&self, principal: Option<&str>) -> Result<()> {
        match principal {
            Some(identifier) => {
                let identity = Identity {
                    identifier: identifier.to_string(),
                    mode: SessionMode::Delegated,
                };
                if self.current()?.as_ref() == Some(&identity) {
                    return Ok(());
                }
                info!(identifier = %identity.identifier, "Delegated session established");
                self.local.write_session(&identity)
            }
            None => match self.current()? {
                Some(Identity {
                    mode: SessionMode::Delegated,
                    identifier,
                }) => {
                    info!(identifier = %identifier, "Remote reported sign-out, clearing session");
                    self.local.clear_session()
                }
                _ => Ok(()),
            },
        }
    }

    /// Explicit logout. Delegated sessions also sign out remotely; a remote
    /// failure there is logged and the local session is cleared regardless,
    /// so the user is never stuck signed-in locally.
    pub async fn logout(&self) -> Result<()> {
        match self.current()? {
            None => Ok(()),
            Some(Identity {
                mode: SessionMode::Demo,
                ..
            }) => self.local.clear_session(),
            Some(Identity {
                mode: SessionMode::Delegated,
                ..
            }) => {
                if let Some(remote) = &self.remote {
                    if let Err(e) = remote.sign_out().await {
                        warn!(error = %e, "Remote sign-out failed, clearing local session anyway");
                    }
                }
                self.local.clear_session()
            }
        }
    }

    fn require_remote(&self) -> Result<&Arc<dyn RemoteBackend>> {
        self.remote.as_ref().ok_or_else(|| {
            LamadError::Auth("remote backend not configured".to_string())
        })
    }

    fn require_credentials(identifier: &str, secret: &str) -> Result<()> {
        if identifier.trim().is_empty() || secret.is_empty() {
            return Err(LamadError::Validation(
                "Email and password required.".to_string(),
            ));
        }
        Ok(())
    }
}
