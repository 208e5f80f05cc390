//! Progress coordination
//!
//! Produces a single authoritative snapshot per read and fans writes out to
//! both stores. Reconciliation is remote-preferred with local fallback, not
//! a merge: the remote copy is the cross-device canonical record, the local
//! copy is a cache plus offline fallback. A reachable, non-empty remote
//! always wins on read and is cached locally ("cache-fill"); in every other
//! case the local copy is served. Writes land locally first and must
//! succeed before the remote fan-out, which is a soft failure path.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::identity::{IdentityResolver, SessionMode};
use crate::record::{ProgressKind, ProgressRecord};
use crate::store::local::LocalStore;
use crate::store::remote::RemoteBackend;
use crate::types::Result;

pub struct ProgressCoordinator {
    local: Arc<LocalStore>,
    remote: Option<Arc<dyn RemoteBackend>>,
    resolver: Arc<IdentityResolver>,
    /// Serializes in-process read-modify-write cycles so rapid toggles from
    /// one UI cannot clobber each other. Cross-process writes stay
    /// last-write-wins.
    toggle_lock: Mutex<()>,
}

impl ProgressCoordinator {
    pub fn new(
        local: Arc<LocalStore>,
        remote: Option<Arc<dyn RemoteBackend>>,
        resolver: Arc<IdentityResolver>,
    ) -> Self {
        Self {
            local,
            remote,
            resolver,
            toggle_lock: Mutex::new(()),
        }
    }

    /// The remote capability participates only for delegated sessions.
    fn active_remote(&self) -> Result<Option<&Arc<dyn RemoteBackend>>> {
        let delegated = matches!(
            self.resolver.current()?,
            Some(identity) if identity.mode == SessionMode::Delegated
        );
        Ok(if delegated { self.remote.as_ref() } else { None })
    }

    /// Read the authoritative progress snapshot for an identifier.
    ///
    /// With a delegated session and a configured remote, a reachable
    /// non-empty remote record wins: it is cached into the local store and
    /// returned. Demo mode, an unconfigured remote, an empty remote, or a
    /// remote failure all serve the normalized local copy; the failure is
    /// logged, never raised.
    pub async fn read(&self, identifier: &str) -> Result<ProgressRecord> {
        if let Some(remote) = self.active_remote()? {
            match remote.fetch_progress(identifier).await {
                Ok(Some(record)) => {
                    // Cache-fill so a later offline read serves this copy.
                    self.local.write_progress(identifier, &record)?;
                    debug!(identifier, "Serving remote progress (cached locally)");
                    return Ok(record);
                }
                Ok(None) => {
                    debug!(identifier, "No remote progress record, serving local");
                }
                Err(e) => {
                    warn!(identifier, error = %e, "Remote read failed, falling back to local");
                }
            }
        }
        self.local.read_progress(identifier)
    }

    /// Persist a progress record: normalize, stamp, write locally (must
    /// succeed), then fan out to the remote for delegated sessions. A
    /// remote failure is soft; the local write is already the source of
    /// truth until the remote catches up.
    pub async fn write(&self, identifier: &str, mut record: ProgressRecord) -> Result<ProgressRecord> {
        // The type already carries the canonical three-field shape; the
        // normalize step at write time reduces to stamping the clock.
        record.touch();

        self.local.write_progress(identifier, &record)?;

        if let Some(remote) = self.active_remote()? {
            if let Err(e) = remote.store_progress(identifier, &record).await {
                warn!(identifier, error = %e, "Remote write failed, local copy is authoritative");
            }
        }

        Ok(record)
    }

    /// Read-modify-write convenience for one completion flag. Returns the
    /// record as persisted.
    pub async fn toggle(
        &self,
        identifier: &str,
        kind: ProgressKind,
        id: &str,
        value: bool,
    ) -> Result<ProgressRecord> {
        let _guard = self.toggle_lock.lock().await;
        let mut record = self.read(identifier).await?;
        record.set(kind, id, value);
        self.write(identifier, record).await
    }
}
