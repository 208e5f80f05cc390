//! Local store
//!
//! Durable key/value persistence scoped to this profile: one session row
//! and one JSON progress payload per derived storage key, backed by sqlite.
//! Malformed persisted payloads are treated as absent, never as errors.
//!
//! Session writes broadcast a [`SessionChange`] so the UI layer can refresh
//! badges without polling.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::identity::Identity;
use crate::keys::derive_storage_key;
use crate::record::ProgressRecord;
use crate::types::Result;

/// Notification sent to UI subscribers whenever the session record changes.
#[derive(Debug, Clone)]
pub struct SessionChange {
    /// The session after the change; `None` on sign-out.
    pub identity: Option<Identity>,
}

/// Sqlite-backed local store.
pub struct LocalStore {
    db: Mutex<Connection>,
    sessions_tx: broadcast::Sender<SessionChange>,
}

impl LocalStore {
    /// Open or create the store under the given data directory.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join("lamad.db");
        let db = Connection::open(&db_path)?;

        // WAL so a second tab reading the same profile does not block
        db.execute_batch("PRAGMA journal_mode=WAL;")?;

        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS session (
                id INTEGER PRIMARY KEY CHECK (id = 0),
                payload TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS progress (
                storage_key TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            );",
        )?;

        let (sessions_tx, _) = broadcast::channel(16);

        info!(path = %db_path.display(), "Local store opened");

        Ok(Self {
            db: Mutex::new(db),
            sessions_tx,
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A poisoned lock only means another caller panicked mid-statement;
        // the connection itself is still usable.
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Subscribe to session-change notifications.
    pub fn subscribe_sessions(&self) -> broadcast::Receiver<SessionChange> {
        self.sessions_tx.subscribe()
    }

    fn notify(&self, identity: Option<Identity>) {
        // No receivers is fine; the notification is best-effort UI refresh.
        let _ = self.sessions_tx.send(SessionChange { identity });
    }

    /// Read the persisted session, or `None` if absent or unparsable.
    pub fn read_session(&self) -> Result<Option<Identity>> {
        let payload: Option<String> = self
            .conn()
            .query_row("SELECT payload FROM session WHERE id = 0", [], |row| {
                row.get(0)
            })
            .optional()?;

        Ok(payload.and_then(|text| match serde_json::from_str(&text) {
            Ok(identity) => Some(identity),
            Err(e) => {
                warn!(error = %e, "Discarding unparsable session payload");
                None
            }
        }))
    }

    /// Persist the session record and notify subscribers.
    pub fn write_session(&self, identity: &Identity) -> Result<()> {
        let payload = serde_json::to_string(identity)?;
        self.conn().execute(
            "INSERT INTO session (id, payload) VALUES (0, ?1)
             ON CONFLICT(id) DO UPDATE SET payload = ?1",
            params![payload],
        )?;
        debug!(identifier = %identity.identifier, mode = ?identity.mode, "Session written");
        self.notify(Some(identity.clone()));
        Ok(())
    }

    /// Remove the persisted session and notify subscribers.
    pub fn clear_session(&self) -> Result<()> {
        self.conn().execute("DELETE FROM session WHERE id = 0", [])?;
        debug!("Session cleared");
        self.notify(None);
        Ok(())
    }

    /// Read the progress record for an identifier. Absent or unparsable
    /// payloads come back as a normalized empty record.
    pub fn read_progress(&self, identifier: &str) -> Result<ProgressRecord> {
        let key = derive_storage_key(Some(identifier));
        let payload: Option<String> = self
            .conn()
            .query_row(
                "SELECT payload FROM progress WHERE storage_key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        Ok(ProgressRecord::decode(payload.as_deref()))
    }

    /// Upsert the progress record for an identifier.
    pub fn write_progress(&self, identifier: &str, record: &ProgressRecord) -> Result<()> {
        let key = derive_storage_key(Some(identifier));
        let payload = serde_json::to_string(record)?;
        self.conn().execute(
            "INSERT INTO progress (storage_key, payload, updated_at)
             VALUES (?1, ?2, strftime('%s', 'now'))
             ON CONFLICT(storage_key) DO UPDATE SET payload = ?2, updated_at = strftime('%s', 'now')",
            params![key, payload],
        )?;
        debug!(key = %key, "Progress written");
        Ok(())
    }
}
