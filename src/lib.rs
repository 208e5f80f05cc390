//! lamad - progress tracking and identity core for the learning site
//!
//! Client-side controller core for a static educational site: it resolves
//! the current user identity (demo or delegated), keeps per-user
//! lesson/project completion records, and synchronizes them between a
//! durable local store and an optional remote backend.
//!
//! ## Components
//!
//! - **keys**: deterministic identifier-to-storage-key derivation
//! - **record**: the canonical progress record and shape normalization
//! - **store::local**: sqlite-backed persistence, always present
//! - **store::remote**: optional backend capability + identity watch
//! - **identity**: the session state machine (demo / delegated / signed out)
//! - **progress**: the consistency core, remote-preferred reads with
//!   cache-fill, local-first writes with soft remote fan-out

pub mod config;
pub mod identity;
pub mod keys;
pub mod progress;
pub mod record;
pub mod store;
pub mod types;

pub use config::Args;
pub use identity::{Identity, IdentityResolver, SessionMode};
pub use keys::derive_storage_key;
pub use progress::ProgressCoordinator;
pub use record::{CategoryProgress, CompletionSummary, ProgressKind, ProgressRecord};
pub use store::local::{LocalStore, SessionChange};
pub use store::remote::{spawn_identity_watch, HttpRemote, IdentityWatch, RemoteBackend};
pub use types::{LamadError, Result};
