//! Dual-backend persistence
//!
//! `local` is always present and durable across page loads; `remote` is a
//! capability that exists only when a backend URL is configured.

pub mod local;
pub mod remote;

pub use local::{LocalStore, SessionChange};
pub use remote::{spawn_identity_watch, HttpRemote, IdentityWatch, RemoteBackend};
