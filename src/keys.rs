//! Storage key derivation
//!
//! Maps a user identifier (normally an email) to the key both stores file
//! progress under.

/// Fallback key for absent or empty identifiers.
pub const GUEST_KEY: &str = "guest";

/// Derive the storage key for an identifier.
///
/// Total and deterministic: lowercases the identifier and replaces every
/// character outside `[a-z0-9]` with `_`. Distinct identifiers may collide
/// ("a@x.com" and "a.x.com" map to the same key); acceptable at this
/// system's trust level.
pub fn derive_storage_key(identifier: Option<&str>) -> String {
    match identifier {
        Some(id) if !id.is_empty() => id
            .to_lowercase()
            .chars()
            .map(|c| {
                if c.is_ascii_lowercase() || c.is_ascii_digit() {
                    c
                } else {
                    '_'
                }
            })
            .collect(),
        _ => GUEST_KEY.to_string(),
    }
}
