//! The key-value interface the record store is written against.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

/// Hashes, append-only lists, per-key TTL and key scans.
///
/// Semantics follow the usual key-value store conventions: `expire` on a
/// missing key is a no-op and expired keys behave exactly like missing
/// ones. Writes take an optional TTL that is applied together with the
/// write; `None` creates a missing key without expiry and keeps the TTL
/// of an existing one.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Set (or overwrite) the given fields of a hash.
    async fn hash_set(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Option<Duration>,
    ) -> Result<(), StoreError>;

    /// All fields of a hash; empty when the key is missing.
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    /// Append a value to the end of a list.
    async fn list_push(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// The whole list, oldest first; empty when the key is missing.
    async fn list_range(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// (Re)set the time-to-live of an existing key.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Remove a key. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Keys matching a glob pattern (`*` and `?`), sorted.
    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// Cheap liveness probe.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Physically remove expired keys. Returns how many were removed.
    async fn purge_expired(&self) -> Result<u64, StoreError> {
        Ok(0)
    }
}

/// Match `text` against a glob where `*` is any run of characters and
/// `?` is exactly one character.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if let Some((star, mark)) = backtrack {
            pi = star + 1;
            ti = mark + 1;
            backtrack = Some((star, mark + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|&c| c == '*')
}

/// Translate a glob into a SQL `LIKE` pattern using `\` as escape.
pub fn glob_to_like(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        match c {
            '*' => out.push('%'),
            '?' => out.push('_'),
            '%' | '_' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            other => out.push(other),
        }
    }
    out
}
