//! Result caching: the store trait, per-request policy, and fingerprints.
//!
//! # Design
//! The client treats the store as a plain get/set map of opaque bytes and
//! never holds a lock across a read-then-write. Two clients missing the same
//! key at once will both call the transport and both write; the cache is an
//! optimization, not a single-flight guarantee.
//!
//! A cached entry is a `CachedTransfer`: the raw bytes plus the header size
//! and status the transport reported, so a hit decodes exactly like a live
//! transfer.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::options::RequestOptions;
use crate::transport::RawResponse;

/// Prefix of every computed cache key.
pub const CACHE_NAMESPACE: &str = "hop";

/// Duration used by `Client::cache` callers that have no preference.
pub const DEFAULT_CACHE_DURATION: Duration = Duration::from_secs(60);

/// Token that groups entries for invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheDependency(String);

impl CacheDependency {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CacheDependency {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for CacheDependency {
    fn from(token: String) -> Self {
        Self(token)
    }
}

/// A shared store for raw transfers.
pub trait ResultCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// A zero `duration` means the entry never expires.
    fn set(&self, key: &str, value: Vec<u8>, duration: Duration, dependency: Option<&CacheDependency>);
}

/// Per-request caching settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachePolicy {
    enabled: bool,
    duration: Duration,
    dependency: Option<CacheDependency>,
}

impl CachePolicy {
    pub fn enabled(duration: Duration, dependency: Option<CacheDependency>) -> Self {
        Self {
            enabled: true,
            duration,
            dependency,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn dependency(&self) -> Option<&CacheDependency> {
        self.dependency.as_ref()
    }

    /// Mutating requests are never read from or written to the cache, even
    /// when caching was asked for.
    pub fn applies_to(&self, options: &RequestOptions) -> bool {
        self.enabled && !options.is_mutating()
    }
}

/// `hop:<verb>:<sha256 of the canonical options>`.
pub fn fingerprint(options: &RequestOptions) -> String {
    let digest = Sha256::digest(options.serialize().as_bytes());
    format!(
        "{CACHE_NAMESPACE}:{}:{}",
        options.method().as_str().to_ascii_lowercase(),
        hex::encode(digest)
    )
}

/// What gets stored under a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CachedTransfer {
    status: u16,
    header_size: usize,
    bytes: Vec<u8>,
}

impl CachedTransfer {
    pub(crate) fn encode(raw: &RawResponse) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&CachedTransfer {
            status: raw.status,
            header_size: raw.header_size,
            bytes: raw.bytes.clone(),
        })
    }

    pub(crate) fn decode(bytes: &[u8]) -> serde_json::Result<RawResponse> {
        let cached: CachedTransfer = serde_json::from_slice(bytes)?;
        Ok(RawResponse {
            bytes: cached.bytes,
            status: cached.status,
            header_size: cached.header_size,
        })
    }
}

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
    dependency: Option<CacheDependency>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-process `ResultCache` with expiry and dependency invalidation.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry written with `dependency`. Returns how many went.
    pub fn invalidate(&self, dependency: &CacheDependency) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.dependency.as_ref() != Some(dependency));
        before - entries.len()
    }

    pub fn remove(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Live entries only.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock().values().filter(|entry| !entry.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ResultCache for MemoryCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut entries = self.lock();
        let entry = entries.get(key)?;
        if entry.is_expired(Instant::now()) {
            entries.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    fn set(&self, key: &str, value: Vec<u8>, duration: Duration, dependency: Option<&CacheDependency>) {
        let expires_at = (!duration.is_zero()).then(|| Instant::now() + duration);
        self.lock().insert(
            key.to_string(),
            Entry {
                value,
                expires_at,
                dependency: dependency.cloned(),
            },
        );
    }
}
