//! Change detection: when does a resource type need a sync.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// SHA-256 of the empty string; the hash of an empty document set.
pub const EMPTY_HASH: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

pub const REASON_DATA_CHANGED: &str = "data changed";
pub const REASON_INTERVAL_NOT_ELAPSED: &str = "sync interval not elapsed";
pub const REASON_INTERVAL_ELAPSED: &str = "sync interval elapsed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncDecision {
    pub should_sync: bool,
    pub reason: &'static str,
    /// How long until this type should be looked at again.
    pub requeue_after: Duration,
}

/// Stable hash of a document set: `key=value` lines sorted by key, joined
/// with `\n`, SHA-256, lowercase hex.
pub fn compute_hash(documents: &BTreeMap<String, String>) -> String {
    if documents.is_empty() {
        return EMPTY_HASH.to_string();
    }

    let mut hasher = Sha256::new();
    for (i, (key, value)) in documents.iter().enumerate() {
        if i > 0 {
            hasher.update(b"\n");
        }
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// [`decide_at`] against the current time.
pub fn decide(
    last_synced_at: Option<DateTime<Utc>>,
    interval: Duration,
    current_hash: &str,
    previous_hash: &str,
) -> SyncDecision {
    decide_at(Utc::now(), last_synced_at, interval, current_hash, previous_hash)
}

/// Changed data always syncs. Unchanged data syncs once `interval` has passed
/// since the last sync, or when there never was one.
pub fn decide_at(
    now: DateTime<Utc>,
    last_synced_at: Option<DateTime<Utc>>,
    interval: Duration,
    current_hash: &str,
    previous_hash: &str,
) -> SyncDecision {
    if current_hash != previous_hash {
        return SyncDecision {
            should_sync: true,
            reason: REASON_DATA_CHANGED,
            requeue_after: interval,
        };
    }

    if let Some(last) = last_synced_at {
        // A clock that moved backwards counts as no time elapsed.
        let since = (now - last).to_std().unwrap_or(Duration::ZERO);
        if since < interval {
            return SyncDecision {
                should_sync: false,
                reason: REASON_INTERVAL_NOT_ELAPSED,
                requeue_after: interval - since,
            };
        }
    }

    SyncDecision {
        should_sync: true,
        reason: REASON_INTERVAL_ELAPSED,
        requeue_after: interval,
    }
}
