use async_trait::async_trait;
use std::time::Duration;

use crate::CoreResult;

/// Result of an attempt to create a lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired,
    /// The lease key already exists, whoever holds it.
    AlreadyHeld,
    /// The blocking key (a booked marker) exists.
    Blocked,
}

/// Shared key-value store with the atomic primitives seat leasing relies on.
///
/// Every method is a single atomic step against the store. Implementations
/// choose their own mechanism (server-side script, transaction, a lock around
/// an in-memory map); callers only rely on the contract.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Create `key = holder` expiring after `ttl`, only if neither `key` nor
    /// `blocker` exists.
    async fn acquire(&self, key: &str, blocker: &str, holder: &str, ttl: Duration) -> CoreResult<AcquireOutcome>;

    /// Delete `key` only if its current value equals `holder`.
    async fn release_if_holder(&self, key: &str, holder: &str) -> CoreResult<bool>;

    /// Write `marker = holder` without expiry and delete `lease`, as one step.
    /// The marker write is unconditional.
    async fn convert(&self, lease: &str, marker: &str, holder: &str) -> CoreResult<()>;

    async fn get(&self, key: &str) -> CoreResult<Option<String>>;

    async fn exists(&self, key: &str) -> CoreResult<bool>;

    /// Remaining lifetime; `None` when the key is missing or never expires.
    async fn remaining_ttl(&self, key: &str) -> CoreResult<Option<Duration>>;

    /// Fresh listing of live keys starting with `prefix`.
    async fn scan_prefix(&self, prefix: &str) -> CoreResult<Vec<String>>;

    async fn put_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CoreResult<()>;

    /// Read and delete `key`. Of two concurrent callers at most one sees the value.
    async fn take(&self, key: &str) -> CoreResult<Option<String>>;
}
