use async_trait::async_trait;
use marquee_core::lease::{AcquireOutcome, LeaseStore};
use marquee_core::CoreResult;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-process lease store for tests and single-node development.
///
/// One mutex serialises every operation, which gives the same atomicity the
/// Redis scripts give. Expiry follows the tokio clock so paused-time tests can
/// advance past a TTL without sleeping.
#[derive(Default)]
pub struct MemoryLeaseStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys, for assertions.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.lock().await.values().filter(|e| e.is_live(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn live<'a>(entries: &'a mut HashMap<String, Entry>, key: &str, now: Instant) -> Option<&'a Entry> {
    if entries.get(key).is_some_and(|e| !e.is_live(now)) {
        entries.remove(key);
    }
    entries.get(key)
}

#[async_trait]
impl LeaseStore for MemoryLeaseStore {
    async fn acquire(&self, key: &str, blocker: &str, holder: &str, ttl: Duration) -> CoreResult<AcquireOutcome> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        if live(&mut entries, blocker, now).is_some() {
            return Ok(AcquireOutcome::Blocked);
        }
        if live(&mut entries, key, now).is_some() {
            return Ok(AcquireOutcome::AlreadyHeld);
        }

        entries.insert(key.to_string(), Entry {
            value: holder.to_string(),
            expires_at: Some(now + ttl),
        });
        Ok(AcquireOutcome::Acquired)
    }

    async fn release_if_holder(&self, key: &str, holder: &str) -> CoreResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        match live(&mut entries, key, now) {
            Some(entry) if entry.value == holder => {
                entries.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn convert(&self, lease: &str, marker: &str, holder: &str) -> CoreResult<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(marker.to_string(), Entry {
            value: holder.to_string(),
            expires_at: None,
        });
        entries.remove(lease);
        Ok(())
    }

    async fn get(&self, key: &str) -> CoreResult<Option<String>> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        Ok(live(&mut entries, key, now).map(|e| e.value.clone()))
    }

    async fn exists(&self, key: &str) -> CoreResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        Ok(live(&mut entries, key, now).is_some())
    }

    async fn remaining_ttl(&self, key: &str) -> CoreResult<Option<Duration>> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        Ok(live(&mut entries, key, now)
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    async fn scan_prefix(&self, prefix: &str) -> CoreResult<Vec<String>> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, e| e.is_live(now));

        let mut keys: Vec<String> = entries.keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn put_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CoreResult<()> {
        let now = Instant::now();
        self.entries.lock().await.insert(key.to_string(), Entry {
            value: value.to_string(),
            expires_at: Some(now + ttl),
        });
        Ok(())
    }

    async fn take(&self, key: &str) -> CoreResult<Option<String>> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        Ok(entries.remove(key).filter(|e| e.is_live(now)).map(|e| e.value))
    }
}
