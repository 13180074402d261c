use async_trait::async_trait;
use futures_util::StreamExt;
use marquee_core::events::SeatBroadcaster;
use marquee_core::lease::{AcquireOutcome, LeaseStore};
use marquee_core::{CoreError, CoreResult};
use marquee_shared::SeatUpdate;
use redis::AsyncCommands;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

pub const SEAT_CHANNEL_PATTERN: &str = "seats:show:*";

pub fn seat_channel(show_id: i64) -> String {
    format!("seats:show:{}", show_id)
}

fn store_err(err: redis::RedisError) -> CoreError {
    CoreError::StoreError(err.to_string())
}

fn millis(ttl: Duration) -> u64 {
    // PX rejects 0
    (ttl.as_millis() as u64).max(1)
}

/// Lease store backed by Redis. Compound steps run as Lua scripts so they are
/// atomic on the server; hold and booked keys for a seat must live on the same
/// node (no cluster slot splitting).
#[derive(Clone)]
pub struct RedisLeaseStore {
    client: redis::Client,
    acquire_script: redis::Script,
    release_script: redis::Script,
    convert_script: redis::Script,
}

impl RedisLeaseStore {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;

        // KEYS[1] lease, KEYS[2] blocker. -1 blocked, 0 held, 1 acquired.
        let acquire_script = redis::Script::new(r#"
            if redis.call("EXISTS", KEYS[2]) == 1 then
                return -1
            end
            if redis.call("SET", KEYS[1], ARGV[1], "NX", "PX", ARGV[2]) then
                return 1
            end
            return 0
        "#);

        let release_script = redis::Script::new(r#"
            if redis.call("GET", KEYS[1]) == ARGV[1] then
                return redis.call("DEL", KEYS[1])
            end
            return 0
        "#);

        // KEYS[1] lease, KEYS[2] marker
        let convert_script = redis::Script::new(r#"
            redis.call("SET", KEYS[2], ARGV[1])
            redis.call("DEL", KEYS[1])
            return 1
        "#);

        Ok(Self { client, acquire_script, release_script, convert_script })
    }

    pub fn client(&self) -> &redis::Client {
        &self.client
    }

    async fn connection(&self) -> CoreResult<redis::aio::MultiplexedConnection> {
        self.client.get_multiplexed_async_connection().await.map_err(store_err)
    }
}

#[async_trait]
impl LeaseStore for RedisLeaseStore {
    async fn acquire(&self, key: &str, blocker: &str, holder: &str, ttl: Duration) -> CoreResult<AcquireOutcome> {
        let mut conn = self.connection().await?;
        let result: i64 = self.acquire_script
            .key(key)
            .key(blocker)
            .arg(holder)
            .arg(millis(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(store_err)?;

        Ok(match result {
            1 => AcquireOutcome::Acquired,
            -1 => AcquireOutcome::Blocked,
            _ => AcquireOutcome::AlreadyHeld,
        })
    }

    async fn release_if_holder(&self, key: &str, holder: &str) -> CoreResult<bool> {
        let mut conn = self.connection().await?;
        let deleted: i64 = self.release_script
            .key(key)
            .arg(holder)
            .invoke_async(&mut conn)
            .await
            .map_err(store_err)?;
        Ok(deleted == 1)
    }

    async fn convert(&self, lease: &str, marker: &str, holder: &str) -> CoreResult<()> {
        let mut conn = self.connection().await?;
        let _: i64 = self.convert_script
            .key(lease)
            .key(marker)
            .arg(holder)
            .invoke_async(&mut conn)
            .await
            .map_err(store_err)?;
        debug!("Converted {} -> {} for {}", lease, marker, holder);
        Ok(())
    }

    async fn get(&self, key: &str) -> CoreResult<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(key).await.map_err(store_err)?;
        Ok(value)
    }

    async fn exists(&self, key: &str) -> CoreResult<bool> {
        let mut conn = self.connection().await?;
        let count: i64 = redis::cmd("EXISTS")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(store_err)?;
        Ok(count > 0)
    }

    async fn remaining_ttl(&self, key: &str) -> CoreResult<Option<Duration>> {
        let mut conn = self.connection().await?;
        // -2 missing, -1 no expiry
        let ms: i64 = redis::cmd("PTTL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(store_err)?;
        Ok((ms >= 0).then(|| Duration::from_millis(ms as u64)))
    }

    async fn scan_prefix(&self, prefix: &str) -> CoreResult<Vec<String>> {
        let mut conn = self.connection().await?;
        let pattern = format!("{}*", prefix);
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(200)
                .query_async(&mut conn)
                .await
                .map_err(store_err)?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn put_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CoreResult<()> {
        let mut conn = self.connection().await?;
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn take(&self, key: &str) -> CoreResult<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = redis::cmd("GETDEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(store_err)?;
        Ok(value)
    }
}

/// Publishes seat updates on a per-show Redis channel so every API process
/// can forward them to its own SSE subscribers.
#[derive(Clone)]
pub struct RedisBroadcaster {
    client: redis::Client,
}

impl RedisBroadcaster {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    async fn send(client: &redis::Client, channel: String, payload: String) -> redis::RedisResult<i64> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        conn.publish(channel, payload).await
    }

    /// Forward every update published by any process into `tx`.
    /// Returns only when the subscription breaks.
    pub async fn relay_into(&self, tx: broadcast::Sender<SeatUpdate>) -> redis::RedisResult<()> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.psubscribe(SEAT_CHANNEL_PATTERN).await?;
        info!("Subscribed to {}", SEAT_CHANNEL_PATTERN);

        let mut messages = pubsub.on_message();
        while let Some(msg) = messages.next().await {
            let payload: String = match msg.get_payload() {
                Ok(p) => p,
                Err(e) => {
                    warn!("Unreadable seat update on {}: {}", msg.get_channel_name(), e);
                    continue;
                }
            };
            match serde_json::from_str::<SeatUpdate>(&payload) {
                // No local subscribers is not an error
                Ok(update) => {
                    let _ = tx.send(update);
                }
                Err(e) => warn!("Malformed seat update on {}: {}", msg.get_channel_name(), e),
            }
        }

        Ok(())
    }
}

impl SeatBroadcaster for RedisBroadcaster {
    fn publish(&self, update: SeatUpdate) {
        let payload = match serde_json::to_string(&update) {
            Ok(p) => p,
            Err(e) => {
                error!("Failed to encode seat update for show {}: {}", update.show_id, e);
                return;
            }
        };

        let client = self.client.clone();
        tokio::spawn(async move {
            match RedisBroadcaster::send(&client, seat_channel(update.show_id), payload).await {
                Ok(receivers) => debug!(
                    "Seat update {} for show {} reached {} relays",
                    update.status.as_str(), update.show_id, receivers
                ),
                Err(e) => error!(
                    "Failed to broadcast {} for show {} seats {:?}: {}",
                    update.status.as_str(), update.show_id, update.seat_numbers, e
                ),
            }
        });
    }
}
