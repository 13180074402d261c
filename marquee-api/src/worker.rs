use marquee_shared::SeatUpdate;
use marquee_store::RedisBroadcaster;
use tokio::sync::broadcast;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Forward seat updates published by every API process (Redis pub/sub) into
/// this process's SSE channel. Reconnects with capped exponential backoff.
pub async fn start_seat_relay(relay: RedisBroadcaster, tx: broadcast::Sender<SeatUpdate>) {
    let mut backoff = INITIAL_BACKOFF;

    loop {
        info!("Seat relay connecting...");
        match relay.relay_into(tx.clone()).await {
            Ok(()) => {
                warn!("Seat relay subscription closed, reconnecting");
                backoff = INITIAL_BACKOFF;
            }
            Err(e) => {
                error!("Seat relay failed: {}. Retrying in {:?}", e, backoff);
            }
        }

        sleep(backoff).await;
        backoff = next_backoff(backoff);
    }
}

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}
