use marquee_core::events::SeatBroadcaster;
use marquee_shared::SeatUpdate;
use tokio::sync::broadcast;
use tracing::debug;

/// In-process fan-out of seat updates, feeding SSE subscribers.
///
/// Slow subscribers lag and lose messages rather than blocking publishers.
#[derive(Clone)]
pub struct ChannelBroadcaster {
    tx: broadcast::Sender<SeatUpdate>,
}

impl ChannelBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn from_sender(tx: broadcast::Sender<SeatUpdate>) -> Self {
        Self { tx }
    }

    pub fn sender(&self) -> broadcast::Sender<SeatUpdate> {
        self.tx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SeatUpdate> {
        self.tx.subscribe()
    }
}

impl SeatBroadcaster for ChannelBroadcaster {
    fn publish(&self, update: SeatUpdate) {
        let show_id = update.show_id;
        if self.tx.send(update).is_err() {
            debug!("No subscribers for show {}", show_id);
        }
    }
}
