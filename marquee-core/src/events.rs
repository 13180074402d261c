use async_trait::async_trait;
use marquee_shared::{BookingConfirmedEvent, SeatUpdate};

use crate::CoreResult;

/// Fan-out of seat state changes to viewers of a show.
///
/// Fire-and-forget: implementations never block the caller and swallow
/// (log) transport failures.
pub trait SeatBroadcaster: Send + Sync {
    fn publish(&self, update: SeatUpdate);
}

/// At-least-once publication of committed bookings for downstream consumers.
#[async_trait]
pub trait BookingEventPublisher: Send + Sync {
    async fn publish_booking_confirmed(&self, event: &BookingConfirmedEvent) -> CoreResult<()>;
}
