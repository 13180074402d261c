use marquee_booking::{BookingAdmin, PaymentOrchestrator, SeatLeaseManager};
use marquee_shared::SeatUpdate;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::middleware::resiliency::CircuitBreaker;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

pub struct Resiliency {
    pub payment_cb: CircuitBreaker,
}

#[derive(Clone)]
pub struct AppState {
    pub leases: Arc<SeatLeaseManager>,
    pub payments: Arc<PaymentOrchestrator>,
    pub admin: Arc<BookingAdmin>,
    /// Local fan-out feeding SSE subscribers.
    pub seat_tx: broadcast::Sender<SeatUpdate>,
    pub auth: AuthConfig,
    pub resiliency: Arc<Resiliency>,
}
