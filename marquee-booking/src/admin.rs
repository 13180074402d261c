use marquee_core::booking::Booking;
use marquee_core::repository::BookingRepository;
use marquee_core::{CoreError, CoreResult};
use std::sync::Arc;
use tracing::info;

/// Administrative booking status changes.
///
/// Cancelling does not touch booked markers; a cancelled seat stays BOOKED
/// in the lease store.
pub struct BookingAdmin {
    bookings: Arc<dyn BookingRepository>,
}

impl BookingAdmin {
    pub fn new(bookings: Arc<dyn BookingRepository>) -> Self {
        Self { bookings }
    }

    pub async fn get(&self, id: i64) -> CoreResult<Booking> {
        self.bookings.get_booking(id).await?
            .ok_or_else(|| CoreError::not_found("booking", id))
    }

    /// Lookup by the order id handed out at payment creation.
    pub async fn get_by_order(&self, order_id: &str) -> CoreResult<Booking> {
        self.bookings.find_by_order_id(order_id).await?
            .ok_or_else(|| CoreError::not_found("booking", order_id))
    }

    /// Transition: PENDING/CONFIRMED → CANCELLED
    pub async fn cancel(&self, id: i64) -> CoreResult<Booking> {
        let mut booking = self.get(id).await?;
        booking.cancel()?;
        self.bookings.update_booking_status(id, booking.status).await?;
        info!("Booking {} (order {}) cancelled", id, booking.order_id);
        Ok(booking)
    }

    /// Transition: PENDING/CANCELLED → CONFIRMED
    pub async fn confirm(&self, id: i64) -> CoreResult<Booking> {
        let mut booking = self.get(id).await?;
        booking.confirm()?;
        self.bookings.update_booking_status(id, booking.status).await?;
        info!("Booking {} (order {}) confirmed", id, booking.order_id);
        Ok(booking)
    }
}
