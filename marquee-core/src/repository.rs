use async_trait::async_trait;

use crate::booking::{Booking, BookingStatus, NewBooking, ShowSummary, UserSummary};
use crate::CoreResult;

/// Read access to the relational catalog (shows and users).
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn find_show(&self, show_id: i64) -> CoreResult<Option<ShowSummary>>;

    async fn find_user(&self, user_id: &str) -> CoreResult<Option<UserSummary>>;
}

/// Durable booking records.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Insert the booking and its line items in one transaction.
    /// A second booking for the same order id fails with `AlreadyBooked`.
    async fn create_booking(&self, booking: &NewBooking) -> CoreResult<Booking>;

    async fn get_booking(&self, id: i64) -> CoreResult<Option<Booking>>;

    async fn find_by_order_id(&self, order_id: &str) -> CoreResult<Option<Booking>>;

    async fn update_booking_status(&self, id: i64, status: BookingStatus) -> CoreResult<()>;
}
