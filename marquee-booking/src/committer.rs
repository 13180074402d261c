use chrono::Utc;
use marquee_core::booking::{Booking, BookingItem, BookingStatus, NewBooking, ShowSummary, UserSummary};
use marquee_core::events::{BookingEventPublisher, SeatBroadcaster};
use marquee_core::keys;
use marquee_core::lease::LeaseStore;
use marquee_core::payment::PaymentSettlement;
use marquee_core::repository::{BookingRepository, CatalogRepository};
use marquee_core::{CoreError, CoreResult};
use marquee_shared::{BookingConfirmedEvent, Masked, SeatInfo, SeatUpdate};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const MARKER_RETRY_BASE: Duration = Duration::from_millis(50);

/// Turns a settled payment into a durable booking and permanent seat markers.
pub struct BookingCommitter {
    store: Arc<dyn LeaseStore>,
    catalog: Arc<dyn CatalogRepository>,
    bookings: Arc<dyn BookingRepository>,
    broadcaster: Arc<dyn SeatBroadcaster>,
    publisher: Arc<dyn BookingEventPublisher>,
    marker_write_attempts: u32,
}

impl BookingCommitter {
    pub fn new(
        store: Arc<dyn LeaseStore>,
        catalog: Arc<dyn CatalogRepository>,
        bookings: Arc<dyn BookingRepository>,
        broadcaster: Arc<dyn SeatBroadcaster>,
        publisher: Arc<dyn BookingEventPublisher>,
    ) -> Self {
        Self {
            store,
            catalog,
            bookings,
            broadcaster,
            publisher,
            marker_write_attempts: 3,
        }
    }

    pub fn with_marker_write_attempts(mut self, attempts: u32) -> Self {
        self.marker_write_attempts = attempts.max(1);
        self
    }

    /// Once the booking row is stored this never fails: marker writes are
    /// retried and then logged for reconciliation, broadcast and event
    /// publication are best-effort.
    pub async fn commit(&self, settlement: &PaymentSettlement) -> CoreResult<Booking> {
        let show = self.catalog.find_show(settlement.show_id).await?
            .ok_or_else(|| CoreError::not_found("show", settlement.show_id))?;
        let user = self.catalog.find_user(&settlement.user_id).await?
            .ok_or_else(|| CoreError::not_found("user", &settlement.user_id))?;

        let new_booking = NewBooking {
            order_id: settlement.order_id.clone(),
            user_id: user.id.clone(),
            show_id: show.id,
            total_price: settlement.amount,
            payment_method: settlement.payment_method.as_str().to_string(),
            transaction_id: Some(settlement.transaction_id.clone()),
            status: BookingStatus::Confirmed,
            items: settlement.seat_numbers.iter()
                .map(|seat| BookingItem { seat_number: seat.clone(), price: show.price })
                .collect(),
        };
        let booking = self.bookings.create_booking(&new_booking).await?;
        info!("Booking {} stored for order {} ({} seats)", booking.id, booking.order_id, booking.items.len());

        for seat in &settlement.seat_numbers {
            self.write_marker(settlement.show_id, seat, &settlement.user_id, booking.id).await;
        }

        self.broadcaster.publish(SeatUpdate::booked(
            settlement.show_id,
            &settlement.user_id,
            settlement.seat_numbers.clone(),
        ));

        self.publish_confirmed(&booking, &show, &user, settlement);
        Ok(booking)
    }

    async fn write_marker(&self, show_id: i64, seat: &str, user_id: &str, booking_id: i64) {
        let lease = keys::hold(show_id, seat);
        let marker = keys::booked(show_id, seat);

        for attempt in 1..=self.marker_write_attempts {
            match self.store.convert(&lease, &marker, user_id).await {
                Ok(()) => return,
                Err(e) if attempt < self.marker_write_attempts => {
                    warn!("Booked marker write for show {} seat {} failed (attempt {}): {}", show_id, seat, attempt, e);
                    tokio::time::sleep(MARKER_RETRY_BASE * attempt).await;
                }
                Err(e) => {
                    error!(
                        "INCONSISTENCY: booking {} committed but show {} seat {} has no booked marker after {} attempts: {}",
                        booking_id, show_id, seat, attempt, e
                    );
                }
            }
        }
    }

    fn publish_confirmed(&self, booking: &Booking, show: &ShowSummary, user: &UserSummary, settlement: &PaymentSettlement) {
        let event = BookingConfirmedEvent {
            booking_id: booking.id,
            order_id: booking.order_id.clone(),
            booking_date: booking.booking_date,
            total_price: booking.total_price,
            payment_method: booking.payment_method.clone(),
            transaction_id: settlement.transaction_id.clone(),
            user_id: user.id.clone(),
            user_email: user.email.clone().map(Masked::new),
            user_name: user.user_name.clone(),
            show_id: show.id,
            movie_title: show.movie_title.clone(),
            show_date_time: show.show_date_time,
            seats: booking.items.iter()
                .map(|item| SeatInfo { seat_number: item.seat_number.clone(), price: item.price })
                .collect(),
            event_time: Utc::now(),
        };

        let publisher = self.publisher.clone();
        tokio::spawn(async move {
            if let Err(e) = publisher.publish_booking_confirmed(&event).await {
                error!("Failed to publish booking confirmed event for order {}: {}", event.order_id, e);
            }
        });
    }
}
