use async_trait::async_trait;
use chrono::Utc;
use marquee_core::booking::{Booking, BookingStatus, NewBooking, ShowSummary, UserSummary};
use marquee_core::repository::{BookingRepository, CatalogRepository};
use marquee_core::{CoreError, CoreResult};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// In-memory catalog (will be replaced by Postgres outside tests)
#[derive(Default)]
pub struct InMemoryCatalog {
    shows: RwLock<HashMap<i64, ShowSummary>>,
    users: RwLock<HashMap<String, UserSummary>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_show(&self, show: ShowSummary) {
        self.shows.write().await.insert(show.id, show);
    }

    pub async fn insert_user(&self, user: UserSummary) {
        self.users.write().await.insert(user.id.clone(), user);
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalog {
    async fn find_show(&self, show_id: i64) -> CoreResult<Option<ShowSummary>> {
        Ok(self.shows.read().await.get(&show_id).cloned())
    }

    async fn find_user(&self, user_id: &str) -> CoreResult<Option<UserSummary>> {
        Ok(self.users.read().await.get(user_id).cloned())
    }
}

#[derive(Default)]
struct BookingTable {
    next_id: i64,
    bookings: BTreeMap<i64, Booking>,
}

/// In-memory booking table enforcing the same unique order id rule as the schema.
#[derive(Default)]
pub struct InMemoryBookingRepository {
    table: RwLock<BookingTable>,
}

impl InMemoryBookingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.table.read().await.bookings.len()
    }

    pub async fn all(&self) -> Vec<Booking> {
        self.table.read().await.bookings.values().cloned().collect()
    }
}

#[async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn create_booking(&self, booking: &NewBooking) -> CoreResult<Booking> {
        let mut table = self.table.write().await;

        if table.bookings.values().any(|b| b.order_id == booking.order_id) {
            return Err(CoreError::AlreadyBooked(booking.order_id.clone()));
        }

        table.next_id += 1;
        let created = Booking {
            id: table.next_id,
            order_id: booking.order_id.clone(),
            user_id: booking.user_id.clone(),
            show_id: booking.show_id,
            total_price: booking.total_price,
            payment_method: booking.payment_method.clone(),
            transaction_id: booking.transaction_id.clone(),
            status: booking.status,
            booking_date: Utc::now(),
            items: booking.items.clone(),
        };
        table.bookings.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_booking(&self, id: i64) -> CoreResult<Option<Booking>> {
        Ok(self.table.read().await.bookings.get(&id).cloned())
    }

    async fn find_by_order_id(&self, order_id: &str) -> CoreResult<Option<Booking>> {
        Ok(self.table.read().await.bookings.values().find(|b| b.order_id == order_id).cloned())
    }

    async fn update_booking_status(&self, id: i64, status: BookingStatus) -> CoreResult<()> {
        let mut table = self.table.write().await;
        let booking = table.bookings.get_mut(&id)
            .ok_or_else(|| CoreError::not_found("booking", id))?;
        booking.status = status;
        Ok(())
    }
}
