#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use marquee_booking::{
    BookingAdmin, BookingCommitter, ChannelBroadcaster, GatewayRegistry, MockGateway, PaymentOrchestrator,
    PaymentRequest, SeatLeaseManager, VnPayGateway,
};
use marquee_core::booking::{Booking, BookingStatus, NewBooking, ShowSummary, UserSummary};
use marquee_core::events::BookingEventPublisher;
use marquee_core::lease::{AcquireOutcome, LeaseStore};
use marquee_core::payment::PaymentGateway;
use marquee_core::repository::BookingRepository;
use marquee_core::{CoreError, CoreResult};
use marquee_shared::{BookingConfirmedEvent, SeatUpdate};
use marquee_store::{InMemoryBookingRepository, InMemoryCatalog, MemoryLeaseStore};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

pub const SHOW: i64 = 42;
pub const PRICE: i64 = 90_000;
pub const HOLD_TTL: Duration = Duration::from_secs(120);
pub const MOCK_SECRET: &str = "mock-secret";
pub const VNPAY_SECRET: &str = "vnpay-secret";

/// Forwards published events to the test.
pub struct RecordingPublisher {
    tx: mpsc::UnboundedSender<BookingConfirmedEvent>,
}

#[async_trait]
impl BookingEventPublisher for RecordingPublisher {
    async fn publish_booking_confirmed(&self, event: &BookingConfirmedEvent) -> CoreResult<()> {
        let _ = self.tx.send(event.clone());
        Ok(())
    }
}

pub struct FailingPublisher;

#[async_trait]
impl BookingEventPublisher for FailingPublisher {
    async fn publish_booking_confirmed(&self, _event: &BookingConfirmedEvent) -> CoreResult<()> {
        Err(CoreError::StoreError("broker down".to_string()))
    }
}

/// Memory store whose first `convert_failures` conversions fail.
pub struct FlakyStore {
    pub inner: MemoryLeaseStore,
    convert_failures: AtomicU32,
}

impl FlakyStore {
    pub fn new(convert_failures: u32) -> Self {
        Self { inner: MemoryLeaseStore::new(), convert_failures: AtomicU32::new(convert_failures) }
    }
}

#[async_trait]
impl LeaseStore for FlakyStore {
    async fn acquire(&self, key: &str, blocker: &str, holder: &str, ttl: Duration) -> CoreResult<AcquireOutcome> {
        self.inner.acquire(key, blocker, holder, ttl).await
    }

    async fn release_if_holder(&self, key: &str, holder: &str) -> CoreResult<bool> {
        self.inner.release_if_holder(key, holder).await
    }

    async fn convert(&self, lease: &str, marker: &str, holder: &str) -> CoreResult<()> {
        let remaining = self.convert_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.convert_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(CoreError::StoreError("connection reset".to_string()));
        }
        self.inner.convert(lease, marker, holder).await
    }

    async fn get(&self, key: &str) -> CoreResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn exists(&self, key: &str) -> CoreResult<bool> {
        self.inner.exists(key).await
    }

    async fn remaining_ttl(&self, key: &str) -> CoreResult<Option<Duration>> {
        self.inner.remaining_ttl(key).await
    }

    async fn scan_prefix(&self, prefix: &str) -> CoreResult<Vec<String>> {
        self.inner.scan_prefix(prefix).await
    }

    async fn put_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CoreResult<()> {
        self.inner.put_with_ttl(key, value, ttl).await
    }

    async fn take(&self, key: &str) -> CoreResult<Option<String>> {
        self.inner.take(key).await
    }
}

/// Booking repository whose first `create_failures` inserts fail.
pub struct FlakyBookings {
    inner: Arc<InMemoryBookingRepository>,
    create_failures: AtomicU32,
}

#[async_trait]
impl BookingRepository for FlakyBookings {
    async fn create_booking(&self, booking: &NewBooking) -> CoreResult<Booking> {
        let remaining = self.create_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.create_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(CoreError::StoreError("db connection reset".to_string()));
        }
        self.inner.create_booking(booking).await
    }

    async fn get_booking(&self, id: i64) -> CoreResult<Option<Booking>> {
        self.inner.get_booking(id).await
    }

    async fn find_by_order_id(&self, order_id: &str) -> CoreResult<Option<Booking>> {
        self.inner.find_by_order_id(order_id).await
    }

    async fn update_booking_status(&self, id: i64, status: BookingStatus) -> CoreResult<()> {
        self.inner.update_booking_status(id, status).await
    }
}

pub struct Harness {
    pub store: Arc<dyn LeaseStore>,
    pub catalog: Arc<InMemoryCatalog>,
    pub bookings: Arc<InMemoryBookingRepository>,
    pub broadcaster: ChannelBroadcaster,
    pub updates: broadcast::Receiver<SeatUpdate>,
    pub events: mpsc::UnboundedReceiver<BookingConfirmedEvent>,
    pub leases: Arc<SeatLeaseManager>,
    pub committer: Arc<BookingCommitter>,
    pub orchestrator: PaymentOrchestrator,
    pub admin: BookingAdmin,
    pub mock: Arc<MockGateway>,
    pub vnpay: Arc<VnPayGateway>,
}

/// Knobs for the doubles behind a harness.
#[derive(Default)]
pub struct Setup {
    pub store: Option<Arc<dyn LeaseStore>>,
    pub publisher: Option<Arc<dyn BookingEventPublisher>>,
    /// The first `create_failures` booking inserts fail.
    pub create_failures: u32,
    pub extra_gateway: Option<Arc<dyn PaymentGateway>>,
}

pub async fn harness() -> Harness {
    build(Setup::default()).await
}

pub async fn harness_with_store(store: Arc<dyn LeaseStore>) -> Harness {
    build(Setup { store: Some(store), ..Setup::default() }).await
}

pub async fn harness_with_publisher(publisher: Arc<dyn BookingEventPublisher>) -> Harness {
    build(Setup { publisher: Some(publisher), ..Setup::default() }).await
}

pub async fn harness_with_failing_inserts(create_failures: u32) -> Harness {
    build(Setup { create_failures, ..Setup::default() }).await
}

pub async fn harness_with_gateway(gateway: Arc<dyn PaymentGateway>) -> Harness {
    build(Setup { extra_gateway: Some(gateway), ..Setup::default() }).await
}

pub async fn build(setup: Setup) -> Harness {
    let store = setup.store
        .unwrap_or_else(|| Arc::new(MemoryLeaseStore::new()) as Arc<dyn LeaseStore>);
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog.insert_show(ShowSummary {
        id: SHOW,
        movie_title: "Metropolis".to_string(),
        show_date_time: Utc.with_ymd_and_hms(2026, 11, 1, 19, 30, 0).unwrap(),
        price: PRICE,
    }).await;
    for (id, email) in [("user-a", "a@example.com"), ("user-b", "b@example.com")] {
        catalog.insert_user(UserSummary {
            id: id.to_string(),
            email: Some(email.to_string()),
            user_name: Some(id.to_uppercase()),
        }).await;
    }

    let bookings = Arc::new(InMemoryBookingRepository::new());
    let broadcaster = ChannelBroadcaster::new(64);
    let updates = broadcaster.subscribe();
    let (tx, events) = mpsc::unbounded_channel();
    let publisher = setup.publisher
        .unwrap_or_else(|| Arc::new(RecordingPublisher { tx }) as Arc<dyn BookingEventPublisher>);

    let leases = Arc::new(SeatLeaseManager::new(store.clone(), Arc::new(broadcaster.clone()), HOLD_TTL));
    let committed_to = Arc::new(FlakyBookings {
        inner: bookings.clone(),
        create_failures: AtomicU32::new(setup.create_failures),
    });
    let committer = Arc::new(BookingCommitter::new(
        store.clone(),
        catalog.clone(),
        committed_to,
        Arc::new(broadcaster.clone()),
        publisher,
    ));

    let mock = Arc::new(MockGateway::new(MOCK_SECRET, "http://localhost/payments/return"));
    let vnpay = Arc::new(VnPayGateway::new(
        "TMN01",
        VNPAY_SECRET,
        "https://sandbox.vnpay.test/pay",
        "http://localhost/payments/return",
    ));
    let mut gateways = GatewayRegistry::new().with(mock.clone()).with(vnpay.clone());
    if let Some(gateway) = setup.extra_gateway {
        gateways.register(gateway);
    }

    let orchestrator = PaymentOrchestrator::new(
        leases.clone(),
        store.clone(),
        catalog.clone(),
        committer.clone(),
        gateways,
        Duration::from_secs(20 * 60),
    );
    let admin = BookingAdmin::new(bookings.clone());

    Harness {
        store,
        catalog,
        bookings,
        broadcaster,
        updates,
        events,
        leases,
        committer,
        orchestrator,
        admin,
        mock,
        vnpay,
    }
}

pub fn payment_request(user: &str, seats: &[&str], method: &str) -> PaymentRequest {
    PaymentRequest {
        show_id: SHOW,
        seat_numbers: seats.iter().map(|s| s.to_string()).collect(),
        user_id: user.to_string(),
        payment_method: method.to_string(),
        return_url: None,
        client_ip: None,
    }
}

pub fn seats(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
