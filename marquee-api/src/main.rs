use anyhow::Context;
use marquee_api::{app, AppState, AuthConfig, Resiliency};
use marquee_api::middleware::CircuitBreaker;
use marquee_booking::{
    BookingAdmin, BookingCommitter, GatewayRegistry, MockGateway, PayPalGateway, PaymentOrchestrator,
    SeatLeaseManager, VnPayGateway,
};
use marquee_store::app_config::Config;
use marquee_store::{DbClient, EventProducer, PgBookingRepository, PgCatalogRepository, RedisBroadcaster, RedisLeaseStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marquee_api=debug,marquee_booking=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Marquee API on port {}", config.server.port);

    // Redis: leases and cross-process seat updates
    let lease_store = Arc::new(
        RedisLeaseStore::new(&config.redis.url)
            .await
            .context("Failed to connect to Redis")?,
    );
    let redis_broadcaster = RedisBroadcaster::new(lease_store.client().clone());

    let (seat_tx, _) = tokio::sync::broadcast::channel(config.booking.broadcast_capacity.max(1));
    tokio::spawn(marquee_api::worker::start_seat_relay(redis_broadcaster.clone(), seat_tx.clone()));

    let producer = EventProducer::new(&config.kafka.brokers, &config.kafka.booking_confirmed_topic)
        .context("Failed to create Kafka producer")?;

    let db = DbClient::new(&config.database.url).await.context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;
    let catalog = Arc::new(PgCatalogRepository::new(db.pool.clone()));
    let bookings = Arc::new(PgBookingRepository::new(db.pool.clone()));

    let broadcaster = Arc::new(redis_broadcaster);
    let leases = Arc::new(SeatLeaseManager::new(
        lease_store.clone(),
        broadcaster.clone(),
        config.booking.seat_hold_ttl(),
    ));
    let committer = Arc::new(
        BookingCommitter::new(lease_store.clone(), catalog.clone(), bookings.clone(), broadcaster, Arc::new(producer))
            .with_marker_write_attempts(config.booking.marker_write_attempts),
    );

    let mut gateways = GatewayRegistry::new();
    if let Some(vnpay) = &config.vnpay {
        gateways.register(Arc::new(VnPayGateway::new(
            &vnpay.tmn_code,
            &vnpay.secret_key,
            &vnpay.pay_url,
            &vnpay.return_url,
        )));
    }
    if let Some(paypal) = &config.paypal {
        gateways.register(Arc::new(PayPalGateway::new(
            &paypal.client_id,
            &paypal.client_secret,
            &paypal.base_url,
            &paypal.currency,
            &paypal.return_url,
            &paypal.cancel_url,
        )));
    }
    if let Some(mock) = config.enabled_mock_gateway() {
        tracing::warn!("Mock payment gateway enabled; callbacks signed with its secret confirm bookings unpaid");
        let return_url = format!("http://localhost:{}/v1/payments/mock/callback", config.server.port);
        gateways.register(Arc::new(MockGateway::new(&mock.secret, &return_url)));
    }
    tracing::info!("Payment methods enabled: {:?}", gateways.methods());

    let payments = Arc::new(PaymentOrchestrator::new(
        leases.clone(),
        lease_store,
        catalog,
        committer,
        gateways,
        config.booking.payment_intent_ttl(),
    ));

    let app_state = AppState {
        leases,
        payments,
        admin: Arc::new(BookingAdmin::new(bookings)),
        seat_tx,
        auth: AuthConfig { secret: config.auth.jwt_secret.clone() },
        resiliency: Arc::new(Resiliency {
            payment_cb: CircuitBreaker::new("payments", 5, Duration::from_secs(30)),
        }),
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
