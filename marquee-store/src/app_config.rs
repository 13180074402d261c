use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub booking: BookingRules,
    pub vnpay: Option<VnPayConfig>,
    pub paypal: Option<PayPalConfig>,
    pub mock_gateway: Option<MockGatewayConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookingRules {
    #[serde(default = "default_seat_hold_seconds")]
    pub seat_hold_seconds: u64,
    #[serde(default = "default_payment_intent_minutes")]
    pub payment_intent_minutes: u64,
    #[serde(default = "default_marker_write_attempts")]
    pub marker_write_attempts: u32,
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

fn default_seat_hold_seconds() -> u64 { 120 }
fn default_payment_intent_minutes() -> u64 { 20 }
fn default_marker_write_attempts() -> u32 { 3 }
fn default_broadcast_capacity() -> usize { 256 }

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            seat_hold_seconds: default_seat_hold_seconds(),
            payment_intent_minutes: default_payment_intent_minutes(),
            marker_write_attempts: default_marker_write_attempts(),
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

impl BookingRules {
    pub fn seat_hold_ttl(&self) -> Duration {
        Duration::from_secs(self.seat_hold_seconds)
    }

    pub fn payment_intent_ttl(&self) -> Duration {
        Duration::from_secs(self.payment_intent_minutes * 60)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct VnPayConfig {
    pub tmn_code: String,
    pub secret_key: String,
    pub pay_url: String,
    pub return_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PayPalConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_paypal_base_url")]
    pub base_url: String,
    #[serde(default = "default_paypal_currency")]
    pub currency: String,
    pub return_url: String,
    pub cancel_url: String,
}

fn default_paypal_base_url() -> String { "https://api-m.sandbox.paypal.com".to_string() }
fn default_paypal_currency() -> String { "USD".to_string() }

/// Loopback gateway for development. Registered only when `enabled` is set.
#[derive(Debug, Deserialize, Clone)]
pub struct MockGatewayConfig {
    #[serde(default)]
    pub enabled: bool,
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    #[serde(default = "default_booking_confirmed_topic")]
    pub booking_confirmed_topic: String,
}

fn default_booking_confirmed_topic() -> String { "booking-confirmed".to_string() }

impl Config {
    /// Mock gateway settings, if explicitly enabled.
    pub fn enabled_mock_gateway(&self) -> Option<&MockGatewayConfig> {
        self.mock_gateway.as_ref().filter(|mock| mock.enabled)
    }

    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // MARQUEE__REDIS__URL=... sets redis.url
            .add_source(config::Environment::with_prefix("MARQUEE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
