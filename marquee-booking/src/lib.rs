pub mod admin;
pub mod broadcast;
pub mod committer;
pub mod gateway;
pub mod lease_manager;
pub mod orchestrator;

pub use admin::BookingAdmin;
pub use broadcast::ChannelBroadcaster;
pub use committer::BookingCommitter;
pub use gateway::{GatewayRegistry, MockGateway, PayPalGateway, VnPayGateway};
pub use lease_manager::{SeatHold, SeatLeaseManager};
pub use orchestrator::{CallbackResult, PaymentCreated, PaymentOrchestrator, PaymentRequest};
