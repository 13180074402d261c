pub mod models;
pub mod pii;

pub use models::events::{BookingConfirmedEvent, OccupiedSeat, SeatInfo, SeatStatus, SeatUpdate};
pub use pii::Masked;
