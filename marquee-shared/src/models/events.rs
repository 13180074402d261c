use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pii::Masked;

/// Seat state as seen by viewers of a show.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    Available,
    Held,
    Booked,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Available => "AVAILABLE",
            SeatStatus::Held => "HELD",
            SeatStatus::Booked => "BOOKED",
        }
    }
}

/// Broadcast on the show-scoped channel whenever seats change state.
/// `expires_at` is epoch millis, 0 when not applicable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatUpdate {
    pub show_id: i64,
    pub user_id: String,
    pub seat_numbers: Vec<String>,
    pub status: SeatStatus,
    pub expires_at: i64,
}

impl SeatUpdate {
    pub fn held(show_id: i64, user_id: &str, seat_number: &str, expires_at: i64) -> Self {
        Self {
            show_id,
            user_id: user_id.to_string(),
            seat_numbers: vec![seat_number.to_string()],
            status: SeatStatus::Held,
            expires_at,
        }
    }

    pub fn available(show_id: i64, user_id: &str, seat_numbers: Vec<String>) -> Self {
        Self {
            show_id,
            user_id: user_id.to_string(),
            seat_numbers,
            status: SeatStatus::Available,
            expires_at: 0,
        }
    }

    pub fn booked(show_id: i64, user_id: &str, seat_numbers: Vec<String>) -> Self {
        Self {
            show_id,
            user_id: user_id.to_string(),
            seat_numbers,
            status: SeatStatus::Booked,
            expires_at: 0,
        }
    }
}

/// One entry of the occupied-seats snapshot used to hydrate a seat map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OccupiedSeat {
    pub show_id: i64,
    pub user_id: String,
    pub seat_number: String,
    pub status: SeatStatus,
    pub expires_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatInfo {
    pub seat_number: String,
    pub price: i64,
}

/// Published once per committed booking for asynchronous consumers (mailers etc).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfirmedEvent {
    pub booking_id: i64,
    pub order_id: String,
    pub booking_date: DateTime<Utc>,
    pub total_price: i64,
    pub payment_method: String,
    pub transaction_id: String,

    pub user_id: String,
    pub user_email: Option<Masked<String>>,
    pub user_name: Option<String>,

    pub show_id: i64,
    pub movie_title: String,
    pub show_date_time: DateTime<Utc>,

    pub seats: Vec<SeatInfo>,

    pub event_time: DateTime<Utc>,
}
