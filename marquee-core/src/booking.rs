use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{CoreError, CoreResult};

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for BookingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            other => Err(CoreError::InternalError(format!("unknown booking status {}", other))),
        }
    }
}

/// Per-seat line item. Prices are in minor currency units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookingItem {
    pub seat_number: String,
    pub price: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub order_id: String,
    pub user_id: String,
    pub show_id: i64,
    pub total_price: i64,
    pub payment_method: String,
    pub transaction_id: Option<String>,
    pub status: BookingStatus,
    pub booking_date: DateTime<Utc>,
    pub items: Vec<BookingItem>,
}

impl Booking {
    /// Transition: any → CANCELLED (admin)
    pub fn cancel(&mut self) -> CoreResult<()> {
        if self.status == BookingStatus::Cancelled {
            return Err(CoreError::AlreadyCancelled(self.id.to_string()));
        }
        self.status = BookingStatus::Cancelled;
        Ok(())
    }

    /// Transition: PENDING/CANCELLED → CONFIRMED (admin)
    pub fn confirm(&mut self) -> CoreResult<()> {
        if self.status == BookingStatus::Confirmed {
            return Err(CoreError::AlreadyBooked(self.id.to_string()));
        }
        self.status = BookingStatus::Confirmed;
        Ok(())
    }

    pub fn seat_numbers(&self) -> Vec<String> {
        self.items.iter().map(|item| item.seat_number.clone()).collect()
    }
}

/// A booking about to be written; the repository assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub order_id: String,
    pub user_id: String,
    pub show_id: i64,
    pub total_price: i64,
    pub payment_method: String,
    pub transaction_id: Option<String>,
    pub status: BookingStatus,
    pub items: Vec<BookingItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowSummary {
    pub id: i64,
    pub movie_title: String,
    pub show_date_time: DateTime<Utc>,
    /// Price per seat, minor units.
    pub price: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub email: Option<String>,
    pub user_name: Option<String>,
}
