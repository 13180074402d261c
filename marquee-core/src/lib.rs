pub mod booking;
pub mod events;
pub mod keys;
pub mod lease;
pub mod payment;
pub mod repository;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("Seat {0} is no longer available")]
    SeatNotAvailable(String),
    #[error("Seat {0} is already held")]
    AlreadyHeld(String),
    #[error("Seat {seat} is not held by {user}")]
    NotHolder { seat: String, user: String },
    #[error("Payment failed or cancelled: {0}")]
    PaymentFailed(String),
    #[error("Invalid payment signature")]
    InvalidSignature,
    #[error("Payment metadata not found: {0}")]
    PaymentNotFound(String),
    #[error("Booking {0} has already been confirmed")]
    AlreadyBooked(String),
    #[error("Booking {0} has already been cancelled")]
    AlreadyCancelled(String),
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Store unavailable: {0}")]
    StoreError(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CoreError::NotFound { entity, id: id.to_string() }
    }

    /// Stable identifier surfaced to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::NotFound { .. } => "NOT_FOUND",
            CoreError::SeatNotAvailable(_) => "SEAT_NOT_AVAILABLE",
            CoreError::AlreadyHeld(_) => "ALREADY_HELD",
            CoreError::NotHolder { .. } => "NOT_HOLDER",
            CoreError::PaymentFailed(_) => "PAYMENT_FAILED",
            CoreError::InvalidSignature => "INVALID_SIGNATURE",
            CoreError::PaymentNotFound(_) => "PAYMENT_NOT_FOUND",
            CoreError::AlreadyBooked(_) => "ALREADY_BOOKED",
            CoreError::AlreadyCancelled(_) => "ALREADY_CANCELLED",
            CoreError::ValidationError(_) => "VALIDATION_ERROR",
            CoreError::StoreError(_) => "STORE_UNAVAILABLE",
            CoreError::InternalError(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::InternalError(format!("serialization failed: {}", err))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
