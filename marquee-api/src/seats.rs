use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures_util::stream::{Stream, StreamExt};
use marquee_core::CoreError;
use marquee_shared::OccupiedSeat;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

use crate::error::{message_for, status_for, AppError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SeatRequest {
    pub show_id: i64,
    pub seat_number: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SeatBatchRequest {
    pub show_id: i64,
    pub seat_numbers: Vec<String>,
    pub user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SeatResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl SeatResponse {
    fn ok(message: &str, expires_at: Option<i64>) -> (StatusCode, Json<Self>) {
        (StatusCode::OK, Json(Self { success: true, message: message.to_string(), code: None, expires_at }))
    }

    fn denied(err: CoreError) -> (StatusCode, Json<Self>) {
        let message = match &err {
            CoreError::AlreadyHeld(seat) => format!("Seat {} is currently held by another user", seat),
            CoreError::SeatNotAvailable(seat) => format!("Seat {} is already booked", seat),
            _ => message_for(&err),
        };
        (status_for(&err), Json(Self {
            success: false,
            message,
            code: Some(err.code().to_string()),
            expires_at: None,
        }))
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/seats/hold", post(hold_seat))
        .route("/v1/seats/hold-batch", post(hold_seats))
        .route("/v1/seats/release", post(release_seat))
        .route("/v1/seats/occupied/{show_id}", get(occupied_seats))
        .route("/v1/shows/{show_id}/seats/stream", get(seat_stream))
}

async fn hold_seat(
    State(state): State<AppState>,
    Json(req): Json<SeatRequest>,
) -> (StatusCode, Json<SeatResponse>) {
    match state.leases.hold(req.show_id, &req.seat_number, &req.user_id).await {
        Ok(hold) => SeatResponse::ok("Seat held", Some(hold.expires_at)),
        Err(e) => SeatResponse::denied(e),
    }
}

async fn hold_seats(
    State(state): State<AppState>,
    Json(req): Json<SeatBatchRequest>,
) -> (StatusCode, Json<SeatResponse>) {
    match state.leases.hold_all(req.show_id, &req.seat_numbers, &req.user_id).await {
        Ok(holds) => {
            let expires_at = holds.iter().map(|h| h.expires_at).min();
            SeatResponse::ok("Seats held", expires_at)
        }
        Err(e) => SeatResponse::denied(e),
    }
}

async fn release_seat(
    State(state): State<AppState>,
    Json(req): Json<SeatRequest>,
) -> (StatusCode, Json<SeatResponse>) {
    match state.leases.release(req.show_id, &req.seat_number, &req.user_id).await {
        Ok(()) => SeatResponse::ok("Seat released", None),
        Err(e) => SeatResponse::denied(e),
    }
}

async fn occupied_seats(
    State(state): State<AppState>,
    Path(show_id): Path<i64>,
) -> Result<Json<Vec<OccupiedSeat>>, AppError> {
    Ok(Json(state.leases.list_occupied(show_id).await?))
}

/// Live seat updates for one show. Lagging clients skip what they missed and
/// resync from the occupied-seats query.
async fn seat_stream(
    State(state): State<AppState>,
    Path(show_id): Path<i64>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.seat_tx.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(update) if update.show_id == show_id => {
                Event::default().event("seat_update").json_data(&update).ok().map(Ok)
            }
            Ok(_) => None,
            Err(e) => {
                debug!("Seat stream for show {} lagged: {}", show_id, e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
