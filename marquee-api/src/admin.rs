use axum::{
    extract::{Path, State},
    routing::{get, put},
    Extension, Json, Router,
};
use marquee_core::booking::Booking;
use tracing::info;

use crate::error::AppError;
use crate::middleware::{admin_auth_middleware, AdminClaims};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/admin/bookings/{id}", get(get_booking))
        .route("/v1/admin/orders/{order_id}/booking", get(get_booking_by_order))
        .route("/v1/admin/bookings/{id}/cancel", put(cancel_booking))
        .route("/v1/admin/bookings/{id}/confirm", put(confirm_booking))
        .route_layer(axum::middleware::from_fn_with_state(state, admin_auth_middleware))
}

async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.admin.get(id).await?))
}

async fn get_booking_by_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.admin.get_by_order(&order_id).await?))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Path(id): Path<i64>,
) -> Result<Json<Booking>, AppError> {
    info!("Admin {} cancelling booking {}", claims.sub, id);
    Ok(Json(state.admin.cancel(id).await?))
}

async fn confirm_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Path(id): Path<i64>,
) -> Result<Json<Booking>, AppError> {
    info!("Admin {} confirming booking {}", claims.sub, id);
    Ok(Json(state.admin.confirm(id).await?))
}
