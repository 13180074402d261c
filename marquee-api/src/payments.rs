use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use marquee_booking::{CallbackResult, PaymentCreated, PaymentRequest};
use std::collections::HashMap;
use tracing::info;

use crate::error::AppError;
use crate::middleware::payment_circuit_middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/payments", post(create_payment))
        .route("/v1/payments/{method}/callback", get(payment_callback))
        .route_layer(axum::middleware::from_fn_with_state(state, payment_circuit_middleware))
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    headers.get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

async fn create_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut req): Json<PaymentRequest>,
) -> Result<Json<PaymentCreated>, AppError> {
    if req.client_ip.is_none() {
        req.client_ip = forwarded_ip(&headers);
    }
    let created = state.payments.initiate(&req).await?;
    Ok(Json(created))
}

async fn payment_callback(
    State(state): State<AppState>,
    Path(method): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<CallbackResult>, AppError> {
    info!("Payment callback via {} with {} params", method, params.len());
    let result = state.payments.handle_callback(&method, &params).await?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_forwarded_address_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Forwarded-For", "203.0.113.9, 10.0.0.1".parse().unwrap());
        assert_eq!(forwarded_ip(&headers).as_deref(), Some("203.0.113.9"));
        assert_eq!(forwarded_ip(&HeaderMap::new()), None);
    }
}
