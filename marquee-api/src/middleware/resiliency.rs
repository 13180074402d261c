use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,
    /// Failing fast until `reset_timeout` has passed.
    Open,
    /// Letting a trial request through to the gateway.
    HalfOpen,
}

pub struct CircuitBreaker {
    pub name: String,
    pub state: RwLock<CircuitState>,
    pub failure_count: AtomicUsize,
    pub failure_threshold: usize,
    pub reset_timeout: Duration,
    pub last_failure: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(name: &str, threshold: usize, timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicUsize::new(0),
            failure_threshold: threshold,
            reset_timeout: timeout,
            last_failure: RwLock::new(None),
        }
    }

    pub async fn current(&self) -> CircuitState {
        *self.state.read().await
    }

    pub async fn check(&self) -> bool {
        let state = *self.state.read().await;
        match state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = self.last_failure.read().await.map(|at| at.elapsed());
                if elapsed.is_some_and(|e| e > self.reset_timeout) {
                    *self.state.write().await = CircuitState::HalfOpen;
                    tracing::info!("Circuit Breaker [{}] moving to Half-Open", self.name);
                    return true;
                }
                false
            }
        }
    }

    pub async fn record_success(&self) {
        let mut state = self.state.write().await;
        if *state == CircuitState::HalfOpen {
            *state = CircuitState::Closed;
            tracing::info!("Circuit Breaker [{}] recovered to Closed", self.name);
        }
        self.failure_count.store(0, Ordering::SeqCst);
    }

    pub async fn record_failure(&self) {
        let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.write().await;

        if count >= self.failure_threshold || *state == CircuitState::HalfOpen {
            *state = CircuitState::Open;
            *self.last_failure.write().await = Some(Instant::now());
            tracing::error!("Circuit Breaker [{}] TRIPPED to Open. Failures: {}", self.name, count);
        }
    }
}

/// Guards the payment routes: 5xx responses count as gateway failures.
pub async fn payment_circuit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let cb = &state.resiliency.payment_cb;
    if !cb.check().await {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "code": "CIRCUIT_OPEN",
                "error": format!("Circuit Breaker [{}] is OPEN", cb.name),
            })),
        ).into_response();
    }

    let response = next.run(req).await;
    if response.status().is_server_error() {
        cb.record_failure().await;
    } else {
        cb.record_success().await;
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trips_after_threshold_and_recovers() {
        let cb = CircuitBreaker::new("payments", 2, Duration::from_millis(10));

        cb.record_failure().await;
        assert!(cb.check().await);
        cb.record_failure().await;
        assert_eq!(cb.current().await, CircuitState::Open);
        assert!(!cb.check().await);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cb.check().await);
        assert_eq!(cb.current().await, CircuitState::HalfOpen);

        cb.record_success().await;
        assert_eq!(cb.current().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let cb = CircuitBreaker::new("payments", 5, Duration::from_millis(0));
        for _ in 0..5 {
            cb.record_failure().await;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(cb.check().await);

        cb.record_failure().await;
        assert_eq!(cb.current().await, CircuitState::Open);
    }
}
