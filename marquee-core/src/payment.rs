use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    #[serde(rename = "VNPAY")]
    VnPay,
    #[serde(rename = "PAYPAL")]
    PayPal,
    Mock,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::VnPay => "VNPAY",
            PaymentMethod::PayPal => "PAYPAL",
            PaymentMethod::Mock => "MOCK",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vnpay" => Ok(PaymentMethod::VnPay),
            "paypal" => Ok(PaymentMethod::PayPal),
            "mock" => Ok(PaymentMethod::Mock),
            other => Err(CoreError::PaymentFailed(format!("unsupported payment method {}", other))),
        }
    }
}

/// Snapshot stored in the lease store between payment creation and the
/// gateway callback. Consumed exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentIntentRecord {
    pub order_id: String,
    pub gateway_reference: String,
    pub show_id: i64,
    pub user_id: String,
    pub seat_numbers: Vec<String>,
    /// Minor currency units.
    pub amount: i64,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
}

/// What a gateway needs to start a payment.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub order_id: String,
    pub show_id: i64,
    pub seat_numbers: Vec<String>,
    pub amount: i64,
    pub return_url: Option<String>,
    pub client_ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayRedirect {
    /// Gateway-side reference echoed back on the callback.
    pub reference: String,
    pub payment_url: String,
}

/// Verified content of a gateway callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOutcome {
    pub reference: String,
    pub approved: bool,
    pub transaction_id: String,
    /// Settled amount in minor units, when the gateway reports one.
    pub amount: Option<i64>,
}

/// Settled payment handed to the booking committer.
#[derive(Debug, Clone)]
pub struct PaymentSettlement {
    pub order_id: String,
    pub show_id: i64,
    pub user_id: String,
    pub seat_numbers: Vec<String>,
    pub amount: i64,
    pub payment_method: PaymentMethod,
    pub transaction_id: String,
}

impl PaymentSettlement {
    pub fn from_intent(intent: PaymentIntentRecord, transaction_id: String) -> Self {
        Self {
            order_id: intent.order_id,
            show_id: intent.show_id,
            user_id: intent.user_id,
            seat_numbers: intent.seat_numbers,
            amount: intent.amount,
            payment_method: intent.payment_method,
            transaction_id,
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn method(&self) -> PaymentMethod;

    /// How long this provider may take to call back. `None` keeps the
    /// orchestrator's default.
    fn intent_ttl(&self) -> Option<Duration> {
        None
    }

    /// Register the payment with the provider and return where to send the payer.
    async fn create_payment(&self, request: &GatewayRequest) -> CoreResult<GatewayRedirect>;

    /// Check integrity of the raw callback parameters before any field is trusted.
    /// Fails with `InvalidSignature` on mismatch.
    async fn verify_callback(&self, params: &HashMap<String, String>) -> CoreResult<GatewayOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parsing_is_case_insensitive() {
        assert_eq!("VNPay".parse::<PaymentMethod>().unwrap(), PaymentMethod::VnPay);
        assert_eq!("mock".parse::<PaymentMethod>().unwrap(), PaymentMethod::Mock);
        assert_eq!("PayPal".parse::<PaymentMethod>().unwrap(), PaymentMethod::PayPal);
        assert!(matches!("bitcoin".parse::<PaymentMethod>(), Err(CoreError::PaymentFailed(_))));
    }

    #[test]
    fn test_intent_record_json() {
        let record = PaymentIntentRecord {
            order_id: "o-1".to_string(),
            gateway_reference: "ref-1".to_string(),
            show_id: 42,
            user_id: "user-a".to_string(),
            seat_numbers: vec!["A1".to_string()],
            amount: 90_000,
            payment_method: PaymentMethod::VnPay,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"VNPAY\""));
        let back: PaymentIntentRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
