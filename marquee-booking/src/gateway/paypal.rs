use async_trait::async_trait;
use marquee_core::payment::{GatewayOutcome, GatewayRedirect, GatewayRequest, PaymentGateway, PaymentMethod};
use marquee_core::{CoreError, CoreResult};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

const COMPLETED: &str = "COMPLETED";
const BRAND_NAME: &str = "Marquee Cinemas";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
// Refresh the access token this long before the provider expires it
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);
// Approval on the provider's page takes longer than a redirect round trip
const INTENT_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Deserialize)]
struct AccessToken {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct Order {
    id: String,
    status: String,
    #[serde(default)]
    links: Vec<Link>,
    #[serde(default)]
    purchase_units: Vec<PurchaseUnit>,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
    rel: String,
}

#[derive(Debug, Deserialize)]
struct PurchaseUnit {
    payments: Option<Payments>,
}

#[derive(Debug, Deserialize)]
struct Payments {
    #[serde(default)]
    captures: Vec<Capture>,
}

#[derive(Debug, Deserialize)]
struct Capture {
    id: String,
    amount: Money,
}

#[derive(Debug, Deserialize)]
struct Money {
    value: String,
}

/// Minor units to the provider's two-decimal string.
pub fn format_amount(minor: i64) -> String {
    format!("{}.{:02}", minor / 100, (minor % 100).abs())
}

/// The provider's decimal string back to minor units.
pub fn parse_amount(value: &str) -> Option<i64> {
    let (whole, fraction) = value.split_once('.').unwrap_or((value, "0"));
    if fraction.is_empty() || fraction.len() > 2 {
        return None;
    }
    let whole: i64 = whole.parse().ok()?;
    let fraction: i64 = format!("{:0<2}", fraction).parse().ok()?;
    Some(whole * 100 + fraction)
}

fn gateway_err(context: &str, err: impl std::fmt::Display) -> CoreError {
    CoreError::PaymentFailed(format!("paypal {}: {}", context, err))
}

impl Order {
    fn approval_url(&self) -> Option<&str> {
        self.links.iter()
            .find(|link| link.rel == "approve" || link.rel == "payer-action")
            .map(|link| link.href.as_str())
    }

    fn capture(&self) -> Option<&Capture> {
        self.purchase_units.iter()
            .filter_map(|unit| unit.payments.as_ref())
            .flat_map(|payments| payments.captures.iter())
            .next()
    }

    fn into_outcome(self) -> GatewayOutcome {
        let capture = self.capture();
        let transaction_id = capture.map(|c| c.id.clone()).unwrap_or_else(|| self.id.clone());
        let amount = capture.and_then(|c| parse_amount(&c.amount.value));
        GatewayOutcome {
            approved: self.status == COMPLETED,
            reference: self.id,
            transaction_id,
            amount,
        }
    }
}

/// Orders API provider: an order is created server-side, the payer approves
/// it on the provider's page and comes back with `token=<order id>`. The
/// callback carries no signature; the server-side capture is the proof.
pub struct PayPalGateway {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    base_url: String,
    currency: String,
    return_url: String,
    cancel_url: String,
    token: Mutex<Option<(String, Instant)>>,
}

impl PayPalGateway {
    pub fn new(
        client_id: &str,
        client_secret: &str,
        base_url: &str,
        currency: &str,
        return_url: &str,
        cancel_url: &str,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            currency: currency.to_string(),
            return_url: return_url.to_string(),
            cancel_url: cancel_url.to_string(),
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> CoreResult<String> {
        let mut cached = self.token.lock().await;
        if let Some((token, valid_until)) = cached.as_ref() {
            if Instant::now() < *valid_until {
                return Ok(token.clone());
            }
        }

        let token: AccessToken = self.http
            .post(format!("{}/v1/oauth2/token", self.base_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| gateway_err("authentication failed", e))?
            .json()
            .await
            .map_err(|e| gateway_err("unreadable token response", e))?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some((token.access_token.clone(), Instant::now() + lifetime));
        Ok(token.access_token)
    }

    async fn get_order(&self, order_id: &str, token: &str) -> CoreResult<Order> {
        self.http
            .get(format!("{}/v2/checkout/orders/{}", self.base_url, order_id))
            .bearer_auth(token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| gateway_err("order lookup failed", e))?
            .json()
            .await
            .map_err(|e| gateway_err("unreadable order", e))
    }

    /// Capture an approved order. A capture the provider refuses (not approved,
    /// already captured) falls back to the order's current state.
    async fn capture(&self, order_id: &str) -> CoreResult<Order> {
        let token = self.access_token().await?;
        let resp = self.http
            .post(format!("{}/v2/checkout/orders/{}/capture", self.base_url, order_id))
            .bearer_auth(&token)
            // Repeated callbacks replay the first capture instead of charging again
            .header("PayPal-Request-Id", format!("capture-{}", order_id))
            .json(&json!({}))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| gateway_err("capture failed", e))?;

        if resp.status().is_success() {
            return resp.json().await.map_err(|e| gateway_err("unreadable capture", e));
        }
        if resp.status() == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            warn!("PayPal refused capture of order {}, reading its state", order_id);
            return self.get_order(order_id, &token).await;
        }
        Err(gateway_err("capture failed", resp.status()))
    }
}

#[async_trait]
impl PaymentGateway for PayPalGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::PayPal
    }

    fn intent_ttl(&self) -> Option<Duration> {
        Some(INTENT_TTL)
    }

    async fn create_payment(&self, request: &GatewayRequest) -> CoreResult<GatewayRedirect> {
        let token = self.access_token().await?;
        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": request.order_id,
                "description": format!("Cinema tickets - show #{} seats {}", request.show_id, request.seat_numbers.join(", ")),
                "amount": {
                    "currency_code": self.currency,
                    "value": format_amount(request.amount),
                },
            }],
            "application_context": {
                "brand_name": BRAND_NAME,
                "user_action": "PAY_NOW",
                "return_url": request.return_url.as_deref().unwrap_or(&self.return_url),
                "cancel_url": self.cancel_url,
            },
        });

        let order: Order = self.http
            .post(format!("{}/v2/checkout/orders", self.base_url))
            .bearer_auth(&token)
            .header("PayPal-Request-Id", format!("create-{}", request.order_id))
            .json(&body)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| gateway_err("order creation failed", e))?
            .json()
            .await
            .map_err(|e| gateway_err("unreadable order", e))?;

        let payment_url = order.approval_url()
            .ok_or_else(|| gateway_err("order has no approval link", &order.id))?
            .to_string();
        info!("PayPal order {} created for {}", order.id, request.order_id);

        Ok(GatewayRedirect { reference: order.id, payment_url })
    }

    async fn verify_callback(&self, params: &HashMap<String, String>) -> CoreResult<GatewayOutcome> {
        let order_id = params.get("token")
            .filter(|token| !token.is_empty())
            .ok_or(CoreError::InvalidSignature)?;

        let outcome = self.capture(order_id).await?.into_outcome();
        if outcome.reference != *order_id {
            return Err(CoreError::InvalidSignature);
        }
        info!("PayPal order {} capture approved: {}", order_id, outcome.approved);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_formatting() {
        assert_eq!(format_amount(90_000), "900.00");
        assert_eq!(format_amount(1_005), "10.05");
        assert_eq!(format_amount(7), "0.07");
    }

    #[test]
    fn test_amount_parsing() {
        assert_eq!(parse_amount("900.00"), Some(90_000));
        assert_eq!(parse_amount("10.5"), Some(1_050));
        assert_eq!(parse_amount("12"), Some(1_200));
        assert_eq!(parse_amount("1.234"), None);
        assert_eq!(parse_amount("abc"), None);
    }

    #[test]
    fn test_captured_order_outcome() {
        let order: Order = serde_json::from_value(json!({
            "id": "5O190127TN364715T",
            "status": "COMPLETED",
            "purchase_units": [{
                "payments": { "captures": [{ "id": "3C679366HH908993F", "amount": { "value": "900.00" } }] }
            }]
        })).unwrap();

        let outcome = order.into_outcome();
        assert!(outcome.approved);
        assert_eq!(outcome.reference, "5O190127TN364715T");
        assert_eq!(outcome.transaction_id, "3C679366HH908993F");
        assert_eq!(outcome.amount, Some(90_000));
    }

    #[test]
    fn test_unapproved_order_outcome() {
        let order: Order = serde_json::from_value(json!({
            "id": "5O190127TN364715T",
            "status": "PAYER_ACTION_REQUIRED",
            "links": [{ "href": "https://www.sandbox.paypal.com/checkoutnow?token=5O1", "rel": "payer-action" }]
        })).unwrap();

        assert!(order.approval_url().is_some());
        let outcome = order.into_outcome();
        assert!(!outcome.approved);
        assert_eq!(outcome.transaction_id, "5O190127TN364715T");
        assert_eq!(outcome.amount, None);
    }
}
