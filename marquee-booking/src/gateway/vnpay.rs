use async_trait::async_trait;
use chrono::{Duration, FixedOffset, Utc};
use hmac::{Hmac, Mac};
use marquee_core::payment::{GatewayOutcome, GatewayRedirect, GatewayRequest, PaymentGateway, PaymentMethod};
use marquee_core::{CoreError, CoreResult};
use sha2::Sha512;
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

type HmacSha512 = Hmac<Sha512>;

const VERSION: &str = "2.1.0";
const COMMAND: &str = "pay";
const CURRENCY_CODE: &str = "VND";
const ORDER_TYPE: &str = "other";
const LOCALE: &str = "vn";
const DATE_FORMAT: &str = "%Y%m%d%H%M%S";
const SUCCESS_CODE: &str = "00";
const PAYMENT_WINDOW_MINUTES: i64 = 15;
// Provider clock is GMT+7
const PROVIDER_UTC_OFFSET_SECS: i32 = 7 * 3600;

/// Signed-redirect provider: the payer is sent to `pay_url` with a query
/// signed by HMAC-SHA512, and comes back with a signed result query.
pub struct VnPayGateway {
    tmn_code: String,
    secret_key: String,
    pay_url: String,
    return_url: String,
}

/// Form encoding as the provider computes it (space becomes `+`).
fn encode(value: &str) -> String {
    urlencoding::encode(value).replace("%20", "+")
}

/// `k=v&k=v` over non-empty values, sorted by key.
fn canonical_query(params: &BTreeMap<String, String>) -> String {
    params.iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{}={}", k, encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

impl VnPayGateway {
    pub fn new(tmn_code: &str, secret_key: &str, pay_url: &str, return_url: &str) -> Self {
        Self {
            tmn_code: tmn_code.to_string(),
            secret_key: secret_key.to_string(),
            pay_url: pay_url.to_string(),
            return_url: return_url.to_string(),
        }
    }

    pub fn reference_for(order_id: &str) -> String {
        order_id.replace('-', "")
    }

    fn mac(&self, data: &str) -> CoreResult<HmacSha512> {
        let mut mac = HmacSha512::new_from_slice(self.secret_key.as_bytes())
            .map_err(|_| CoreError::InternalError("invalid VNPay secret key".to_string()))?;
        mac.update(data.as_bytes());
        Ok(mac)
    }

    pub fn sign(&self, params: &BTreeMap<String, String>) -> CoreResult<String> {
        let data = canonical_query(params);
        Ok(hex::encode(self.mac(&data)?.finalize().into_bytes()))
    }
}

#[async_trait]
impl PaymentGateway for VnPayGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::VnPay
    }

    async fn create_payment(&self, request: &GatewayRequest) -> CoreResult<GatewayRedirect> {
        let offset = FixedOffset::east_opt(PROVIDER_UTC_OFFSET_SECS)
            .ok_or_else(|| CoreError::InternalError("invalid provider offset".to_string()))?;
        let created = Utc::now().with_timezone(&offset);
        let expires = created + Duration::minutes(PAYMENT_WINDOW_MINUTES);
        let reference = Self::reference_for(&request.order_id);

        let mut params = BTreeMap::new();
        params.insert("vnp_Version".to_string(), VERSION.to_string());
        params.insert("vnp_Command".to_string(), COMMAND.to_string());
        params.insert("vnp_TmnCode".to_string(), self.tmn_code.clone());
        // Provider amounts carry two implied decimals
        params.insert("vnp_Amount".to_string(), (request.amount * 100).to_string());
        params.insert("vnp_CurrCode".to_string(), CURRENCY_CODE.to_string());
        params.insert("vnp_TxnRef".to_string(), reference.clone());
        params.insert("vnp_OrderInfo".to_string(), format!("Movie tickets order {}", request.order_id));
        params.insert("vnp_OrderType".to_string(), ORDER_TYPE.to_string());
        params.insert("vnp_Locale".to_string(), LOCALE.to_string());
        params.insert(
            "vnp_ReturnUrl".to_string(),
            request.return_url.clone().unwrap_or_else(|| self.return_url.clone()),
        );
        params.insert(
            "vnp_IpAddr".to_string(),
            request.client_ip.clone().unwrap_or_else(|| "127.0.0.1".to_string()),
        );
        params.insert("vnp_CreateDate".to_string(), created.format(DATE_FORMAT).to_string());
        params.insert("vnp_ExpireDate".to_string(), expires.format(DATE_FORMAT).to_string());

        let query = canonical_query(&params);
        let secure_hash = hex::encode(self.mac(&query)?.finalize().into_bytes());
        info!("Generated VNPay URL for order {} (ref {})", request.order_id, reference);

        Ok(GatewayRedirect {
            payment_url: format!("{}?{}&vnp_SecureHash={}", self.pay_url, query, secure_hash),
            reference,
        })
    }

    async fn verify_callback(&self, params: &HashMap<String, String>) -> CoreResult<GatewayOutcome> {
        let received = params.get("vnp_SecureHash").ok_or(CoreError::InvalidSignature)?;
        let signed: BTreeMap<String, String> = params.iter()
            .filter(|(k, _)| k.as_str() != "vnp_SecureHash" && k.as_str() != "vnp_SecureHashType")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let expected = hex::decode(received).map_err(|_| CoreError::InvalidSignature)?;
        if self.mac(&canonical_query(&signed))?.verify_slice(&expected).is_err() {
            warn!("VNPay callback signature mismatch for ref {:?}", params.get("vnp_TxnRef"));
            return Err(CoreError::InvalidSignature);
        }

        let reference = signed.get("vnp_TxnRef")
            .cloned()
            .ok_or_else(|| CoreError::PaymentFailed("callback without vnp_TxnRef".to_string()))?;
        let approved = signed.get("vnp_ResponseCode").map(String::as_str) == Some(SUCCESS_CODE);
        let amount = signed.get("vnp_Amount")
            .and_then(|a| a.parse::<i64>().ok())
            .map(|a| a / 100);
        let transaction_id = signed.get("vnp_TransactionNo")
            .filter(|t| !t.is_empty())
            .cloned()
            .unwrap_or_else(|| reference.clone());

        Ok(GatewayOutcome { reference, approved, transaction_id, amount })
    }
}
