use async_trait::async_trait;
use hmac::{Hmac, Mac};
use marquee_core::payment::{GatewayOutcome, GatewayRedirect, GatewayRequest, PaymentGateway, PaymentMethod};
use marquee_core::{CoreError, CoreResult};
use sha2::Sha256;
use std::collections::HashMap;

type HmacSha256 = Hmac<Sha256>;

/// Stand-in provider for development and tests. Callbacks are
/// `reference`, `status` and `signature` = hex HMAC-SHA256 of `reference|status`.
pub struct MockGateway {
    secret: String,
    return_url: String,
}

impl MockGateway {
    pub fn new(secret: &str, return_url: &str) -> Self {
        Self {
            secret: secret.to_string(),
            return_url: return_url.to_string(),
        }
    }

    pub fn reference_for(order_id: &str) -> String {
        format!("mock_{}", order_id)
    }

    fn mac(&self, reference: &str, status: &str) -> CoreResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| CoreError::InternalError("invalid mock gateway secret".to_string()))?;
        mac.update(reference.as_bytes());
        mac.update(b"|");
        mac.update(status.as_bytes());
        Ok(mac)
    }

    /// Signature a well-behaved provider would attach to the callback.
    pub fn sign(&self, reference: &str, status: &str) -> CoreResult<String> {
        Ok(hex::encode(self.mac(reference, status)?.finalize().into_bytes()))
    }

    /// Full callback parameter map for `reference`.
    pub fn callback_params(&self, reference: &str, approved: bool) -> CoreResult<HashMap<String, String>> {
        let status = if approved { "success" } else { "cancelled" };
        Ok(HashMap::from([
            ("reference".to_string(), reference.to_string()),
            ("status".to_string(), status.to_string()),
            ("signature".to_string(), self.sign(reference, status)?),
        ]))
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Mock
    }

    async fn create_payment(&self, request: &GatewayRequest) -> CoreResult<GatewayRedirect> {
        let reference = Self::reference_for(&request.order_id);
        let base = request.return_url.as_deref().unwrap_or(&self.return_url);
        let separator = if base.contains('?') { '&' } else { '?' };
        Ok(GatewayRedirect {
            payment_url: format!("{}{}reference={}", base, separator, urlencoding::encode(&reference)),
            reference,
        })
    }

    async fn verify_callback(&self, params: &HashMap<String, String>) -> CoreResult<GatewayOutcome> {
        let (Some(reference), Some(status), Some(signature)) =
            (params.get("reference"), params.get("status"), params.get("signature"))
        else {
            return Err(CoreError::InvalidSignature);
        };

        let expected = hex::decode(signature).map_err(|_| CoreError::InvalidSignature)?;
        self.mac(reference, status)?
            .verify_slice(&expected)
            .map_err(|_| CoreError::InvalidSignature)?;

        Ok(GatewayOutcome {
            reference: reference.clone(),
            approved: status == "success",
            transaction_id: format!("mocktx_{}", reference),
            amount: None,
        })
    }
}
