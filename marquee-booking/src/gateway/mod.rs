pub mod mock;
pub mod paypal;
pub mod vnpay;

pub use mock::MockGateway;
pub use paypal::PayPalGateway;
pub use vnpay::VnPayGateway;

use marquee_core::payment::{PaymentGateway, PaymentMethod};
use marquee_core::{CoreError, CoreResult};
use std::collections::HashMap;
use std::sync::Arc;

/// One configured gateway per payment method.
#[derive(Clone, Default)]
pub struct GatewayRegistry {
    gateways: HashMap<PaymentMethod, Arc<dyn PaymentGateway>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, gateway: Arc<dyn PaymentGateway>) {
        self.gateways.insert(gateway.method(), gateway);
    }

    pub fn with(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.register(gateway);
        self
    }

    /// Parse a method name (case-insensitive) and find its gateway.
    pub fn resolve(&self, method: &str) -> CoreResult<(PaymentMethod, Arc<dyn PaymentGateway>)> {
        let method: PaymentMethod = method.parse()?;
        let gateway = self.gateways.get(&method)
            .cloned()
            .ok_or_else(|| CoreError::PaymentFailed(format!("payment method {} is not configured", method)))?;
        Ok((method, gateway))
    }

    pub fn methods(&self) -> Vec<PaymentMethod> {
        self.gateways.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_method_fails_as_payment_failure() {
        let registry = GatewayRegistry::new()
            .with(Arc::new(MockGateway::new("secret", "http://localhost/return")));

        let (method, _) = registry.resolve("MOCK").unwrap();
        assert_eq!(method, PaymentMethod::Mock);

        assert!(matches!(registry.resolve("vnpay"), Err(CoreError::PaymentFailed(_))));
        assert!(matches!(registry.resolve("bitcoin"), Err(CoreError::PaymentFailed(_))));
    }
}
