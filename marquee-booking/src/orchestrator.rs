use chrono::Utc;
use marquee_core::keys;
use marquee_core::lease::LeaseStore;
use marquee_core::payment::{GatewayRequest, PaymentIntentRecord, PaymentSettlement};
use marquee_core::repository::CatalogRepository;
use marquee_core::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::committer::BookingCommitter;
use crate::gateway::GatewayRegistry;
use crate::lease_manager::{validate_seat_list, SeatLeaseManager};

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequest {
    pub show_id: i64,
    pub seat_numbers: Vec<String>,
    pub user_id: String,
    pub payment_method: String,
    pub return_url: Option<String>,
    pub client_ip: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PaymentCreated {
    pub payment_url: String,
    pub order_id: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CallbackResult {
    pub success: bool,
    pub booking_id: i64,
    pub order_id: String,
    pub message: String,
}

/// Drives a payment from "seats are held" to either a committed booking or
/// released seats.
pub struct PaymentOrchestrator {
    leases: Arc<SeatLeaseManager>,
    store: Arc<dyn LeaseStore>,
    catalog: Arc<dyn CatalogRepository>,
    committer: Arc<BookingCommitter>,
    gateways: GatewayRegistry,
    intent_ttl: Duration,
}

impl PaymentOrchestrator {
    pub fn new(
        leases: Arc<SeatLeaseManager>,
        store: Arc<dyn LeaseStore>,
        catalog: Arc<dyn CatalogRepository>,
        committer: Arc<BookingCommitter>,
        gateways: GatewayRegistry,
        intent_ttl: Duration,
    ) -> Self {
        Self { leases, store, catalog, committer, gateways, intent_ttl }
    }

    /// Every seat must be held, and held by `user_id`.
    pub async fn validate_seats_held(&self, show_id: i64, seat_numbers: &[String], user_id: &str) -> CoreResult<()> {
        for seat in seat_numbers {
            match self.leases.holder(show_id, seat).await? {
                Some(holder) if holder == user_id => {}
                other => {
                    warn!(
                        "Payment refused: show {} seat {} held by {:?}, requested by {}",
                        show_id, seat, other, user_id
                    );
                    return Err(CoreError::SeatNotAvailable(seat.clone()));
                }
            }
        }
        Ok(())
    }

    pub async fn initiate(&self, request: &PaymentRequest) -> CoreResult<PaymentCreated> {
        validate_seat_list(&request.seat_numbers)?;
        let (method, gateway) = self.gateways.resolve(&request.payment_method)?;

        self.validate_seats_held(request.show_id, &request.seat_numbers, &request.user_id).await?;

        let show = self.catalog.find_show(request.show_id).await?
            .ok_or_else(|| CoreError::not_found("show", request.show_id))?;
        let amount = show.price * request.seat_numbers.len() as i64;
        let order_id = Uuid::new_v4().to_string();

        let redirect = gateway.create_payment(&GatewayRequest {
            order_id: order_id.clone(),
            show_id: request.show_id,
            seat_numbers: request.seat_numbers.clone(),
            amount,
            return_url: request.return_url.clone(),
            client_ip: request.client_ip.clone(),
        }).await?;

        let intent = PaymentIntentRecord {
            order_id: order_id.clone(),
            gateway_reference: redirect.reference.clone(),
            show_id: request.show_id,
            user_id: request.user_id.clone(),
            seat_numbers: request.seat_numbers.clone(),
            amount,
            payment_method: method,
            created_at: Utc::now(),
        };
        let key = keys::payment_intent(method.as_str(), &redirect.reference);
        let ttl = gateway.intent_ttl().unwrap_or(self.intent_ttl);
        self.store.put_with_ttl(&key, &serde_json::to_string(&intent)?, ttl).await?;

        info!(
            "Payment {} initiated via {} for show {} seats {:?} amount {}",
            order_id, method, request.show_id, request.seat_numbers, amount
        );
        Ok(PaymentCreated { payment_url: redirect.payment_url, order_id, amount })
    }

    /// Put a consumed intent back so the gateway's retry of a settled payment
    /// can still be committed.
    async fn restore_intent(&self, key: &str, raw: &str, order_id: &str, ttl: Duration) {
        match self.store.put_with_ttl(key, raw, ttl).await {
            Ok(()) => warn!("Payment intent for order {} restored for a callback retry", order_id),
            Err(e) => error!(
                "Settled payment {} has no booking and its intent could not be restored: {}",
                order_id, e
            ),
        }
    }

    /// Verify, consume the intent exactly once, then commit or unlock.
    /// A commit failure other than a duplicate order hands the intent back.
    pub async fn handle_callback(&self, method: &str, params: &HashMap<String, String>) -> CoreResult<CallbackResult> {
        let (method, gateway) = self.gateways.resolve(method)?;
        let outcome = gateway.verify_callback(params).await?;

        let key = keys::payment_intent(method.as_str(), &outcome.reference);
        let raw = self.store.take(&key).await?
            .ok_or_else(|| CoreError::PaymentNotFound(outcome.reference.clone()))?;
        let intent: PaymentIntentRecord = serde_json::from_str(&raw)?;

        let settled_amount_mismatch = outcome.amount.is_some_and(|a| a != intent.amount);
        if !outcome.approved || settled_amount_mismatch {
            let released = self.leases
                .release_all(intent.show_id, &intent.seat_numbers, &intent.user_id)
                .await;
            warn!(
                "Payment {} not settled (approved: {}, amount {:?} vs {}), released {:?}",
                intent.order_id, outcome.approved, outcome.amount, intent.amount, released
            );
            return Err(CoreError::PaymentFailed(intent.order_id));
        }

        let order_id = intent.order_id.clone();
        let settlement = PaymentSettlement::from_intent(intent, outcome.transaction_id);
        let booking = match self.committer.commit(&settlement).await {
            Ok(booking) => booking,
            // A booking for this order exists already; nothing to retry
            Err(e @ CoreError::AlreadyBooked(_)) => return Err(e),
            Err(e) => {
                error!("Settled payment {} could not be committed: {}", order_id, e);
                let ttl = gateway.intent_ttl().unwrap_or(self.intent_ttl);
                self.restore_intent(&key, &raw, &order_id, ttl).await;
                return Err(e);
            }
        };

        Ok(CallbackResult {
            success: true,
            booking_id: booking.id,
            order_id,
            message: "Booking confirmed".to_string(),
        })
    }
}
