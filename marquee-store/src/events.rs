use async_trait::async_trait;
use marquee_core::events::BookingEventPublisher;
use marquee_core::{CoreError, CoreResult};
use marquee_shared::BookingConfirmedEvent;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{error, info};

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
    booking_confirmed_topic: String,
}

impl EventProducer {
    pub fn new(brokers: &str, booking_confirmed_topic: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .create()?;

        Ok(Self {
            producer,
            booking_confirmed_topic: booking_confirmed_topic.to_string(),
        })
    }

    pub async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic)
            .key(key)
            .payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                let partition = delivery.partition;
                let offset = delivery.offset;
                info!("Sent message to {}/{}: partition {} offset {}", topic, key, partition, offset);
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", topic, e);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl BookingEventPublisher for EventProducer {
    async fn publish_booking_confirmed(&self, event: &BookingConfirmedEvent) -> CoreResult<()> {
        let payload = serde_json::to_string(event)?;
        // Keyed by order id so redeliveries of one order stay on one partition
        self.publish(&self.booking_confirmed_topic, &event.order_id, &payload)
            .await
            .map_err(|e| CoreError::StoreError(format!("kafka publish failed: {}", e)))
    }
}
