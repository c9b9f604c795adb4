use async_trait::async_trait;
use metrics::counter;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::producer::{DeliveryFuture, FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use serde_json::Value;
use tracing::{debug, error};

use crate::backends::Backend;
use crate::error::{BackendError, PublishError};
use crate::uri::PublisherSpec;

/// Kafka producer behind the `kafka://` scheme.
///
/// Records are produced as JSON strings to the destination topic. Producing
/// enqueues into librdkafka's own buffer; we then await the broker ACK for
/// every record, so a send only succeeds once the whole batch is on the
/// brokers.
pub struct KafkaBackend {
    producer: FutureProducer,
}

impl KafkaBackend {
    pub fn new(spec: &PublisherSpec) -> Result<KafkaBackend, PublishError> {
        let hosts = spec
            .host_port()
            .ok_or_else(|| PublishError::invalid_target(spec.url.as_str(), "missing broker host"))?;

        let option = |key: &str, default: &str| -> String {
            spec.options
                .get(key)
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };

        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &hosts)
            .set("linger.ms", option("linger_ms", "20"))
            .set("message.timeout.ms", option("message_timeout_ms", "20000"))
            .set("compression.codec", option("compression_codec", "none"));

        debug!("rdkafka configuration: {:?}", client_config);
        let producer: FutureProducer = client_config
            .create()
            .map_err(|e| PublishError::invalid_target(spec.url.as_str(), e))?;

        Ok(KafkaBackend { producer })
    }

    async fn process_ack(delivery: DeliveryFuture) -> Result<(), BackendError> {
        match delivery.await {
            Err(_) => {
                // Cancelled due to timeout while retrying
                counter!("publisher_kafka_produce_errors_total").increment(1);
                error!("failed to produce to Kafka before write timeout");
                Err(BackendError::Unavailable("produce timeout".to_string()))
            }
            Ok(Err((KafkaError::MessageProduction(RDKafkaErrorCode::MessageSizeTooLarge), _))) => {
                Err(BackendError::Rejected("message too large".to_string()))
            }
            Ok(Err((err, _))) => {
                counter!("publisher_kafka_produce_errors_total").increment(1);
                error!("failed to produce to Kafka: {}", err);
                Err(BackendError::Unavailable(err.to_string()))
            }
            Ok(Ok(_)) => Ok(()),
        }
    }
}

#[async_trait]
impl Backend for KafkaBackend {
    async fn send(&self, destination: &str, batch: &[Value]) -> Result<(), BackendError> {
        let mut acks = Vec::with_capacity(batch.len());
        for record in batch {
            let payload = record.to_string();
            // Await send_result to get records into the producer queue in order
            let ack = self
                .producer
                .send_result(FutureRecord::<(), _>::to(destination).payload(&payload))
                .map_err(|(err, _)| {
                    error!("failed to enqueue record for Kafka: {}", err);
                    BackendError::Unavailable(err.to_string())
                })?;
            acks.push(ack);
        }

        for ack in acks {
            Self::process_ack(ack).await?;
        }
        counter!("publisher_records_sent_total", "backend" => "kafka")
            .increment(batch.len() as u64);
        Ok(())
    }
}
