use crate::config::ConsumerConfig;
use crate::error::{Error, Result};
use crate::message::Forward;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use std::sync::Arc;
use std::time::Duration;

/// Write side of the broker, as seen by the pipeline.
///
/// `enqueue` hands a record to the producer and returns without awaiting
/// delivery; acknowledgments are handled by the producer's background
/// machinery and joined only through the bounded `flush` at shutdown.
pub trait RecordSink: Send + Sync {
    fn enqueue(&self, topic: &str, key: Option<&[u8]>, payload: &[u8]) -> Result<()>;

    fn flush(&self, timeout: Duration) -> Result<()>;
}

/// [`RecordSink`] backed by an idempotent rdkafka producer.
///
/// Delivery uses acks from all in-sync replicas plus idempotent-producer
/// semantics, so transient retries inside the producer cannot duplicate a
/// forwarded record. This is a producer-level guarantee only, not
/// end-to-end exactly-once across decode, commit and publish.
pub struct KafkaSink {
    producer: FutureProducer,
}

impl KafkaSink {
    pub fn new(config: &ConsumerConfig) -> Result<Self> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &config.brokers)
            .set("client.id", &config.client_id)
            .set("linger.ms", config.linger_ms.to_string())
            .set("compression.type", "lz4")
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set("allow.auto.create.topics", "true");

        if let Some(sasl) = &config.sasl {
            client_config
                .set("security.protocol", &sasl.security_protocol)
                .set("sasl.mechanisms", &sasl.mechanism)
                .set("sasl.username", &sasl.username)
                .set("sasl.password", &sasl.password);
        }

        let producer: FutureProducer = client_config.create()?;

        Ok(Self { producer })
    }
}

impl RecordSink for KafkaSink {
    fn enqueue(&self, topic: &str, key: Option<&[u8]>, payload: &[u8]) -> Result<()> {
        let mut record = FutureRecord::<[u8], [u8]>::to(topic).payload(payload);
        if let Some(key) = key {
            record = record.key(key);
        }

        // Enqueue-and-return; the delivery future is intentionally dropped
        // and completion is observed via the shutdown flush.
        self.producer
            .send_result(record)
            .map_err(|(e, _)| Error::Publish(e.to_string()))?;

        Ok(())
    }

    fn flush(&self, timeout: Duration) -> Result<()> {
        self.producer.flush(timeout)?;
        Ok(())
    }
}

/// Publishes a handler-produced result to its destination topic.
pub struct ResultPublisher<S> {
    sink: Arc<S>,
}

impl<S: RecordSink> ResultPublisher<S> {
    pub fn new(sink: Arc<S>) -> Self {
        Self { sink }
    }

    /// JSON-encode the result payload and enqueue it, keyed if a key was
    /// provided.
    pub fn publish(&self, forward: &Forward) -> Result<()> {
        let payload = serde_json::to_vec(&forward.data).map_err(Error::Encode)?;
        let key = forward.key.as_deref().map(str::as_bytes);

        self.sink.enqueue(&forward.topic, key, &payload)
    }
}
