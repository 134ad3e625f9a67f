use crate::config::ConsumerConfig;
use crate::error::{Error, Result};
use crate::handler::Handler;
use crate::message::Record;
use crate::pipeline::{CommitLog, Pipeline};
use crate::publisher::{KafkaSink, RecordSink};
use futures::FutureExt;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer as RdkafkaConsumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Headers, Message};
use rdkafka::{Offset, TopicPartitionList};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Bounded wait for produced-but-unflushed records on loop exit.
const SHUTDOWN_FLUSH_TIMEOUT: Duration = Duration::from_secs(60);

/// [`CommitLog`] over the live consumer connection.
///
/// Commits are manual and synchronous, so no record's offset advances while
/// its outcome is still undetermined.
struct KafkaCommits {
    consumer: Arc<StreamConsumer>,
}

impl CommitLog for KafkaCommits {
    fn commit(&self, record: &Record) -> Result<()> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(&record.topic, record.partition, Offset::Offset(record.offset + 1))
            .map_err(|e| Error::Consumer(format!("failed to add partition offset: {e}")))?;

        self.consumer
            .commit(&tpl, CommitMode::Sync)
            .map_err(|e| Error::Consumer(format!("failed to commit offset: {e}")))?;

        Ok(())
    }
}

/// Single-worker Kafka consumer driving the per-record pipeline.
///
/// Records are processed strictly sequentially; scaling out means running
/// more instances in the same consumer group and letting the broker balance
/// partitions across them.
pub struct Consumer<T, H> {
    consumer: Arc<StreamConsumer>,
    sink: Option<Arc<KafkaSink>>,
    pipeline: Pipeline<T, H, KafkaSink, KafkaCommits>,
    config: Arc<ConsumerConfig>,
}

impl<T, H> Consumer<T, H>
where
    T: DeserializeOwned + Send,
    H: Handler<T>,
{
    /// Create a new consumer and, when DLQ routing or result forwarding is
    /// configured, the producer connection that serves them.
    ///
    /// Fails before any client is created if the configuration is invalid.
    pub fn new(config: ConsumerConfig, handler: H) -> Result<Self> {
        config.validate()?;

        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &config.brokers)
            .set("client.id", &config.client_id)
            .set("group.id", &config.group_id)
            .set("session.timeout.ms", config.session_timeout_ms.to_string())
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("enable.auto.commit", "false")
            .set("enable.partition.eof", "false");

        if let Some(sasl) = &config.sasl {
            client_config
                .set("security.protocol", &sasl.security_protocol)
                .set("sasl.mechanisms", &sasl.mechanism)
                .set("sasl.username", &sasl.username)
                .set("sasl.password", &sasl.password);
        }

        let consumer: StreamConsumer = client_config.create()?;
        let consumer = Arc::new(consumer);

        let sink = if config.needs_producer() {
            Some(Arc::new(KafkaSink::new(&config)?))
        } else {
            None
        };

        let config = Arc::new(config);
        let pipeline = Pipeline::new(
            Arc::new(handler),
            KafkaCommits {
                consumer: Arc::clone(&consumer),
            },
            sink.clone(),
            Arc::clone(&config),
        );

        Ok(Self {
            consumer,
            sink,
            pipeline,
            config,
        })
    }

    /// Run the consume loop until the token is cancelled, a fatal pipeline
    /// error occurs, or processing panics.
    ///
    /// All three exits converge on the same cleanup: pending produced
    /// records are flushed with a bounded wait before returning. A panic is
    /// contained and logged; it never crashes the process.
    pub async fn consume(&self, shutdown: CancellationToken) -> Result<()> {
        let topics: Vec<&str> = self.config.topics.iter().map(String::as_str).collect();
        self.consumer
            .subscribe(&topics)
            .map_err(|e| Error::Consumer(format!("failed to subscribe to topics: {e}")))?;

        let exit = self.poll_loop(&shutdown).await;

        if let Err(e) = &exit {
            tracing::error!("{e}");
        }

        if let Some(sink) = &self.sink {
            tracing::info!("flushing producer");
            if let Err(e) = sink.flush(SHUTDOWN_FLUSH_TIMEOUT) {
                tracing::error!("producer flush failed: {e}");
            }
            tracing::info!("flushing done");
        }

        exit
    }

    async fn poll_loop(&self, shutdown: &CancellationToken) -> Result<()> {
        loop {
            // Cancellation takes effect only at iteration boundaries; an
            // in-flight record is never interrupted mid-processing.
            if shutdown.is_cancelled() {
                tracing::warn!("caught termination signal: terminating");
                return Ok(());
            }

            let msg = match tokio::time::timeout(self.config.poll_timeout, self.consumer.recv())
                .await
            {
                // Poll expired with no record; try again.
                Err(_) => continue,
                Ok(Err(e)) => return Err(Error::Kafka(e)),
                Ok(Ok(msg)) => msg,
            };

            let record = owned_record(&msg);

            match AssertUnwindSafe(self.pipeline.process(&record)).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(e),
                Err(panic) => {
                    tracing::error!("recovered from panic: {}", panic_message(&panic));
                    return Ok(());
                }
            }
        }
    }

    /// Release the broker connections.
    pub fn close(self) -> Result<()> {
        self.consumer
            .unsubscribe();
        Ok(())
    }
}

/// Detach a borrowed broker message into an owned [`Record`].
fn owned_record(msg: &BorrowedMessage<'_>) -> Record {
    let mut headers = HashMap::new();
    if let Some(raw) = msg.headers() {
        for header in raw.iter() {
            let value = header
                .value
                .map(|v| String::from_utf8_lossy(v).into_owned())
                .unwrap_or_default();
            headers.insert(header.key.to_string(), value);
        }
    }

    Record {
        topic: msg.topic().to_string(),
        partition: msg.partition(),
        offset: msg.offset(),
        key: msg.key().map(|k| k.to_vec()),
        payload: msg.payload().map(|p| p.to_vec()).unwrap_or_default(),
        headers,
        timestamp: msg.timestamp().to_millis(),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Cancellation token wired to the process termination signals.
///
/// Interrupt (Ctrl-C) and terminate both cancel the returned token; the
/// consume loop observes it once per iteration and exits cleanly.
pub fn shutdown_on_signals() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.cancel();
    });

    token
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            tracing::error!("failed to install terminate handler: {e}");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for interrupt: {e}");
            }
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::warn!("caught interrupt signal"),
        _ = terminate.recv() => tracing::warn!("caught terminate signal"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for interrupt: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::MessageContext;
    use crate::message::{Forward, TypedMessage};
    use async_trait::async_trait;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Payload {}

    struct NoopHandler;

    #[async_trait]
    impl Handler<Payload> for NoopHandler {
        async fn send(
            &self,
            _ctx: &MessageContext,
            _msg: TypedMessage<Payload>,
        ) -> anyhow::Result<Option<Forward>> {
            Ok(None)
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = ConsumerConfig::default();
        let err = Consumer::new(config, NoopHandler).err().unwrap();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_new_with_valid_config() {
        // Client creation does not contact the broker, so this succeeds
        // without a running cluster.
        let config = ConsumerConfig {
            topics: vec!["orders".to_string()],
            group_id: "group".to_string(),
            ..Default::default()
        };
        let consumer = Consumer::new(config, NoopHandler).unwrap();
        assert!(consumer.sink.is_none());
    }

    #[tokio::test]
    async fn test_new_creates_producer_for_dlq_only() {
        let config = ConsumerConfig {
            topics: vec!["orders".to_string()],
            group_id: "group".to_string(),
            dlq_topic: Some("orders-dlq".to_string()),
            ..Default::default()
        };
        let consumer = Consumer::new(config, NoopHandler).unwrap();
        assert!(consumer.sink.is_some());
    }

    #[tokio::test]
    async fn test_cancelled_token_exits_before_polling() {
        let config = ConsumerConfig {
            topics: vec!["orders".to_string()],
            group_id: "group".to_string(),
            ..Default::default()
        };
        let consumer = Consumer::new(config, NoopHandler).unwrap();

        let shutdown = CancellationToken::new();
        shutdown.cancel();

        consumer.consume(shutdown).await.unwrap();
    }

    #[test]
    fn test_panic_message_formats() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");

        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom".to_string());
        assert_eq!(panic_message(boxed.as_ref()), "boom");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(42_u32);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic payload");
    }
}
