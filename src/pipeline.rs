use crate::config::{ConsumerConfig, DlqErrorPolicy};
use crate::correlation::{self, MessageContext};
use crate::dlq::DlqRouter;
use crate::error::{Error, Result};
use crate::handler::Handler;
use crate::message::{Forward, Record, TypedMessage};
use crate::publisher::{RecordSink, ResultPublisher};
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

/// Read-position tracker with manual, synchronous commit.
///
/// Implemented over the live consumer connection in production and by
/// capturing doubles in tests.
pub trait CommitLog: Send + Sync {
    fn commit(&self, record: &Record) -> Result<()>;
}

/// Per-record processing: decode, dispatch, resolve.
///
/// Every record ends in exactly one of three terminal outcomes — plain
/// commit, dead-letter routing, or result publish followed by commit. The
/// offset is committed only once the outcome is fully resolved, so a crash
/// mid-processing re-delivers the record on restart (at-least-once).
pub struct Pipeline<T, H, S, C> {
    handler: Arc<H>,
    commits: C,
    dlq: Option<DlqRouter<S>>,
    publisher: Option<ResultPublisher<S>>,
    config: Arc<ConsumerConfig>,
    _payload: PhantomData<fn() -> T>,
}

impl<T, H, S, C> Pipeline<T, H, S, C>
where
    T: DeserializeOwned + Send,
    H: Handler<T>,
    S: RecordSink,
    C: CommitLog,
{
    pub fn new(
        handler: Arc<H>,
        commits: C,
        sink: Option<Arc<S>>,
        config: Arc<ConsumerConfig>,
    ) -> Self {
        let dlq = match (&config.dlq_topic, &sink) {
            (Some(topic), Some(sink)) => Some(DlqRouter::new(
                Arc::clone(sink),
                topic.clone(),
                &config,
            )),
            _ => None,
        };

        let publisher = match sink {
            Some(sink) if config.forward_results => Some(ResultPublisher::new(sink)),
            _ => None,
        };

        Self {
            handler,
            commits,
            dlq,
            publisher,
            config,
            _payload: PhantomData,
        }
    }

    /// Process one record to a terminal outcome.
    ///
    /// Returns `Err` only for failures the consume loop must treat as fatal:
    /// handler errors with no DLQ configured, publish failures, and DLQ
    /// publish failures under the `Fatal` policy.
    pub async fn process(&self, record: &Record) -> Result<()> {
        let ctx = MessageContext {
            correlation_id: correlation::correlation_id(&record.headers),
        };
        let started = Instant::now();

        let outcome = self.resolve(&ctx, record).await;

        tracing::info!(
            correlation_id = %ctx.correlation_id,
            topic = %record.topic,
            partition = record.partition,
            latency_ms = started.elapsed().as_millis() as u64,
            "{}",
            String::from_utf8_lossy(&record.payload),
        );

        outcome
    }

    async fn resolve(&self, ctx: &MessageContext, record: &Record) -> Result<()> {
        let data: T = match serde_json::from_slice(&record.payload) {
            Ok(data) => data,
            Err(e) => {
                let decode_err = Error::Decode(e);
                if let Some(router) = &self.dlq {
                    return self.dead_letter(router, record, &decode_err.to_string());
                }
                tracing::error!(correlation_id = %ctx.correlation_id, "{decode_err}");
                return self.commits.commit(record);
            }
        };

        let msg = TypedMessage {
            data,
            topic: record.topic.clone(),
        };

        let forward = match self.dispatch(ctx, msg).await {
            Ok(forward) => forward,
            Err(e) => {
                if let Some(router) = &self.dlq {
                    return self.dead_letter(router, record, &e.to_string());
                }
                return Err(e);
            }
        };

        // Pure consume/ack when forwarding is off or there is nothing to
        // forward.
        if !self.config.forward_results {
            return self.commits.commit(record);
        }
        let forward = match forward {
            Some(forward) if !forward.topic.is_empty() => forward,
            _ => return self.commits.commit(record),
        };

        let publisher = self
            .publisher
            .as_ref()
            .ok_or_else(|| Error::Publish("result publisher not configured".to_string()))?;

        // No DLQ fallback here: a failed result publish is an infrastructure
        // fault, not bad data.
        publisher.publish(&forward)?;

        self.commits.commit(record)
    }

    async fn dispatch(&self, ctx: &MessageContext, msg: TypedMessage<T>) -> Result<Option<Forward>> {
        let call = self.handler.send(ctx, msg);
        match self.config.handler_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result.map_err(Error::Handler),
                Err(_) => Err(Error::HandlerTimeout(limit)),
            },
            None => call.await.map_err(Error::Handler),
        }
    }

    fn dead_letter(&self, router: &DlqRouter<S>, record: &Record, description: &str) -> Result<()> {
        match router.route(record, description) {
            Ok(()) => self.commits.commit(record),
            Err(e) => match self.config.dlq_error_policy {
                DlqErrorPolicy::Fatal => Err(e),
                DlqErrorPolicy::DropAndCommit => {
                    tracing::error!("{e}; committing record per DLQ error policy");
                    self.commits.commit(record)
                }
            },
        }
    }
}
