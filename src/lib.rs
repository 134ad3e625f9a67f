//! Simple Kafka consumer pipeline.
//!
//! Pulls records from a set of topics, decodes each value as JSON into a
//! typed payload, hands it to an injected handler, and resolves the outcome
//! through one of three paths: commit, dead-letter routing, or forwarding a
//! derived result to a downstream topic.
//!
//! Features:
//!
//! - Manual offsets: a record's offset is committed only after its outcome
//!   is fully resolved, giving at-least-once delivery
//! - DLQ routing: malformed or failed messages are wrapped in an envelope
//!   and published to a configurable dead-letter topic
//! - Result forwarding: handler results are published to their destination
//!   topic with an idempotent producer
//! - Correlation: a correlation id is propagated from the record headers,
//!   or generated when absent, and handed to the handler
//! - Healthz: a gRPC health endpoint served independently of the pipeline
//!
//! # Usage
//!
//! ```rust,no_run
//! use simcon::{
//!     shutdown_on_signals, Consumer, ConsumerConfig, Forward, Handler, MessageContext,
//!     TypedMessage,
//! };
//!
//! #[derive(serde::Deserialize)]
//! struct Order {
//!     id: String,
//! }
//!
//! struct OrderHandler;
//!
//! #[async_trait::async_trait]
//! impl Handler<Order> for OrderHandler {
//!     async fn send(
//!         &self,
//!         _ctx: &MessageContext,
//!         msg: TypedMessage<Order>,
//!     ) -> anyhow::Result<Option<Forward>> {
//!         Ok(Some(Forward::new(
//!             "next",
//!             Some(msg.data.id.clone()),
//!             serde_json::json!({ "id": msg.data.id }),
//!         )))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConsumerConfig {
//!         brokers: "localhost:9092".to_string(),
//!         topics: vec!["orders".to_string()],
//!         group_id: "order-group".to_string(),
//!         forward_results: true,
//!         ..Default::default()
//!     };
//!
//!     let consumer = Consumer::new(config, OrderHandler)?;
//!     consumer.consume(shutdown_on_signals()).await?;
//!     Ok(())
//! }
//! ```

pub mod config;

/// Consume loop with bounded polling, panic containment and shutdown flush
pub mod consumer;
pub mod correlation;

/// Dead-letter routing for malformed or failed messages
pub mod dlq;
pub mod error;
pub mod handler;

/// gRPC health endpoint
pub mod healthz;

/// Record and envelope types
pub mod message;

/// Per-record decode/dispatch/resolve state machine
pub mod pipeline;
pub mod publisher;

// Re-export main types for easy access
pub use config::{ConsumerConfig, DlqErrorPolicy, SaslAuth};
pub use consumer::{shutdown_on_signals, Consumer};
pub use correlation::{MessageContext, CORRELATION_HEADER};
pub use dlq::DlqRouter;
pub use error::{Error, Result};
pub use handler::Handler;
pub use healthz::{
    health_service, spawn_healthz_server, spawn_healthz_server_with_interceptor, Healthz,
};
pub use message::{DlqEnvelope, Forward, Record, TypedMessage};
pub use pipeline::{CommitLog, Pipeline};
pub use publisher::{KafkaSink, RecordSink, ResultPublisher};
