use crate::error::{Error, Result};
use std::time::Duration;

/// SASL/TLS credentials for brokers that require authentication.
///
/// All four settings travel together; partial auth is not a supported
/// configuration.
#[derive(Debug, Clone)]
pub struct SaslAuth {
    /// Security protocol, e.g. "SASL_SSL"
    pub security_protocol: String,
    /// SASL mechanism, e.g. "PLAIN"
    pub mechanism: String,
    pub username: String,
    pub password: String,
}

impl SaslAuth {
    /// SASL/PLAIN over SSL, the common managed-Kafka setup.
    pub fn plain(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            security_protocol: "SASL_SSL".to_string(),
            mechanism: "PLAIN".to_string(),
            username: username.into(),
            password: password.into(),
        }
    }
}

/// What to do when publishing to the DLQ itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DlqErrorPolicy {
    /// Abort the consume loop. Dead-lettering is the last line of defense,
    /// so its failure stays visible instead of silently dropping data.
    #[default]
    Fatal,
    /// Log the publish error, commit the record anyway and keep consuming.
    /// One unreachable DLQ cannot take the whole loop down.
    DropAndCommit,
}

/// Configuration for the consumer pipeline.
///
/// Built once at startup and shared read-only by every component created
/// afterwards.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Kafka brokers (comma-separated list)
    pub brokers: String,
    /// Topics to consume from
    pub topics: Vec<String>,
    /// Consumer group ID
    pub group_id: String,
    /// Client ID reported to the broker and stamped into DLQ envelopes
    pub client_id: String,
    /// Session timeout in milliseconds
    pub session_timeout_ms: u32,
    /// Bounded wait for a single poll of the log.
    ///
    /// A poll that expires with no record is not an error; the loop simply
    /// tries again on the next iteration.
    pub poll_timeout: Duration,
    /// Auto offset reset strategy ("earliest" or "latest")
    ///
    /// "earliest" is preferred so that a fresh consumer group does not skip
    /// messages that were published before it first joined.
    pub auto_offset_reset: String,
    /// Dead-letter topic for malformed or failed messages.
    ///
    /// When unset, decode failures are logged and dropped, and handler
    /// failures terminate the loop.
    pub dlq_topic: Option<String>,
    /// Forward handler results to their destination topic.
    ///
    /// When disabled the pipeline is pure consume/ack and handler results
    /// are ignored.
    pub forward_results: bool,
    /// Producer linger in milliseconds
    pub linger_ms: u32,
    /// Optional SASL credentials, applied to both consumer and producer
    pub sasl: Option<SaslAuth>,
    /// Bound on a single handler call.
    ///
    /// `None` means a hung handler blocks the loop indefinitely. When set,
    /// expiry is treated as a handler error and follows the same DLQ /
    /// terminate policy.
    pub handler_timeout: Option<Duration>,
    /// Policy for DLQ publish failures
    pub dlq_error_policy: DlqErrorPolicy,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            topics: vec![],
            group_id: String::new(),
            client_id: "simcon".to_string(),
            session_timeout_ms: 45000,
            poll_timeout: Duration::from_millis(100),
            auto_offset_reset: "earliest".to_string(),
            dlq_topic: None,
            forward_results: false,
            linger_ms: 10,
            sasl: None,
            handler_timeout: None,
            dlq_error_policy: DlqErrorPolicy::Fatal,
        }
    }
}

impl ConsumerConfig {
    /// Validate the snapshot before any broker client is created.
    pub fn validate(&self) -> Result<()> {
        if self.brokers.is_empty() {
            return Err(Error::InvalidConfig("brokers is empty".to_string()));
        }
        if self.topics.is_empty() {
            return Err(Error::InvalidConfig("topics is empty".to_string()));
        }
        if self.group_id.is_empty() {
            return Err(Error::InvalidConfig("group_id is empty".to_string()));
        }
        Ok(())
    }

    /// Whether a producer connection is needed at all.
    ///
    /// The producer serves both the DLQ router and the result publisher, so
    /// it is created when either is in play.
    pub(crate) fn needs_producer(&self) -> bool {
        self.forward_results || self.dlq_topic.is_some()
    }
}
