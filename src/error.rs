use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("decode message error: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("encode message error: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("send message error: {0}")]
    Handler(#[source] anyhow::Error),

    #[error("handler timed out after {0:?}")]
    HandlerTimeout(Duration),

    #[error("produce message error: {0}")]
    Publish(String),

    #[error("produce to DLQ error: {0}")]
    DlqPublish(String),

    #[error("consumer error: {0}")]
    Consumer(String),

    #[error("healthz server error: {0}")]
    Healthz(#[from] tonic::transport::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
