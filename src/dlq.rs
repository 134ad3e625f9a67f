use crate::config::ConsumerConfig;
use crate::error::{Error, Result};
use crate::message::{DlqEnvelope, Record};
use crate::publisher::RecordSink;
use std::sync::Arc;

/// Routes terminally failed records to the dead-letter topic.
pub struct DlqRouter<S> {
    sink: Arc<S>,
    topic: String,
    client_id: String,
    group_id: String,
}

impl<S: RecordSink> DlqRouter<S> {
    pub fn new(sink: Arc<S>, topic: String, config: &ConsumerConfig) -> Self {
        Self {
            sink,
            topic,
            client_id: config.client_id.clone(),
            group_id: config.group_id.clone(),
        }
    }

    /// Wrap the failed record in a [`DlqEnvelope`] and publish it, unkeyed.
    ///
    /// The caller commits the original record's offset once this returns
    /// `Ok`; the failure is then considered handled rather than pending.
    pub fn route(&self, record: &Record, description: &str) -> Result<()> {
        let envelope = DlqEnvelope {
            topic: record.topic.clone(),
            client_id: self.client_id.clone(),
            group_id: self.group_id.clone(),
            message: String::from_utf8_lossy(&record.payload).into_owned(),
            description: description.to_string(),
        };

        let payload = serde_json::to_vec(&envelope).map_err(Error::Encode)?;

        self.sink
            .enqueue(&self.topic, None, &payload)
            .map_err(|e| Error::DlqPublish(e.to_string()))
    }
}
