use std::collections::HashMap;
use uuid::Uuid;

/// Header key carrying the correlation id across services.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Per-message context handed to the handler.
///
/// Carries the correlation id so downstream calls and log lines can be tied
/// back to the originating record.
#[derive(Debug, Clone)]
pub struct MessageContext {
    pub correlation_id: String,
}

/// Resolve the correlation id for a record's header map.
///
/// A present, non-empty header value is propagated unchanged; otherwise a
/// fresh time-ordered UUID (v7) is generated. The input is never mutated.
pub fn correlation_id(headers: &HashMap<String, String>) -> String {
    match headers.get(CORRELATION_HEADER) {
        Some(value) if !value.is_empty() => value.clone(),
        _ => Uuid::now_v7().to_string(),
    }
}
