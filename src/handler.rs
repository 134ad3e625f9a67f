use crate::correlation::MessageContext;
use crate::message::{Forward, TypedMessage};
use async_trait::async_trait;

/// The injected business-logic capability.
///
/// One handler serves every configured topic; `TypedMessage::topic` tells it
/// which one a message came from. Returning `Ok(None)` acknowledges the
/// message with no side output; returning a [`Forward`] asks the pipeline to
/// publish a derived result downstream (honored only when result forwarding
/// is enabled). An `Err` is a handler failure and is routed to the DLQ when
/// one is configured, otherwise it terminates the consume loop.
#[async_trait]
pub trait Handler<T>: Send + Sync {
    async fn send(
        &self,
        ctx: &MessageContext,
        msg: TypedMessage<T>,
    ) -> anyhow::Result<Option<Forward>>;
}
