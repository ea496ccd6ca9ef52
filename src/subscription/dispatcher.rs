use std::sync::Arc;

use futures::FutureExt;
use tracing::{error, trace};

use super::codec::decode;
use super::definition::Handler;
use crate::broker::{Channel, ConsumerTag, Delivery, DeliveryCallback, QueueHandle};
use crate::utils::Result;

/// Connects a queue's deliveries to a handler.
pub struct Dispatcher<'a> {
    channel: &'a dyn Channel,
}

impl<'a> Dispatcher<'a> {
    pub fn new(channel: &'a dyn Channel) -> Self {
        Self { channel }
    }

    /// Registers a consumer on `handle` and returns once the broker accepted it.
    ///
    /// Each delivery is decoded and passed to `handler` on the broker client's
    /// own tasks. Handler errors are logged; nothing is retried or requeued.
    pub async fn attach(
        &self,
        handle: &QueueHandle,
        handler: Arc<dyn Handler>,
    ) -> Result<ConsumerTag> {
        let queue = handle.name.clone();
        let callback: DeliveryCallback = Arc::new(move |delivery: Delivery| {
            let handler = handler.clone();
            let queue = queue.clone();
            async move {
                let tag = delivery.info.delivery_tag;
                trace!(
                    queue = %queue,
                    delivery_tag = tag,
                    bytes = delivery.body.len(),
                    "delivery received"
                );
                let payload = decode(&delivery.body);
                if let Err(err) = handler.handle(payload).await {
                    error!(queue = %queue, delivery_tag = tag, error = %err, "handler failed");
                }
            }
            .boxed()
        });

        self.channel.consume(handle, callback).await
    }
}
