use tracing::debug;

use crate::broker::{Channel, QueueHandle};
use crate::utils::Result;

/// Declares the queue a subscription consumes from.
pub struct QueueProvisioner<'a> {
    channel: &'a dyn Channel,
}

impl<'a> QueueProvisioner<'a> {
    pub fn new(channel: &'a dyn Channel) -> Self {
        Self { channel }
    }

    /// Declares `name` with the requested durability and returns its handle.
    ///
    /// An empty `name` yields a fresh broker-generated queue on every call.
    /// Redeclaring an existing queue with the same durability reuses it; a
    /// durability mismatch is rejected by the broker and returned as-is.
    pub async fn provision(&self, name: &str, durable: bool) -> Result<QueueHandle> {
        let handle = self.channel.declare_queue(name, durable).await?;
        debug!(
            requested = name,
            queue = %handle.name,
            durable,
            "queue declared"
        );
        Ok(handle)
    }
}
