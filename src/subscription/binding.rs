use tracing::{debug, info};

use crate::broker::{Channel, Connection, ExchangeKind, QueueHandle};
use crate::utils::Result;

/// Ensures a direct exchange exists and binds a queue to it.
pub struct BindingResolver<'a> {
    channel: &'a dyn Channel,
    connection: &'a dyn Connection,
}

impl<'a> BindingResolver<'a> {
    pub fn new(channel: &'a dyn Channel, connection: &'a dyn Connection) -> Self {
        Self {
            channel,
            connection,
        }
    }

    /// Binds `handle` to the exchange named `target`, routing key `target`.
    ///
    /// `None` or an empty target is a no-op. An exchange that already exists
    /// is never redeclared, whatever its type; a missing one is declared as
    /// `direct`. The existence check and the declare are not atomic.
    pub async fn resolve(&self, handle: &QueueHandle, target: Option<&str>) -> Result<()> {
        let Some(target) = target.filter(|t| !t.is_empty()) else {
            debug!(queue = %handle.name, "no binding target, skipping");
            return Ok(());
        };

        if !self.connection.exchange_exists(target).await? {
            info!(exchange = target, "declaring direct exchange");
            self.channel
                .declare_exchange(target, ExchangeKind::Direct)
                .await?;
        }

        self.channel.bind_queue(handle, target, target).await?;
        debug!(queue = %handle.name, exchange = target, "queue bound");
        Ok(())
    }
}
