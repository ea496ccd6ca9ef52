use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use super::codec::Payload;

/// Processes one decoded payload.
///
/// Deliveries are auto-acknowledged, so an `Err` does not bring the message
/// back; the dispatcher logs it and keeps consuming.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, payload: Payload) -> anyhow::Result<()>;
}

/// Adapts an async closure into a [`Handler`]. Built by [`handler_fn`].
pub struct HandlerFn<F>(F);

/// Wraps `f` so it can be stored in a [`SubscriptionDefinition`].
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Payload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    HandlerFn(f)
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Payload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, payload: Payload) -> anyhow::Result<()> {
        (self.0)(payload).await
    }
}

/// Declares what to listen on and what to run for every message.
///
/// Defaults follow the usual RabbitMQ conventions: an empty queue name lets
/// the broker pick one, queues are transient and nothing is bound.
#[derive(Clone)]
pub struct SubscriptionDefinition {
    name: String,
    queue: String,
    durable: bool,
    bind: Option<String>,
    handler: Arc<dyn Handler>,
}

impl SubscriptionDefinition {
    /// `name` identifies the definition inside a registry; it is not a queue name.
    pub fn new(name: impl Into<String>, handler: impl Handler) -> Self {
        Self {
            name: name.into(),
            queue: String::new(),
            durable: false,
            bind: None,
            handler: Arc::new(handler),
        }
    }

    pub fn queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    pub fn durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    /// Binds the queue to the direct exchange `exchange`, creating it if needed.
    pub fn bind(mut self, exchange: impl Into<String>) -> Self {
        self.bind = Some(exchange.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn queue_name(&self) -> &str {
        &self.queue
    }

    pub fn is_durable(&self) -> bool {
        self.durable
    }

    pub fn binding_target(&self) -> Option<&str> {
        self.bind.as_deref()
    }

    pub fn handler(&self) -> Arc<dyn Handler> {
        self.handler.clone()
    }
}

impl fmt::Debug for SubscriptionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionDefinition")
            .field("name", &self.name)
            .field("queue", &self.queue)
            .field("durable", &self.durable)
            .field("bind", &self.bind)
            .field("handler", &"dyn Handler")
            .finish()
    }
}
