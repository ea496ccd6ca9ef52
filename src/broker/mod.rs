//! The `broker` module describes what `hare` needs from a message broker.
//!
//! Subscriptions never talk to a client library directly. They go through the
//! [`Channel`] and [`Connection`] traits defined here, which the `amqp` module
//! implements on top of `lapin` and the `memory` module implements in-process.
//!
//! Connection setup, authentication and reconnects belong to whoever builds
//! those trait objects; this module only consumes an established channel.

pub mod amqp;
pub mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::utils::Result;

pub use amqp::AmqpSession;
pub use memory::InMemoryBroker;

/// Reference to a queue owned by the broker.
///
/// `name` is the resolved name: the requested one, or the one the broker
/// generated when an empty name was declared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueHandle {
    pub name: String,
    pub durable: bool,
}

impl QueueHandle {
    pub fn new(name: impl Into<String>, durable: bool) -> Self {
        Self {
            name: name.into(),
            durable,
        }
    }
}

/// Exchange types `hare` declares. Only direct routing is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    Direct,
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeKind::Direct => f.write_str("direct"),
        }
    }
}

pub type ConsumerTag = String;

/// Where a delivery came from. Not read by the codec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryInfo {
    pub delivery_tag: u64,
    pub exchange: String,
    pub routing_key: String,
    pub redelivered: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageProperties {
    pub content_type: Option<String>,
    pub message_id: Option<String>,
}

/// One message handed to a consumer callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub info: DeliveryInfo,
    pub properties: MessageProperties,
    pub body: Vec<u8>,
}

/// Invoked by the broker client for every delivery on a consumed queue.
pub type DeliveryCallback = Arc<dyn Fn(Delivery) -> BoxFuture<'static, ()> + Send + Sync>;

/// Operations issued on the shared communication channel.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Declares a queue. An empty `name` asks the broker for a unique one.
    async fn declare_queue(&self, name: &str, durable: bool) -> Result<QueueHandle>;

    async fn declare_exchange(&self, name: &str, kind: ExchangeKind) -> Result<()>;

    async fn bind_queue(
        &self,
        queue: &QueueHandle,
        exchange: &str,
        routing_key: &str,
    ) -> Result<()>;

    /// Starts consuming `queue`, returning as soon as the consumer is registered.
    async fn consume(
        &self,
        queue: &QueueHandle,
        callback: DeliveryCallback,
    ) -> Result<ConsumerTag>;
}

/// Connection-level queries that must not disturb the shared channel.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn exchange_exists(&self, name: &str) -> Result<bool>;
}

#[cfg(test)]
mod tests;
