//! In-process broker implementing [`Channel`] and [`Connection`].
//!
//! It mirrors the RabbitMQ behaviour subscriptions depend on: server-named
//! queues, precondition failures on conflicting redeclares, idempotent
//! bindings, direct routing by exact key and FIFO delivery per queue. Call
//! counters let tests assert how many broker round-trips a step issued.
//!
//! Every queue with a consumer owns one delivery task. Publishing only
//! enqueues onto that task under the state lock, so callbacks run one at a
//! time in arrival order and neither `publish` nor `consume` waits on them.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::trace;
use uuid::Uuid;

use super::{
    Channel, Connection, ConsumerTag, Delivery, DeliveryCallback, DeliveryInfo, ExchangeKind,
    MessageProperties, QueueHandle,
};
use crate::utils::{HareError, Result};

type Outbox = mpsc::UnboundedSender<(DeliveryCallback, Delivery)>;

#[derive(Default)]
struct QueueState {
    durable: bool,
    consumers: Vec<(ConsumerTag, DeliveryCallback)>,
    /// Messages that arrived before anyone consumed the queue.
    backlog: VecDeque<Delivery>,
    /// Feeds the queue's delivery task once a consumer exists.
    outbox: Option<Outbox>,
    next_consumer: usize,
}

impl QueueState {
    /// Hands `delivery` to the next consumer, or parks it in the backlog.
    fn enqueue(&mut self, delivery: Delivery) {
        let Some(outbox) = self.outbox.as_ref().filter(|_| !self.consumers.is_empty()) else {
            self.backlog.push_back(delivery);
            return;
        };
        let idx = self.next_consumer % self.consumers.len();
        self.next_consumer = self.next_consumer.wrapping_add(1);
        let callback = self.consumers[idx].1.clone();
        if let Err(mpsc::error::SendError((_, delivery))) = outbox.send((callback, delivery)) {
            self.backlog.push_back(delivery);
        }
    }

    fn start_delivery(&mut self, queue: &str) {
        if self.outbox.is_some() {
            return;
        }
        let (tx, mut rx) = mpsc::unbounded_channel::<(DeliveryCallback, Delivery)>();
        let queue = queue.to_string();
        tokio::spawn(async move {
            while let Some((callback, delivery)) = rx.recv().await {
                trace!(queue = %queue, tag = delivery.info.delivery_tag, "delivering");
                callback(delivery).await;
            }
        });
        self.outbox = Some(tx);
    }
}

#[derive(Default)]
struct State {
    queues: HashMap<String, QueueState>,
    exchanges: HashMap<String, ExchangeKind>,
    bindings: HashSet<(String, String, String)>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub declare_queue: usize,
    pub declare_exchange: usize,
    pub exchange_exists: usize,
    pub bind_queue: usize,
    pub consume: usize,
}

#[derive(Default)]
pub struct InMemoryBroker {
    state: Mutex<State>,
    delivery_tag: AtomicU64,
    declare_queue: AtomicUsize,
    declare_exchange: AtomicUsize,
    exchange_exists: AtomicUsize,
    bind_queue: AtomicUsize,
    consume: AtomicUsize,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            declare_queue: self.declare_queue.load(Ordering::SeqCst),
            declare_exchange: self.declare_exchange.load(Ordering::SeqCst),
            exchange_exists: self.exchange_exists.load(Ordering::SeqCst),
            bind_queue: self.bind_queue.load(Ordering::SeqCst),
            consume: self.consume.load(Ordering::SeqCst),
        }
    }

    pub fn has_queue(&self, name: &str) -> bool {
        self.lock().queues.contains_key(name)
    }

    pub fn queue_count(&self) -> usize {
        self.lock().queues.len()
    }

    pub fn exchange_kind(&self, name: &str) -> Option<ExchangeKind> {
        self.lock().exchanges.get(name).copied()
    }

    pub fn is_bound(&self, queue: &str, exchange: &str, routing_key: &str) -> bool {
        self.lock().bindings.contains(&(
            queue.to_string(),
            exchange.to_string(),
            routing_key.to_string(),
        ))
    }

    /// Number of messages waiting in `queue` for a consumer.
    pub fn backlog_len(&self, queue: &str) -> usize {
        self.lock()
            .queues
            .get(queue)
            .map(|q| q.backlog.len())
            .unwrap_or(0)
    }

    /// Publishes `body` to `exchange` with `routing_key`.
    ///
    /// An empty exchange name is the default exchange, which routes to the
    /// queue named by the routing key. Returns the number of queues reached.
    pub async fn publish(&self, exchange: &str, routing_key: &str, body: &[u8]) -> Result<usize> {
        let mut state = self.lock();
        let targets: Vec<String> = if exchange.is_empty() {
            if state.queues.contains_key(routing_key) {
                vec![routing_key.to_string()]
            } else {
                Vec::new()
            }
        } else {
            if !state.exchanges.contains_key(exchange) {
                return Err(HareError::protocol(
                    "basic.publish",
                    format!("NOT_FOUND - no exchange '{exchange}'"),
                ));
            }
            let mut queues: Vec<String> = state
                .bindings
                .iter()
                .filter(|(_, ex, key)| ex == exchange && key == routing_key)
                .map(|(queue, _, _)| queue.clone())
                .collect();
            queues.sort();
            queues
        };

        for queue in &targets {
            let delivery = Delivery {
                info: DeliveryInfo {
                    delivery_tag: self.delivery_tag.fetch_add(1, Ordering::SeqCst) + 1,
                    exchange: exchange.to_string(),
                    routing_key: routing_key.to_string(),
                    redelivered: false,
                },
                properties: MessageProperties::default(),
                body: body.to_vec(),
            };
            if let Some(q) = state.queues.get_mut(queue) {
                q.enqueue(delivery);
            }
        }
        Ok(targets.len())
    }

    /// Shortcut for publishing through the default exchange.
    pub async fn send_to_queue(&self, queue: &str, body: &[u8]) -> Result<usize> {
        self.publish("", queue, body).await
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // Handlers run on delivery tasks, so poisoning only comes from a test panic.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Channel for InMemoryBroker {
    async fn declare_queue(&self, name: &str, durable: bool) -> Result<QueueHandle> {
        self.declare_queue.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();

        let name = if name.is_empty() {
            format!("amq.gen-{}", Uuid::new_v4().simple())
        } else {
            name.to_string()
        };

        match state.queues.get(&name).map(|q| q.durable) {
            Some(current) if current != durable => Err(HareError::protocol(
                "queue.declare",
                format!(
                    "PRECONDITION_FAILED - inequivalent arg 'durable' for queue '{name}': \
                     received '{durable}' but current is '{current}'"
                ),
            )),
            Some(_) => Ok(QueueHandle::new(name, durable)),
            None => {
                state.queues.insert(
                    name.clone(),
                    QueueState {
                        durable,
                        ..Default::default()
                    },
                );
                Ok(QueueHandle::new(name, durable))
            }
        }
    }

    async fn declare_exchange(&self, name: &str, kind: ExchangeKind) -> Result<()> {
        self.declare_exchange.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        match state.exchanges.get(name).copied() {
            Some(existing) if existing != kind => Err(HareError::protocol(
                "exchange.declare",
                format!(
                    "PRECONDITION_FAILED - inequivalent arg 'type' for exchange '{name}': \
                     received '{kind}' but current is '{existing}'"
                ),
            )),
            Some(_) => Ok(()),
            None => {
                state.exchanges.insert(name.to_string(), kind);
                Ok(())
            }
        }
    }

    async fn bind_queue(
        &self,
        queue: &QueueHandle,
        exchange: &str,
        routing_key: &str,
    ) -> Result<()> {
        self.bind_queue.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        if !state.queues.contains_key(&queue.name) {
            return Err(HareError::protocol(
                "queue.bind",
                format!("NOT_FOUND - no queue '{}'", queue.name),
            ));
        }
        if !state.exchanges.contains_key(exchange) {
            return Err(HareError::protocol(
                "queue.bind",
                format!("NOT_FOUND - no exchange '{exchange}'"),
            ));
        }
        state.bindings.insert((
            queue.name.clone(),
            exchange.to_string(),
            routing_key.to_string(),
        ));
        Ok(())
    }

    async fn consume(
        &self,
        queue: &QueueHandle,
        callback: DeliveryCallback,
    ) -> Result<ConsumerTag> {
        self.consume.fetch_add(1, Ordering::SeqCst);
        let tag = format!("hare-{}", Uuid::new_v4());

        let mut state = self.lock();
        let Some(q) = state.queues.get_mut(&queue.name) else {
            return Err(HareError::protocol(
                "basic.consume",
                format!("NOT_FOUND - no queue '{}'", queue.name),
            ));
        };
        q.consumers.push((tag.clone(), callback));
        q.start_delivery(&queue.name);
        // Parked messages go out ahead of anything published after this point.
        for delivery in std::mem::take(&mut q.backlog) {
            q.enqueue(delivery);
        }
        Ok(tag)
    }
}

#[async_trait]
impl Connection for InMemoryBroker {
    async fn exchange_exists(&self, name: &str) -> Result<bool> {
        self.exchange_exists.fetch_add(1, Ordering::SeqCst);
        Ok(self.lock().exchanges.contains_key(name))
    }
}
