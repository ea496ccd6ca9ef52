use std::collections::HashMap;
use std::fmt;

use tracing::{debug, info};

use super::binding::BindingResolver;
use super::definition::SubscriptionDefinition;
use super::dispatcher::Dispatcher;
use super::provisioner::QueueProvisioner;
use crate::broker::{ConsumerTag, QueueHandle};
use crate::session::Session;
use crate::utils::{HareError, Result};

/// Lifecycle of a subscription. `Listening` lasts until the process exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SubscriptionState {
    Unregistered,
    Provisioned,
    Bound,
    Listening,
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubscriptionState::Unregistered => "unregistered",
            SubscriptionState::Provisioned => "provisioned",
            SubscriptionState::Bound => "bound",
            SubscriptionState::Listening => "listening",
        };
        f.write_str(s)
    }
}

/// A registered subscription and the queue it ended up consuming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub name: String,
    pub queue: QueueHandle,
    pub consumer_tag: ConsumerTag,
    pub state: SubscriptionState,
}

/// Registered subscriptions keyed by definition name.
pub type Subscriptions = HashMap<String, Subscription>;

/// The explicit list of subscriptions a process starts with.
///
/// Build it once in the application's init routine, then hand it to
/// [`Registry::register_all`].
#[derive(Debug, Default)]
pub struct Registry {
    definitions: Vec<SubscriptionDefinition>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a definition. Names must be unique within a registry.
    pub fn add(&mut self, definition: SubscriptionDefinition) -> Result<&mut Self> {
        if self.definitions.iter().any(|d| d.name() == definition.name()) {
            return Err(HareError::DuplicateSubscription(definition.name().to_string()));
        }
        self.definitions.push(definition);
        Ok(self)
    }

    pub fn definitions(&self) -> &[SubscriptionDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Registers every definition in order. The first failure aborts startup.
    pub async fn register_all(&self, session: &Session) -> Result<Subscriptions> {
        let mut subscriptions = HashMap::with_capacity(self.definitions.len());
        for definition in &self.definitions {
            let subscription = register(session, definition).await?;
            subscriptions.insert(subscription.name.clone(), subscription);
        }
        info!(count = subscriptions.len(), "subscriptions listening");
        Ok(subscriptions)
    }
}

/// Provisions, binds and attaches a single definition on the shared session.
pub async fn register(
    session: &Session,
    definition: &SubscriptionDefinition,
) -> Result<Subscription> {
    let _guard = session.serialize().await;
    let name = definition.name();
    let mut state = SubscriptionState::Unregistered;

    let queue = QueueProvisioner::new(session.channel())
        .provision(definition.queue_name(), definition.is_durable())
        .await?;
    advance(name, &mut state, SubscriptionState::Provisioned);

    BindingResolver::new(session.channel(), session.connection())
        .resolve(&queue, definition.binding_target())
        .await?;
    advance(name, &mut state, SubscriptionState::Bound);

    let consumer_tag = Dispatcher::new(session.channel())
        .attach(&queue, definition.handler())
        .await?;
    advance(name, &mut state, SubscriptionState::Listening);

    info!(
        subscription = name,
        queue = %queue.name,
        bind = definition.binding_target().unwrap_or("-"),
        "subscription registered"
    );

    Ok(Subscription {
        name: name.to_string(),
        queue,
        consumer_tag,
        state,
    })
}

fn advance(name: &str, state: &mut SubscriptionState, next: SubscriptionState) {
    debug!(subscription = name, from = %state, to = %next, "state transition");
    *state = next;
}
