//! The `subscription` module is the core of `hare`.
//!
//! A [`SubscriptionDefinition`] says which queue to listen on, which exchange
//! to bind it to and which [`Handler`] runs for every message. Registering it
//! walks three steps on the shared session, once, at startup:
//!
//! - `provisioner`: declare (or let the broker name) the queue.
//! - `binding`: make sure the direct exchange exists and bind the queue to it.
//! - `dispatcher`: attach a consumer that decodes each body with `codec` and
//!   calls the handler.
//!
//! After that, messages flow only through the codec and the handler.

pub mod binding;
pub mod codec;
pub mod definition;
pub mod dispatcher;
pub mod provisioner;
pub mod registry;

pub use binding::BindingResolver;
pub use codec::{Document, Payload, decode};
pub use definition::{Handler, HandlerFn, SubscriptionDefinition, handler_fn};
pub use dispatcher::Dispatcher;
pub use provisioner::QueueProvisioner;
pub use registry::{Registry, Subscription, SubscriptionState, Subscriptions, register};
