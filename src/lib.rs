//! # Hare
//!
//! `hare` lets an application say "listen on this binding and run this
//! handler for every message" against an AMQP broker such as RabbitMQ,
//! without hand-writing queue and exchange setup or body decoding.
//!
//! ```no_run
//! use hare::broker::AmqpSession;
//! use hare::subscription::{Registry, SubscriptionDefinition, handler_fn};
//!
//! # async fn start(settings: hare::config::Settings) -> hare::utils::Result<()> {
//! let mut registry = Registry::new();
//! registry.add(
//!     SubscriptionDefinition::new("users", handler_fn(|payload| async move {
//!         println!("{payload}");
//!         Ok::<(), anyhow::Error>(())
//!     }))
//!     .bind("user.exchange"),
//! )?;
//!
//! let session: hare::Session = AmqpSession::connect(&settings.amqp).await?.into();
//! registry.register_all(&session).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Modules
//!
//! - `subscription`: definitions, handlers, and the provision/bind/dispatch steps.
//! - `broker`: the channel and connection traits, with AMQP and in-memory backends.
//! - `session`: the channel and connection shared by every subscription.
//! - `server`: connect, register and serve until shutdown.
//! - `install`: writes a launcher script and a sample connection file.
//! - `config`: loads connection settings from file and environment.
//! - `utils`: error type and logging setup.

pub mod broker;
pub mod config;
pub mod install;
pub mod server;
pub mod session;
pub mod subscription;
pub mod utils;

pub use session::Session;
pub use subscription::{Payload, Registry, SubscriptionDefinition, handler_fn};
pub use utils::{HareError, Result};
