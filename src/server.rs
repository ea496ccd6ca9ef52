//! Process entry point for a set of subscriptions.
//!
//! Connect, register everything once, then keep consuming until shutdown.
//! There is no per-subscription teardown: consumers live as long as the
//! session does.

use std::future::Future;

use tracing::info;

use crate::broker::AmqpSession;
use crate::config::Settings;
use crate::session::Session;
use crate::subscription::{Registry, Subscriptions};
use crate::utils::Result;

/// Connects to the broker from `settings` and serves `registry` until Ctrl-C.
pub async fn run(settings: &Settings, registry: Registry) -> Result<()> {
    let session: Session = AmqpSession::connect(&settings.amqp).await?.into();

    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received. Exiting gracefully."),
            Err(e) => tracing::error!(error = %e, "failed to listen for shutdown signal"),
        }
    };

    serve(session, &registry, ctrl_c).await?;
    Ok(())
}

/// Registers every definition on `session`, then waits for `shutdown`.
///
/// Registration errors are returned before `shutdown` is polled. The session
/// is kept alive until `shutdown` resolves.
pub async fn serve<F>(
    session: Session,
    registry: &Registry,
    shutdown: F,
) -> Result<Subscriptions>
where
    F: Future<Output = ()>,
{
    let subscriptions = registry.register_all(&session).await?;
    for subscription in subscriptions.values() {
        info!(
            subscription = %subscription.name,
            queue = %subscription.queue.name,
            "listening"
        );
    }

    shutdown.await;
    drop(session);
    Ok(subscriptions)
}
