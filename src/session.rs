//! The broker handles every subscription in a process shares.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::broker::{AmqpSession, Channel, Connection};

/// One channel and one connection, shared by all subscriptions.
///
/// Declares, binds and consumer registrations are issued one subscription at
/// a time: callers take [`Session::serialize`] before touching the channel.
pub struct Session {
    channel: Arc<dyn Channel>,
    connection: Arc<dyn Connection>,
    lock: Mutex<()>,
}

impl Session {
    pub fn new(channel: Arc<dyn Channel>, connection: Arc<dyn Connection>) -> Self {
        Self {
            channel,
            connection,
            lock: Mutex::new(()),
        }
    }

    pub fn channel(&self) -> &dyn Channel {
        self.channel.as_ref()
    }

    pub fn connection(&self) -> &dyn Connection {
        self.connection.as_ref()
    }

    pub async fn serialize(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

impl From<AmqpSession> for Session {
    fn from(session: AmqpSession) -> Self {
        Self::new(session.channel, session.connection)
    }
}
