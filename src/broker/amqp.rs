//! AMQP 0-9-1 implementation of the broker traits, backed by `lapin`.
//!
//! `AmqpSession::connect` is the connection collaborator: it opens one
//! connection and one shared channel from [`AmqpSettings`]. Everything after
//! that goes through the [`Channel`] and [`Connection`] traits.

use std::sync::Arc;

use async_trait::async_trait;
use lapin::message::DeliveryResult;
use lapin::options::{
    BasicConsumeOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::uri::AMQPUri;
use lapin::ConnectionProperties;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::{
    Channel, Connection, ConsumerTag, Delivery, DeliveryCallback, DeliveryInfo, ExchangeKind,
    MessageProperties, QueueHandle,
};
use crate::config::AmqpSettings;
use crate::utils::error::is_not_found;
use crate::utils::{HareError, Result};

const REPLY_SUCCESS: u16 = 200;

/// An established broker connection plus the channel shared by all subscriptions.
pub struct AmqpSession {
    pub connection: Arc<AmqpConnection>,
    pub channel: Arc<AmqpChannel>,
}

impl AmqpSession {
    pub async fn connect(settings: &AmqpSettings) -> Result<Self> {
        let uri = amqp_uri(settings);
        info!(
            host = %settings.host,
            port = settings.port,
            vhost = %settings.vhost,
            "connecting to broker"
        );

        let conn = lapin::Connection::connect_uri(uri, ConnectionProperties::default())
            .await
            .map_err(|e| HareError::connection("connection.open", e))?;
        let conn = Arc::new(conn);

        let channel = conn
            .create_channel()
            .await
            .map_err(|e| HareError::from_lapin("channel.open", e))?;

        Ok(Self {
            connection: Arc::new(AmqpConnection { inner: conn }),
            channel: Arc::new(AmqpChannel { inner: channel }),
        })
    }
}

fn amqp_uri(settings: &AmqpSettings) -> AMQPUri {
    let mut uri = AMQPUri::default();
    uri.authority.host = settings.host.clone();
    uri.authority.port = settings.port;
    uri.authority.userinfo.username = settings.username.clone();
    uri.authority.userinfo.password = settings.password.clone();
    uri.vhost = settings.vhost.clone();
    uri.query.heartbeat = Some(settings.heartbeat_secs);
    uri
}

pub struct AmqpConnection {
    inner: Arc<lapin::Connection>,
}

#[async_trait]
impl Connection for AmqpConnection {
    async fn exchange_exists(&self, name: &str) -> Result<bool> {
        // A failed passive declare closes its channel, so probe on a throw-away one.
        let probe = self
            .inner
            .create_channel()
            .await
            .map_err(|e| HareError::from_lapin("channel.open", e))?;

        let passive = ExchangeDeclareOptions {
            passive: true,
            ..Default::default()
        };
        match probe
            .exchange_declare(
                name,
                lapin::ExchangeKind::Direct,
                passive,
                FieldTable::default(),
            )
            .await
        {
            Ok(()) => {
                if let Err(e) = probe.close(REPLY_SUCCESS, "exchange probe done").await {
                    debug!(exchange = name, error = %e, "closing probe channel failed");
                }
                Ok(true)
            }
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(HareError::from_lapin("exchange.declare (passive)", e)),
        }
    }
}

pub struct AmqpChannel {
    inner: lapin::Channel,
}

#[async_trait]
impl Channel for AmqpChannel {
    async fn declare_queue(&self, name: &str, durable: bool) -> Result<QueueHandle> {
        let options = QueueDeclareOptions {
            durable,
            ..Default::default()
        };
        let queue = self
            .inner
            .queue_declare(name, options, FieldTable::default())
            .await
            .map_err(|e| HareError::from_lapin("queue.declare", e))?;

        Ok(QueueHandle::new(queue.name().as_str(), durable))
    }

    async fn declare_exchange(&self, name: &str, kind: ExchangeKind) -> Result<()> {
        let kind = match kind {
            ExchangeKind::Direct => lapin::ExchangeKind::Direct,
        };
        self.inner
            .exchange_declare(
                name,
                kind,
                ExchangeDeclareOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| HareError::from_lapin("exchange.declare", e))
    }

    async fn bind_queue(
        &self,
        queue: &QueueHandle,
        exchange: &str,
        routing_key: &str,
    ) -> Result<()> {
        self.inner
            .queue_bind(
                &queue.name,
                exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| HareError::from_lapin("queue.bind", e))
    }

    async fn consume(
        &self,
        queue: &QueueHandle,
        callback: DeliveryCallback,
    ) -> Result<ConsumerTag> {
        let tag = format!("hare-{}", Uuid::new_v4());
        // Auto-ack: the broker considers a message handled once it is sent.
        let options = BasicConsumeOptions {
            no_ack: true,
            ..Default::default()
        };
        let consumer = self
            .inner
            .basic_consume(&queue.name, &tag, options, FieldTable::default())
            .await
            .map_err(|e| HareError::from_lapin("basic.consume", e))?;

        let queue_name = queue.name.clone();
        consumer.set_delegate(move |delivery: DeliveryResult| {
            let callback = callback.clone();
            let queue_name = queue_name.clone();
            async move {
                match delivery {
                    Ok(Some(delivery)) => callback(into_delivery(delivery)).await,
                    Ok(None) => debug!(queue = %queue_name, "consumer cancelled"),
                    Err(e) => error!(queue = %queue_name, error = %e, "delivery failed"),
                }
            }
        });

        Ok(tag)
    }
}

fn into_delivery(delivery: lapin::message::Delivery) -> Delivery {
    let properties = MessageProperties {
        content_type: delivery
            .properties
            .content_type()
            .as_ref()
            .map(|s| s.as_str().to_owned()),
        message_id: delivery
            .properties
            .message_id()
            .as_ref()
            .map(|s| s.as_str().to_owned()),
    };

    Delivery {
        info: DeliveryInfo {
            delivery_tag: delivery.delivery_tag,
            exchange: delivery.exchange.as_str().to_owned(),
            routing_key: delivery.routing_key.as_str().to_owned(),
            redelivered: delivery.redelivered,
        },
        properties,
        body: delivery.data,
    }
}
