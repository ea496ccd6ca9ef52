use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes the broker connection parameters and the logging level.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub amqp: AmqpSettings,
    pub log: LogSettings,
}

/// Connection parameters for the AMQP broker.
///
/// Only the connection collaborator reads these; subscriptions never do.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AmqpSettings {
    pub host: String,
    pub port: u16,
    pub vhost: String,
    pub username: String,
    pub password: String,
    pub heartbeat_secs: u16,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub amqp: Option<PartialAmqpSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialAmqpSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub vhost: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub heartbeat_secs: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

/// Provides default values for `Settings`.
///
/// These match a stock local RabbitMQ installation.
impl Default for Settings {
    fn default() -> Self {
        Self {
            amqp: AmqpSettings {
                host: "127.0.0.1".to_string(),
                port: 5672,
                vhost: "/".to_string(),
                username: "guest".to_string(),
                password: "guest".to_string(),
                heartbeat_secs: 60,
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl PartialSettings {
    /// Fills every missing value from `Settings::default()`.
    pub fn merge_with_defaults(self) -> Settings {
        let default = Settings::default();
        let amqp = self.amqp;
        let log = self.log;

        Settings {
            amqp: AmqpSettings {
                host: amqp
                    .as_ref()
                    .and_then(|a| a.host.clone())
                    .unwrap_or(default.amqp.host),
                port: amqp
                    .as_ref()
                    .and_then(|a| a.port)
                    .unwrap_or(default.amqp.port),
                vhost: amqp
                    .as_ref()
                    .and_then(|a| a.vhost.clone())
                    .unwrap_or(default.amqp.vhost),
                username: amqp
                    .as_ref()
                    .and_then(|a| a.username.clone())
                    .unwrap_or(default.amqp.username),
                password: amqp
                    .as_ref()
                    .and_then(|a| a.password.clone())
                    .unwrap_or(default.amqp.password),
                heartbeat_secs: amqp
                    .as_ref()
                    .and_then(|a| a.heartbeat_secs)
                    .unwrap_or(default.amqp.heartbeat_secs),
            },
            log: LogSettings {
                level: log
                    .and_then(|l| l.level)
                    .unwrap_or(default.log.level),
            },
        }
    }
}
