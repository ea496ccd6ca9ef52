pub const LAUNCHER: &str = r#"#!/bin/sh
# Starts the hare subscription listener for this project.
set -e
cd "$(dirname "$0")/.."
exec hare listen --config config/amqp.yml "$@"
"#;

pub const SAMPLE_CONFIG: &str = r#"# Copy to config/amqp.yml and adjust.
# Any key can be overridden with HARE_AMQP__<KEY>, e.g. HARE_AMQP__HOST.
amqp:
  host: 127.0.0.1
  port: 5672
  vhost: /
  username: guest
  password: guest
  heartbeat_secs: 60

log:
  level: info
"#;
