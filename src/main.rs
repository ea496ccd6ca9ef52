//! CLI for Hare
//!
//! Subcommands:
//! - `listen`: consume one queue and log every message (useful for smoke tests)
//! - `install`: write `bin/hare` and `config/amqp.yml.sample`

use std::path::PathBuf;

use clap::Parser;
use hare::config::{load_config, load_config_from};
use hare::subscription::{Payload, Registry, SubscriptionDefinition, handler_fn};
use hare::utils::logging;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "hare")]
enum Command {
    /// Subscribe to a queue and log each payload until Ctrl-C
    Listen {
        /// Connection file; defaults to config/amqp.* plus HARE_* variables
        #[arg(long)]
        config: Option<PathBuf>,
        /// Queue to consume; empty lets the broker generate one
        #[arg(long, default_value = "")]
        queue: String,
        /// Direct exchange to bind the queue to
        #[arg(long)]
        bind: Option<String>,
        /// Declare the queue as durable
        #[arg(long)]
        durable: bool,
    },
    /// Write the launcher script and a sample connection file
    Install {
        /// Project root to write into
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Overwrite files that already exist
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cmd = Command::parse();

    let result = match cmd {
        Command::Listen {
            config,
            queue,
            bind,
            durable,
        } => run_listen(config, queue, bind, durable).await,
        Command::Install { root, force } => {
            logging::init("info");
            hare::install::generate(&root, force).map(|written| {
                info!(files = written.len(), "install finished");
            })
        }
    };

    if let Err(e) = result {
        error!("hare failed: {e}");
        std::process::exit(1);
    }
}

async fn run_listen(
    config: Option<PathBuf>,
    queue: String,
    bind: Option<String>,
    durable: bool,
) -> hare::Result<()> {
    let settings = match config {
        Some(path) => load_config_from(path),
        None => load_config(),
    };
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            return Err(e);
        }
    };
    logging::init(&settings.log.level);

    let mut definition = SubscriptionDefinition::new("listen", handler_fn(log_payload))
        .queue(queue)
        .durable(durable);
    if let Some(exchange) = bind {
        definition = definition.bind(exchange);
    }

    let mut registry = Registry::new();
    registry.add(definition)?;

    hare::server::run(&settings, registry).await
}

async fn log_payload(payload: Payload) -> anyhow::Result<()> {
    match &payload {
        Payload::Structured(doc) => info!(payload = %doc, "message received"),
        Payload::Raw(_) => info!(payload = %payload, "raw message received"),
    }
    Ok(())
}
