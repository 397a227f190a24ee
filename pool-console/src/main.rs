// SPDX-License-Identifier: GPL-3.0-only

//! ZFS Pool Console - terminal front end for the middleware's pool management

use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;
use pool_contracts::client::{BusKind, DbusTransport, ZfsMiddlewareClient};
use tokio::sync::mpsc::unbounded_channel;
use zfs_pool_console::config::{Config, LoggingLevel};
use zfs_pool_console::{Console, RunOptions, fl, i18n, logging};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_SHA"),
    ", ",
    env!("VERGEN_GIT_COMMIT_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "zfs-pool-console")]
#[command(version, long_version = LONG_VERSION)]
#[command(about = "Inspect ZFS pools through the storage middleware", long_about = None)]
struct Cli {
    /// Connect to the middleware on the session bus instead of the system bus
    #[arg(long)]
    session_bus: bool,

    /// Exit after the pools have been printed once
    #[arg(long)]
    once: bool,

    /// Override the configured log level
    #[arg(long, value_enum)]
    log_level: Option<LoggingLevel>,

    /// Do not write the rolling log file
    #[arg(long)]
    no_log_file: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if self.session_bus {
            config.bus = BusKind::Session;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if self.no_log_file {
            config.log_to_disk = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load();
    cli.apply(&mut config);

    logging::init(&config);
    i18n::init(&i18n_embed::DesktopLanguageRequester::requested_languages());

    tracing::info!(
        version = LONG_VERSION,
        bus = ?config.bus,
        "starting {}",
        fl!("app-title")
    );

    let transport = DbusTransport::new(config.bus)
        .await
        .with_context(|| format!("connect to the middleware on the {:?} bus", config.bus))?;

    let (sender, receiver) = unbounded_channel();
    let client = Rc::new(ZfsMiddlewareClient::new(transport, sender));
    let events = client.start_event_forwarding();
    if let Err(error) = client.discover_services() {
        tracing::warn!(%error, "service discovery not started");
    }
    tracing::info!("{}", fl!("connected", bus = format!("{:?}", config.bus).to_lowercase()));

    let mut console = Console::new(Rc::clone(&client));
    let options = RunOptions {
        once: cli.once,
        show_datasets: config.show_datasets,
    };

    let shutdown = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    let mut stdout = std::io::stdout().lock();
    zfs_pool_console::run(&mut console, receiver, options, &mut stdout, shutdown).await?;

    events.abort();
    if !console.session().is_authenticated() {
        tracing::info!("{}", fl!("disconnected"));
    }

    Ok(())
}
