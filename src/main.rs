mod app;
mod commands;
mod output;

use clap::Parser;
use color_eyre::Result;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use tally::config::{Config, LoggingConfig};
use tally::notify::ConsoleNotifier;
use tally::transport::HttpTransport;
use tally::{Client, QueryCache};

use crate::commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let cli = Cli::parse();

  // Load configuration
  let config = Config::load(cli.config.as_deref())?;

  // Override organization if specified on command line
  let config = if let Some(organization) = cli.organization {
    let mut config = config;
    config.api.organization_id = Some(organization);
    config
  } else {
    config
  };

  // Keep the guard alive so buffered file logs are flushed on exit
  let _guard = init_logging(&config.logging);

  let cache = match config.stale_time() {
    Some(stale_time) => QueryCache::with_stale_time(stale_time),
    None => QueryCache::new(),
  };
  let token = Config::get_api_token();
  let transport = HttpTransport::new(&config.api, token.as_deref())?;
  let client = Client::new(cache, Arc::new(transport), Arc::new(ConsoleNotifier));

  let mut app = app::App::new(client, &config, cli.json, std::io::stdout());
  app.run(cli.resource).await?;

  Ok(())
}

/// Log to stderr, or to `logging.file` when set. `TALLY_LOG` overrides the
/// configured level.
fn init_logging(logging: &LoggingConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
  let filter = EnvFilter::try_from_env("TALLY_LOG").unwrap_or_else(|_| EnvFilter::new(&logging.level));

  let Some(path) = &logging.file else {
    tracing_subscriber::fmt()
      .with_env_filter(filter)
      .with_writer(std::io::stderr)
      .init();
    return None;
  };

  let directory = path
    .parent()
    .filter(|p| !p.as_os_str().is_empty())
    .unwrap_or_else(|| std::path::Path::new("."));
  let file_name = path
    .file_name()
    .map(|name| name.to_os_string())
    .unwrap_or_else(|| "tally.log".into());
  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();
  Some(guard)
}
