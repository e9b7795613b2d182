//! `hydro`: operator console for the water-utility back office.
//!
//! # Usage
//!
//! ```
//! hydro --data-dir ./data
//! hydro --config ~/.config/hydro/config.toml
//! ```

mod console;
mod menu;
mod messages;
mod settings;

use std::{fs::OpenOptions, path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use console::Console;
use hydro_engine::SessionFacade;
use hydro_store_file::FileStore;
use messages::Messages;
use settings::AppConfig;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "hydro", version, about = "Water-utility back office console")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, value_name = "FILE", default_value = "hydro.toml")]
  config: PathBuf,

  /// Directory holding users, meters and accounts (overrides the config).
  #[arg(long, value_name = "DIR")]
  data_dir: Option<PathBuf>,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let cli = Cli::parse();
  let config = AppConfig::load(&cli.config, cli.data_dir.as_deref())?;
  init_tracing(&config)?;

  let messages = Arc::new(Messages::load(config.messages_file.as_deref())?);
  let store = FileStore::with_file_names(&config.data_dir, config.files.clone());
  let mut facade = SessionFacade::new(store, config.engine.clone()).context("building session facade")?;

  tracing::info!(data_dir = %config.data_dir.display(), "hydro starting");

  let stdin = tokio::io::BufReader::new(tokio::io::stdin());
  let mut console = Console::new(stdin, std::io::stdout(), messages);
  console.run(&mut facade).await?;

  tracing::info!("hydro stopped");
  Ok(())
}

/// Log to the configured file in append mode, or to stderr. The console owns
/// stdout, so stderr defaults to warnings only.
fn init_tracing(config: &AppConfig) -> anyhow::Result<()> {
  let filter = |default: LevelFilter| {
    EnvFilter::builder()
      .with_default_directive(default.into())
      .from_env_lossy()
  };

  match &config.log_file {
    Some(path) => {
      let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;
      tracing_subscriber::fmt()
        .with_env_filter(filter(LevelFilter::INFO))
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .init();
    }
    None => {
      tracing_subscriber::fmt()
        .with_env_filter(filter(LevelFilter::WARN))
        .with_writer(std::io::stderr)
        .init();
    }
  }
  Ok(())
}
