//! vetdw-etl binary.
//!
//! Reads `vetdw.toml` (or the path given with `--config`), overlays `VETDW_*`
//! environment variables, and runs one full load of the warehouse. Exits
//! non-zero if any phase fails.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use vetdw_etl::{EtlConfig, Pipeline};
use vetdw_store_sqlite::SqliteWarehouse;

#[derive(Parser)]
#[command(author, version, about = "Veterinary data warehouse loader")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "vetdw.toml")]
  config: PathBuf,

  /// Print the run summary as JSON on stdout.
  #[arg(long)]
  summary_json: bool,
}

fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("VETDW").separator("__"))
    .build()
    .context("failed to read config file")?;

  let cfg: EtlConfig = settings
    .try_deserialize()
    .context("failed to deserialise EtlConfig")?;

  let (source_path, warehouse_path) = cfg.resolved_paths();
  let warehouse = SqliteWarehouse::open(&source_path, &warehouse_path).with_context(|| {
    format!("failed to open {source_path:?} with warehouse {warehouse_path:?}")
  })?;

  let mut pipeline = Pipeline::new(warehouse, cfg.load_context());
  let summary = pipeline.run().context("warehouse load failed")?;

  tracing::info!(
    inserted = summary.inserted(),
    rejected = summary.rejected(),
    duration_ms = summary.duration_ms,
    "load finished",
  );

  if cli.summary_json {
    let json = serde_json::to_string_pretty(&summary).context("failed to encode summary")?;
    println!("{json}");
  }

  Ok(())
}
