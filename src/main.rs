mod logging;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;

use doccache::cache::{
  Document, DocumentStore, LocalDocumentCache, NoopStore, PendingOperation, ReadOptions,
  SqliteStore, WriteOptions,
};
use doccache::config::Config;

#[derive(Parser, Debug)]
#[command(name = "doccache")]
#[command(about = "Inspect and manipulate the local document cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/doccache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Database file to use instead of the configured one
  #[arg(short, long)]
  database: Option<PathBuf>,

  /// Mirror logs to stderr
  #[arg(short, long)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Cache a JSON document
  Put {
    partition: String,
    id: String,
    /// Document payload as JSON
    json: String,
    /// Time-to-live in seconds (-1 never expires, 0 disables retention)
    #[arg(long, allow_hyphen_values = true)]
    ttl: Option<i32>,
    #[arg(long)]
    etag: Option<String>,
    /// Pending operation to record: CREATE, REPLACE or DELETE
    #[arg(long, default_value = "CREATE")]
    operation: PendingOperation,
  },
  /// Read a document, refreshing it if fresh
  Get {
    partition: String,
    id: String,
    #[arg(long, allow_hyphen_values = true)]
    ttl: Option<i32>,
  },
  /// Remove a document
  Delete { partition: String, id: String },
  /// List documents of a partition
  List { partition: String },
  /// List documents awaiting synchronization
  Pending,
  /// Show the raw cache row for a document
  Inspect { partition: String, id: String },
}

fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;
  let _guard = logging::init(&config.log, args.verbose)?;

  if !config.cache.enabled {
    tracing::info!("document cache disabled by configuration");
    return run(LocalDocumentCache::new(NoopStore), &config, args.command);
  }

  let store = match args.database.as_ref().or(config.cache.database.as_ref()) {
    Some(path) => SqliteStore::open(path),
    None => SqliteStore::open_default(),
  }
  .map_err(|e| eyre!("Failed to open document cache: {}", e))?;

  run(LocalDocumentCache::new(store), &config, args.command)
}

fn run<S: DocumentStore>(
  cache: LocalDocumentCache<S>,
  config: &Config,
  command: Command,
) -> Result<()> {
  match command {
    Command::Put {
      partition,
      id,
      json,
      ttl,
      etag,
      operation,
    } => {
      let value: serde_json::Value =
        serde_json::from_str(&json).map_err(|e| eyre!("Invalid JSON payload: {}", e))?;
      let options = match ttl {
        Some(seconds) => WriteOptions::new(seconds)?,
        None => config.cache.write_options(),
      };
      let mut document = Document::new(value, partition, id);
      if let Some(etag) = etag {
        document = document.with_etag(etag);
      }
      cache.write_with_operation(&document, options, operation)?;
    }
    Command::Get { partition, id, ttl } => {
      let options = match ttl {
        Some(seconds) => ReadOptions::new(seconds)?,
        None => config.cache.read_options(),
      };
      let document = cache.read::<serde_json::Value>(&partition, &id, options);
      if let Some(etag) = document.etag() {
        eprintln!("etag: {}", etag);
      }
      let value = document.into_result()?;
      println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Command::Delete { partition, id } => cache.delete(&partition, &id),
    Command::List { partition } => {
      for row in cache.list(&partition)? {
        println!("{}\t{}", row.document_id, row.etag.unwrap_or_default());
      }
    }
    Command::Pending => {
      for row in cache.pending()? {
        let operation = row
          .pending_operation
          .map(|op| op.to_string())
          .unwrap_or_default();
        println!("{}\t{}\t{}", operation, row.partition, row.document_id);
      }
    }
    Command::Inspect { partition, id } => {
      let row = cache
        .inspect(&partition, &id)?
        .ok_or_else(|| eyre!("No cache row for {}:{}", partition, id))?;
      for (label, value) in row.fields() {
        println!("{:>18}: {}", label, value);
      }
    }
  }

  Ok(())
}
