use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use daybreak::app::{App, LogAnalytics};
use daybreak::config::Config;

/// Daily-rotating background picker.
#[derive(Debug, Parser)]
#[command(name = "daybreak", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Keep everything in memory for this run.
    #[arg(long)]
    in_memory: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print today's background URL, picking a new photo on a new day.
    Today,

    /// Pick a new background now and print its URL.
    Refresh,

    /// Print the stored background record.
    Show,

    /// List the photo catalog.
    Catalog,

    /// Print the stored JSON of a persisted value.
    Get { key: String },

    /// Store a JSON value under a key.
    Set { key: String, value: String },

    /// Print values as other processes change them.
    Watch {
        /// Keys to follow.
        #[arg(required = true)]
        keys: Vec<String>,

        /// Poll interval in milliseconds.
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr, command output to stdout.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("daybreak=info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("load config")?;
    if cli.in_memory {
        config.storage.in_memory = true;
    }

    let app = App::open(config);
    app.launch(&LogAnalytics);

    match cli.command {
        Command::Today => {
            let url = app.background().daily_background().context("daily background")?;
            println!("{url}");
        }
        Command::Refresh => {
            let url = app.background().refresh_background().context("refresh background")?;
            println!("{url}");
        }
        Command::Show => match app.background().stored_record()? {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => println!("no background stored"),
        },
        Command::Catalog => {
            let options = app.background().options();
            for id in app.background().catalog().iter() {
                println!("{id}\t{}", options.url(id));
            }
        }
        Command::Get { key } => match app.storage().get_item(&key)? {
            Some(raw) => println!("{raw}"),
            None => anyhow::bail!("nothing stored under `{key}`"),
        },
        Command::Set { key, value } => {
            let value: serde_json::Value =
                serde_json::from_str(&value).context("value must be JSON")?;
            let slot = app
                .values()
                .bind(&key, serde_json::Value::Null)
                .with_context(|| format!("bind `{key}`"))?;
            slot.set(value)?;
        }
        Command::Watch { keys, interval_ms } => watch(&app, &keys, interval_ms)?,
    }

    Ok(())
}

fn watch(app: &App, keys: &[String], interval_ms: u64) -> anyhow::Result<()> {
    for key in keys {
        let slot = app
            .values()
            .bind(key, serde_json::Value::Null)
            .with_context(|| format!("bind `{key}`"))?;
        let name = key.clone();
        slot.watch(move |value| println!("{name}\t{value}"));
        info!("👀 Watching `{}`: {}", key, slot.get());
    }

    let interval = Duration::from_millis(interval_ms);
    loop {
        app.sync().context("sync")?;
        thread::sleep(interval);
    }
}
