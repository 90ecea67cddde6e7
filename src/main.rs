//! clip-recall - clipboard history keeper
//!
//! Watches the clipboard, keeps a bounded history of everything copied,
//! and lets you search, reuse, export and prune it from the command line.

mod app;
mod config;
mod models;
mod services;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::models::settings::SETTING_KEYS;
use crate::services::clipboard::{self, HOLD_COMMAND};
use crate::services::notifier::HistoryObserver;
use crate::services::{ConsoleNotices, FileSystemDriver, StdoutTarget, SystemClipboard};

/// clip-recall - Clipboard history
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Config file path (default: ~/.config/clip-recall/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// State file path (overrides the config file)
    #[arg(long, global = true)]
    state_file: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch the clipboard and record every change until interrupted
    Watch,

    /// List history entries, newest first
    List {
        /// Only show entries containing this text (case-insensitive)
        query: Option<String>,

        /// Show at most this many entries
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Copy an entry back to the clipboard
    Copy {
        /// Entry id
        id: String,
    },

    /// Write a matching entry to stdout
    Paste {
        /// Search text (default: newest entry)
        query: Option<String>,

        /// Which match to paste, starting at 1
        #[arg(short, long, default_value_t = 1)]
        index: usize,
    },

    /// Delete an entry
    Delete {
        /// Entry id
        id: String,
    },

    /// Delete all history
    Clear,

    /// Export entries to a markdown file
    Export {
        /// Only export entries containing this text
        #[arg(short, long)]
        query: Option<String>,

        /// Destination folder (default: exportFolderPath setting)
        #[arg(short, long)]
        folder: Option<String>,

        /// Maximum number of entries (default: exportDefaultCount setting)
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },

    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },

    /// Serve stdin as the clipboard until something else is copied
    #[command(name = HOLD_COMMAND, hide = true)]
    HoldClipboard,
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// Print the current settings
    Show,
    /// Change a setting (invalid values are ignored)
    Set {
        /// Setting name
        #[arg(value_parser = setting_key_parser())]
        key: String,
        /// New value
        value: String,
    },
}

fn setting_key_parser() -> clap::builder::PossibleValuesParser {
    clap::builder::PossibleValuesParser::new(SETTING_KEYS.iter().copied())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let filter = if args.debug {
        "clip_recall=debug,info"
    } else {
        "clip_recall=info,warn"
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| filter.into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if matches!(args.command, Command::HoldClipboard) {
        let text = std::io::read_to_string(std::io::stdin())?;
        clipboard::hold_until_replaced(&text)?;
        return Ok(());
    }

    // Load configuration
    let mut config = if let Some(path) = args.config {
        config::Config::from_file(&path)?
    } else {
        config::Config::load()?
    };

    // Override state file if specified
    if let Some(state_file) = args.state_file {
        config.storage.state_file = state_file;
    }

    let driver = Arc::new(FileSystemDriver::new(config.state_file()));
    tracing::debug!(path = %driver.path().display(), "using state file");

    // Only `watch` outlives its clipboard writes
    let clipboard = if matches!(args.command, Command::Watch) {
        SystemClipboard::new()
    } else {
        SystemClipboard::one_shot()
    };

    let mut state = AppState::load(
        Arc::new(config),
        driver,
        Box::new(clipboard),
        Box::new(ConsoleNotices),
    )
    .await;

    match args.command {
        Command::Watch => watch(&mut state).await,
        Command::List { query, limit } => {
            let query = query.unwrap_or_default();
            let date_format = state.config().display.date_format.clone();
            let entries = state.search(&query);
            if entries.is_empty() {
                if query.is_empty() {
                    println!("No clipboard history yet.");
                } else {
                    println!("No matching clipboard entries found.");
                }
            }
            for entry in entries.into_iter().take(limit.unwrap_or(usize::MAX)) {
                println!(
                    "{}  {}  {}",
                    entry.id,
                    entry.captured_at().format(&date_format),
                    entry.preview
                );
            }
        }
        Command::Copy { id } => {
            state.copy_entry(&id);
        }
        Command::Paste { query, index } => {
            let query = query.unwrap_or_default();
            if !state.paste(&query, index, &mut StdoutTarget) {
                eprintln!("No matching clipboard entries found.");
            }
        }
        Command::Delete { id } => {
            if state.delete_entry(&id) == 0 {
                tracing::info!("No entry with id {}", id);
            }
        }
        Command::Clear => state.clear_history(),
        Command::Export {
            query,
            folder,
            count,
        } => {
            let query = query.unwrap_or_default();
            if let Some(path) = state.export(&query, folder.as_deref(), count) {
                println!("{}", path.display());
            }
        }
        Command::Settings { action } => match action {
            None | Some(SettingsAction::Show) => print_settings(&state)?,
            Some(SettingsAction::Set { key, value }) => {
                state.update_setting(&key, &value);
                print_settings(&state)?;
            }
        },
        Command::HoldClipboard => {}
    }

    state.shutdown().await;
    Ok(())
}

/// Record clipboard changes until Ctrl-C.
async fn watch(state: &mut AppState) {
    let updates = Arc::new(AtomicUsize::new(0));
    let counter = updates.clone();
    let observer: Arc<dyn HistoryObserver> = Arc::new(move || {
        counter.fetch_add(1, Ordering::Relaxed);
    });
    state.register_observer(observer.clone());

    tracing::info!(
        interval_ms = state.settings().poll_interval_ms,
        entries = state.history().len(),
        "watching clipboard, press Ctrl-C to stop"
    );

    state
        .watch(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
            }
        })
        .await;

    state.unregister_observer(&observer);
    tracing::info!(
        captured = updates.load(Ordering::Relaxed),
        entries = state.history().len(),
        "stopped watching clipboard"
    );
}

fn print_settings(state: &AppState) -> Result<()> {
    let rendered = serde_json::to_string_pretty(state.settings())?;
    println!("{}", rendered);
    Ok(())
}
